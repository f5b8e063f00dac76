// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Client for the external dependency-solver subprocess (spec §4.4, §6).
//!
//! Protocol: write one JSON object `{command, arguments}` to the child's
//! stdin, read one JSON value from stdout. Exit code 10 means a structured
//! `{kind, reason}` error is on stdout instead. Anything else non-zero is
//! an opaque I/O failure.

use std::process::Stdio;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

mod repo;

pub use repo::{RepoConfig, RepoConfigError};

const STRUCTURED_ERROR_EXIT_CODE: i32 = 10;

/// A solver subprocess client bound to a single executable path.
#[derive(Debug, Clone)]
pub struct SolverClient {
    binary: String,
}

impl SolverClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// `dump {repos}` — enumerate all packages known to the given repos.
    pub async fn dump(&self, repos: &[RepoConfig]) -> Result<Vec<DumpEntry>, Error> {
        self.call(
            "dump",
            serde_json::json!({ "repos": repos }),
        )
        .await
    }

    /// `depsolve {repos, package-specs}` — resolve a package spec set.
    pub async fn depsolve(&self, repos: &[RepoConfig], package_specs: &[String]) -> Result<Vec<DepsolveEntry>, Error> {
        self.call(
            "depsolve",
            serde_json::json!({ "repos": repos, "package-specs": package_specs }),
        )
        .await
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, command: &str, arguments: serde_json::Value) -> Result<T, Error> {
        let request = Request { command, arguments };
        let payload = serde_json::to_vec(&request).map_err(Error::EncodeRequest)?;

        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::Spawn)?;

        {
            let mut stdin = child.stdin.take().ok_or(Error::MissingStdin)?;
            stdin.write_all(&payload).await.map_err(Error::Io)?;
            stdin.shutdown().await.map_err(Error::Io)?;
        }

        let output = child.wait_with_output().await.map_err(Error::Io)?;

        match output.status.code() {
            Some(0) => serde_json::from_slice(&output.stdout).map_err(Error::DecodeResponse),
            Some(STRUCTURED_ERROR_EXIT_CODE) => {
                let structured: StructuredError =
                    serde_json::from_slice(&output.stdout).map_err(|_| Error::Io(io_error("malformed structured error")))?;
                Err(Error::Solver(structured))
            }
            other => {
                log::error!(
                    "solver subprocess exited abnormally: exit_code={:?} stderr={}",
                    other,
                    String::from_utf8_lossy(&output.stderr)
                );
                Err(Error::SolverIo)
            }
        }
    }
}

fn io_error(message: &str) -> std::io::Error {
    std::io::Error::other(message.to_string())
}

#[derive(Serialize)]
struct Request<'a> {
    command: &'a str,
    arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpEntry {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub url: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub buildtime: DateTime<Utc>,
    pub license: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepsolveEntry {
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl DepsolveEntry {
    /// The `epoch:version-release.arch` NEVRA string used by `freeze`
    /// (spec §4.3 `freeze`).
    pub fn nevra(&self) -> String {
        format!("{}:{}-{}.{}", self.epoch, self.version, self.release, self.arch)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredError {
    pub kind: SolverErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SolverErrorKind {
    MarkingErrors,
    DepsolveError,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("encode solver request")]
    EncodeRequest(#[source] serde_json::Error),
    #[error("spawn solver subprocess")]
    Spawn(#[source] std::io::Error),
    #[error("solver subprocess has no stdin pipe")]
    MissingStdin,
    #[error("solver subprocess I/O")]
    Io(#[source] std::io::Error),
    #[error("decode solver response")]
    DecodeResponse(#[source] serde_json::Error),
    #[error("solver reported an error: {0:?}")]
    Solver(StructuredError),
    /// Any non-zero exit or unparseable stdout that isn't the structured
    /// error protocol (spec §7, `SolverIOError`).
    #[error("solver subprocess protocol violation")]
    SolverIo,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nevra_formats_as_epoch_version_release_arch() {
        let entry = DepsolveEntry {
            name: "bash".into(),
            epoch: 0,
            version: "5.2.21".into(),
            release: "1".into(),
            arch: "x86_64".into(),
        };
        assert_eq!(entry.nevra(), "0:5.2.21-1.x86_64");
    }

    #[tokio::test]
    async fn structured_error_exit_code_is_surfaced() {
        let client = SolverClient::new("false");
        // `false` exits 1, not 10, so this should be a generic SolverIo error.
        let result = client.dump(&[]).await;
        assert!(matches!(result, Err(Error::SolverIo)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let client = SolverClient::new("/nonexistent/composer-solver-test-binary");
        let result = client.dump(&[]).await;
        assert!(matches!(result, Err(Error::Spawn(_))));
    }
}
