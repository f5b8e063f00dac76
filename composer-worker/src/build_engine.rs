// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Drives the external `build-engine` subprocess (spec §6): the canonical
//! recipe JSON goes in on stdin, a `{tree_id, output_id}` object comes back
//! on stdout on success. Grounded on the teacher's subprocess idiom in
//! `boulder::build` (piped stdin/stdout/stderr, `tokio::process::Command`).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildOutput {
    pub tree_id: String,
    pub output_id: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("spawn build engine")]
    Spawn(#[source] std::io::Error),
    #[error("write recipe to build engine stdin")]
    Stdin(#[source] std::io::Error),
    #[error("wait on build engine")]
    Wait(#[source] std::io::Error),
    #[error("build engine exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),
    #[error("parse build engine output")]
    Parse(#[source] serde_json::Error),
}

/// Run `build-engine --store <store_dir> --output-directory <output_dir>
/// --json -`, feeding it `recipe_json` on stdin.
pub async fn run(binary: &str, store_dir: &Path, output_dir: &Path, recipe_json: &str) -> Result<BuildOutput, Error> {
    let mut command = Command::new(binary);
    command
        .arg("--store")
        .arg(store_dir)
        .arg("--output-directory")
        .arg(output_dir)
        .arg("--json")
        .arg("-")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = command.spawn().map_err(Error::Spawn)?;

    let mut stdin = child.stdin.take().expect("stdin piped");
    stdin.write_all(recipe_json.as_bytes()).await.map_err(Error::Stdin)?;
    drop(stdin);

    let output = child.wait_with_output().await.map_err(Error::Wait)?;
    if !output.status.success() {
        log::error!(
            "build engine exited abnormally: status={:?} stderr={}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(Error::NonZeroExit(output.status));
    }

    serde_json::from_slice(&output.stdout).map_err(Error::Parse)
}
