// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Layered YAML configuration for `composer-server` (ambient C8), merged
//! vendor-then-admin via [`composer_config::Manager`] and overridden by
//! CLI flags.

use std::path::PathBuf;

use composer_config::Config;
use serde::{Deserialize, Serialize};

const PROGRAM: &str = "composer";

pub const DEFAULT_SOCKET: &str = "/run/weldr/api.socket";
pub const DEFAULT_JOB_SOCKET: &str = "/run/osbuild-composer/job.socket";
const DEFAULT_SOLVER_BINARY: &str = "composer-dnf-solver";
const DEFAULT_STORE_DIR: &str = "/var/lib/composer/store";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub socket: Option<String>,
    pub job_socket: Option<String>,
    pub solver_binary: Option<String>,
    pub store_dir: Option<String>,
    pub blueprint_store_dir: Option<String>,
}

impl Config for FileConfig {
    fn domain() -> String {
        "server".to_string()
    }

    fn merge(self, other: Self) -> Self {
        Self {
            socket: other.socket.or(self.socket),
            job_socket: other.job_socket.or(self.job_socket),
            solver_binary: other.solver_binary.or(self.solver_binary),
            store_dir: other.store_dir.or(self.store_dir),
            blueprint_store_dir: other.blueprint_store_dir.or(self.blueprint_store_dir),
        }
    }
}

/// Fully resolved settings: CLI overrides, then the layered config file,
/// then built-in defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket: PathBuf,
    pub job_socket: PathBuf,
    pub solver_binary: String,
    pub output_store_dir: PathBuf,
    pub blueprint_store_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn resolve(file: Option<FileConfig>, cli: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();

        let socket = cli
            .socket
            .clone()
            .or_else(|| file.socket.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET));

        let job_socket = cli
            .job_socket
            .clone()
            .or_else(|| file.job_socket.map(PathBuf::from))
            .unwrap_or_else(|| socket.clone());

        let solver_binary = cli
            .solver_binary
            .clone()
            .or(file.solver_binary)
            .unwrap_or_else(|| DEFAULT_SOLVER_BINARY.to_string());

        let output_store_dir = cli
            .store_dir
            .clone()
            .or_else(|| file.store_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        let blueprint_store_dir = cli
            .blueprint_store_dir
            .clone()
            .or_else(|| file.blueprint_store_dir.map(PathBuf::from));

        Self {
            socket,
            job_socket,
            solver_binary,
            output_store_dir,
            blueprint_store_dir,
        }
    }
}

pub fn manager(root: Option<PathBuf>) -> composer_config::Manager {
    match root {
        Some(root) => composer_config::Manager::system(root, PROGRAM),
        None => composer_config::Manager::user(PROGRAM).unwrap_or_else(|| composer_config::Manager::system("/", PROGRAM)),
    }
}
