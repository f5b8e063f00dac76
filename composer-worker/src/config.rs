// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Layered YAML configuration for `composer-worker`, mirroring
//! `composer-server`'s `config` module: vendor/admin/user merge via
//! [`composer_config::Manager`], overridden by CLI flags.

use std::path::PathBuf;

use composer_config::Config;
use serde::{Deserialize, Serialize};

const PROGRAM: &str = "composer";

pub const DEFAULT_SOCKET: &str = "/run/osbuild-composer/job.socket";
const DEFAULT_BUILD_ENGINE_BINARY: &str = "build-engine";
const DEFAULT_STORE_DIR: &str = "/var/lib/composer/store";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub socket: Option<String>,
    pub build_engine_binary: Option<String>,
    pub store_dir: Option<String>,
}

impl Config for FileConfig {
    fn domain() -> String {
        "worker".to_string()
    }

    fn merge(self, other: Self) -> Self {
        Self {
            socket: other.socket.or(self.socket),
            build_engine_binary: other.build_engine_binary.or(self.build_engine_binary),
            store_dir: other.store_dir.or(self.store_dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub socket: PathBuf,
    pub build_engine_binary: String,
    pub store_dir: PathBuf,
}

impl WorkerConfig {
    pub fn resolve(file: Option<FileConfig>, cli: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();

        let socket = cli
            .socket
            .clone()
            .or_else(|| file.socket.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET));

        let build_engine_binary = cli
            .build_engine_binary
            .clone()
            .or(file.build_engine_binary)
            .unwrap_or_else(|| DEFAULT_BUILD_ENGINE_BINARY.to_string());

        let store_dir = cli
            .store_dir
            .clone()
            .or_else(|| file.store_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        Self {
            socket,
            build_engine_binary,
            store_dir,
        }
    }
}

pub fn manager(root: Option<PathBuf>) -> composer_config::Manager {
    match root {
        Some(root) => composer_config::Manager::system(root, PROGRAM),
        None => composer_config::Manager::user(PROGRAM).unwrap_or_else(|| composer_config::Manager::system("/", PROGRAM)),
    }
}
