// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::Parser;

/// The blueprint and job-queue HTTP service.
#[derive(Debug, Parser)]
#[command(name = "composer-server", version)]
pub struct Args {
    /// Unix socket the blueprint API listens on.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Unix socket the worker-facing job queue listens on (defaults to `--socket`).
    #[arg(long)]
    pub job_socket: Option<PathBuf>,

    /// Path to the dependency-solver subprocess binary.
    #[arg(long)]
    pub solver_binary: Option<String>,

    /// Directory image artifacts are deposited under.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Directory the blueprint store persists commits and workspace
    /// entries under. Unset means in-memory only.
    #[arg(long)]
    pub blueprint_store_dir: Option<PathBuf>,

    /// Root to search for `/etc/<program>` and `/usr/share/<program>` config.
    #[arg(long)]
    pub config_root: Option<PathBuf>,
}
