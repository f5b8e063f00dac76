// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::Parser;

/// Long-polls the job queue and drives the external build engine.
#[derive(Debug, Parser)]
#[command(name = "composer-worker", version)]
pub struct Args {
    /// Unix socket the job queue listens on.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Path to the `build-engine` subprocess binary.
    #[arg(long)]
    pub build_engine_binary: Option<String>,

    /// Content-addressed output store directory passed to the build engine.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Root to search for `/etc/<program>` and `/usr/share/<program>` config.
    #[arg(long)]
    pub config_root: Option<PathBuf>,
}
