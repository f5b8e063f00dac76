// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use clap::Parser;
use composer_worker::cli::Args;
use composer_worker::client::JobClient;
use composer_worker::config::{self, WorkerConfig};
use composer_worker::Error;

/// Consecutive transport failures tolerated before giving up on the job
/// queue socket and exiting non-zero (spec §4.7: "0 on clean shutdown,
/// non-zero only on unrecoverable IO").
const MAX_CONSECUTIVE_CLAIM_FAILURES: u32 = 5;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let manager = config::manager(args.config_root.clone());
    let file_config = manager.load::<config::FileConfig>();
    let settings = WorkerConfig::resolve(file_config, &args);

    if let Err(error) = std::fs::create_dir_all(&settings.store_dir) {
        eprintln!("Error: create output store directory {}: {error}", settings.store_dir.display());
        std::process::exit(1);
    }

    log::info!("composer-worker connecting to {}", settings.socket.display());
    let client = JobClient::new(settings.socket.clone());

    let mut consecutive_claim_failures = 0u32;

    loop {
        match composer_worker::run_one(&client, &settings.build_engine_binary, &settings.store_dir).await {
            Ok(()) => consecutive_claim_failures = 0,
            Err(Error::Claim(source)) => {
                consecutive_claim_failures += 1;
                log::error!("claim job queue socket failed ({consecutive_claim_failures}/{MAX_CONSECUTIVE_CLAIM_FAILURES}): {source}");

                if consecutive_claim_failures >= MAX_CONSECUTIVE_CLAIM_FAILURES {
                    eprintln!("Error: job queue socket unreachable after {consecutive_claim_failures} attempts: {source}");
                    std::process::exit(1);
                }

                tokio::time::sleep(Duration::from_secs(1 << consecutive_claim_failures.min(5))).await;
            }
            Err(error @ Error::Report(_)) => {
                // The job itself already reached a terminal state on the
                // build-engine side; only the report call back to the queue
                // failed. Keep looping rather than aborting the worker.
                consecutive_claim_failures = 0;
                log::error!("worker cycle failed: {error}");
            }
        }
    }
}
