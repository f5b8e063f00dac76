// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The worker loop (spec §4.7): long-poll the job queue, drive the
//! external build engine, report the terminal result back.

pub mod build_engine;
pub mod cli;
pub mod client;
pub mod config;

use std::path::Path;

use composer_queue::{ImageResult, Job, JobStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("claim job")]
    Claim(#[source] client::Error),
    #[error("report job result")]
    Report(#[source] client::Error),
}

/// One claim-build-report cycle. Build engine failures are reported back
/// as a `FAILED` update rather than propagated, matching spec §4.7: "the
/// worker never retries within a single job; the job queue surfaces
/// terminal failure to the requester."
pub async fn run_one(client: &client::JobClient, build_engine_binary: &str, store_dir: &Path) -> Result<(), Error> {
    let job = client.claim().await.map_err(Error::Claim)?;
    log::info!("claimed job {}", job.id);

    match build(&job, build_engine_binary, store_dir).await {
        Ok(image) => {
            log::info!("job {} finished: {}", job.id, image.output_ref);
            client.update(job.id, JobStatus::Finished, Some(image)).await.map_err(Error::Report)
        }
        Err(reason) => {
            log::error!("job {} failed: {reason}", job.id);
            client.update(job.id, JobStatus::Failed, None).await.map_err(Error::Report)
        }
    }
}

async fn build(job: &Job, build_engine_binary: &str, store_dir: &Path) -> Result<ImageResult, String> {
    let recipe_json = job.recipe.canonical_json().map_err(|e| e.to_string())?;

    let options = &job.recipe.assembler.options;
    let filename = option_str(options, "filename")?;
    let format = option_str(options, "format").unwrap_or_else(|_| job.recipe.assembler.name.clone());
    let mime_type = option_str(options, "mimeType")?;

    let output = build_engine::run(build_engine_binary, store_dir, store_dir, &recipe_json)
        .await
        .map_err(|e| e.to_string())?;

    Ok(ImageResult {
        format,
        output_ref: format!("refs/{}/{filename}", output.output_id),
        filename,
        mime_type,
    })
}

fn option_str(options: &composer_recipe::Options, key: &str) -> Result<String, String> {
    options
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("assembler options missing {key:?}"))
}
