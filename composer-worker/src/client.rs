// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! HTTP-over-Unix-socket client for the `/job-queue/v1/*` surface (spec
//! §6), built on `hyperlocal` + `hyper-util`'s legacy client rather than
//! hand-rolled framing — the pairing the workspace settled on for
//! speaking hyper 1.x over `AF_UNIX`.

use std::path::PathBuf;

use composer_queue::{ImageResult, Job, JobStatus};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request to job queue")]
    Request(#[source] hyper_util::client::legacy::Error),
    #[error("read job queue response body")]
    Body(#[source] hyper::Error),
    #[error("parse job queue response")]
    Parse(#[source] serde_json::Error),
    #[error("build request")]
    Build(#[source] hyper::http::Error),
    #[error("job queue rejected update with status {0}")]
    Rejected(StatusCode),
}

pub struct JobClient {
    client: Client<UnixConnector, Full<Bytes>>,
    socket: PathBuf,
}

impl JobClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::unix(),
            socket: socket.into(),
        }
    }

    fn uri(&self, path: &str) -> hyper::Uri {
        Uri::new(&self.socket, path).into()
    }

    /// Long-poll `POST /job-queue/v1/jobs`. The server blocks until a job
    /// is available, so this call may take an arbitrarily long time.
    pub async fn claim(&self) -> Result<Job, Error> {
        let request = Request::builder()
            .method("POST")
            .uri(self.uri("/job-queue/v1/jobs"))
            .body(Full::new(Bytes::new()))
            .map_err(Error::Build)?;

        let response = self.client.request(request).await.map_err(Error::Request)?;
        let body = response.into_body().collect().await.map_err(Error::Body)?.to_bytes();
        serde_json::from_slice(&body).map_err(Error::Parse)
    }

    /// `PATCH /job-queue/v1/jobs/{id}` with a terminal status.
    pub async fn update(&self, id: Uuid, status: JobStatus, image: Option<ImageResult>) -> Result<(), Error> {
        #[derive(Serialize)]
        struct Body {
            status: JobStatus,
            #[serde(skip_serializing_if = "Option::is_none")]
            image: Option<ImageResult>,
        }

        let payload = serde_json::to_vec(&Body { status, image }).expect("job update payload is always serializable");

        let request = Request::builder()
            .method("PATCH")
            .uri(self.uri(&format!("/job-queue/v1/jobs/{id}")))
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(payload)))
            .map_err(Error::Build)?;

        let response = self.client.request(request).await.map_err(Error::Request)?;
        if !response.status().is_success() {
            return Err(Error::Rejected(response.status()));
        }
        Ok(())
    }
}
