// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The HTTP error taxonomy (spec §7), converted from each library crate's
//! own `thiserror` error type via `#[from]`, and lowered to the
//! `{status: false, errors: [{id, msg}]}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid blueprint: {0}")]
    InvalidBlueprint(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error("unknown commit: {0}")]
    UnknownCommit(String),
    #[error("solver error: {0}")]
    SolverError(String),
    #[error("solver I/O violation")]
    SolverIoError,
    #[error("build failed")]
    BuildFailed,
    #[error("invalid job transition")]
    InvalidTransition,
}

impl ApiError {
    fn id(&self) -> &'static str {
        match self {
            ApiError::Parse(_) => "ParseError",
            ApiError::InvalidBlueprint(_) => "InvalidBlueprint",
            ApiError::NotFound(_) => "NotFound",
            ApiError::UnknownFormat(_) => "UnknownFormat",
            ApiError::UnknownCommit(_) => "UnknownCommit",
            ApiError::SolverError(_) => "SolverError",
            ApiError::SolverIoError => "SolverIOError",
            ApiError::BuildFailed => "BuildFailed",
            ApiError::InvalidTransition => "InvalidTransition",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Parse(_) | ApiError::InvalidBlueprint(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::UnknownFormat(_) | ApiError::UnknownCommit(_) => StatusCode::NOT_FOUND,
            ApiError::SolverError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SolverIoError | ApiError::BuildFailed => StatusCode::BAD_GATEWAY,
            ApiError::InvalidTransition => StatusCode::CONFLICT,
        }
    }
}

#[derive(Serialize)]
struct ErrorEntry {
    id: &'static str,
    msg: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: bool,
    errors: Vec<ErrorEntry>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // SolverIOError/BuildFailed are logged with full detail and reported
        // to the client with a generic message (spec §7 propagation policy).
        let public_message = match &self {
            ApiError::SolverIoError => {
                log::error!("solver subprocess protocol violation");
                "solver subprocess protocol violation".to_string()
            }
            ApiError::BuildFailed => {
                log::error!("build engine failed");
                "build failed".to_string()
            }
            other => other.to_string(),
        };

        let status = self.status();
        let body = ErrorEnvelope {
            status: false,
            errors: vec![ErrorEntry {
                id: self.id(),
                msg: public_message,
            }],
        };

        (status, Json(body)).into_response()
    }
}

impl From<composer_store::Error> for ApiError {
    fn from(error: composer_store::Error) -> Self {
        match error {
            composer_store::Error::NotFound(name) => ApiError::NotFound(name),
            composer_store::Error::Parse(reason) => ApiError::Parse(reason),
            composer_store::Error::InvalidBlueprint(e) => ApiError::InvalidBlueprint(e.to_string()),
            composer_store::Error::UnknownCommit(id) => ApiError::UnknownCommit(id),
            composer_store::Error::Solver(e) => e.into(),
            composer_store::Error::Commit(e) => ApiError::Parse(e.to_string()),
            composer_store::Error::Io(e) => ApiError::Parse(e.to_string()),
        }
    }
}

impl From<composer_distro::Error> for ApiError {
    fn from(error: composer_distro::Error) -> Self {
        match error {
            composer_distro::Error::UnknownFormat(format) => ApiError::UnknownFormat(format),
            composer_distro::Error::InvalidBlueprint(reason) => ApiError::InvalidBlueprint(reason),
            composer_distro::Error::Crypt(reason) => ApiError::InvalidBlueprint(reason),
        }
    }
}

impl From<composer_solver::Error> for ApiError {
    fn from(error: composer_solver::Error) -> Self {
        match error {
            composer_solver::Error::Solver(structured) => ApiError::SolverError(structured.reason),
            _ => ApiError::SolverIoError,
        }
    }
}

impl From<composer_queue::Error> for ApiError {
    fn from(error: composer_queue::Error) -> Self {
        match error {
            composer_queue::Error::NotFound(id) => ApiError::NotFound(id.to_string()),
            composer_queue::Error::InvalidTransition { .. } => ApiError::InvalidTransition,
        }
    }
}
