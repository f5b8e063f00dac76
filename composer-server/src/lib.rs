// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The blueprint HTTP service (spec §4.6): the axum app is exposed as a
//! library so integration tests can drive it with `tower::ServiceExt`
//! without binding a real socket.

pub mod cli;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_app;
pub use state::AppState;
