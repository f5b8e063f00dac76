// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::error::Error as _;
use std::sync::Arc;

use clap::Parser;
use composer_server::cli::Args;
use composer_server::config::{self, ServerConfig};
use composer_server::{build_app, AppState};
use thiserror::Error;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(error) = run().await {
        report_error(&error);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let args = Args::parse();

    let manager = config::manager(args.config_root.clone());
    let file_config = manager.load::<config::FileConfig>();
    let settings = ServerConfig::resolve(file_config, &args);
    let overrides = manager.load::<composer_config::DistroOverrides>().unwrap_or_default();

    let store = match &settings.blueprint_store_dir {
        Some(dir) => composer_store::BlueprintStore::open(dir).map_err(Error::Store)?,
        None => composer_store::BlueprintStore::in_memory(),
    };
    let distribution = composer_distro::fedora30::distribution().with_overrides(&overrides);
    let queue = composer_queue::JobQueue::new();
    let solver = composer_solver::SolverClient::new(settings.solver_binary.clone());

    let state = Arc::new(AppState::new(store, distribution, queue, solver));
    let app = build_app(state);

    let listener = bind(&settings.socket)?;
    log::info!("composer-server listening on {}", settings.socket.display());

    if settings.job_socket == settings.socket {
        axum::serve(listener, app).await.map_err(Error::Serve)?;
    } else {
        let job_listener = bind(&settings.job_socket)?;
        log::info!("composer-server job queue also listening on {}", settings.job_socket.display());

        let primary = axum::serve(listener, app.clone());
        let secondary = axum::serve(job_listener, app);
        tokio::try_join!(primary, secondary).map_err(Error::Serve)?;
    }

    Ok(())
}

fn bind(socket: &std::path::Path) -> Result<tokio::net::UnixListener, Error> {
    if socket.exists() {
        std::fs::remove_file(socket).map_err(Error::Bind)?;
    }
    if let Some(parent) = socket.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Bind)?;
    }
    tokio::net::UnixListener::bind(socket).map_err(Error::Bind)
}

fn report_error(error: &Error) {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    eprintln!("Error: {}", chain.join(": "));
}

#[derive(Debug, Error)]
enum Error {
    #[error("load blueprint store")]
    Store(#[source] composer_store::Error),
    #[error("bind socket")]
    Bind(#[source] std::io::Error),
    #[error("serve")]
    Serve(#[source] std::io::Error),
}
