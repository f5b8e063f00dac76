// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use composer_distro::Distribution;
use composer_queue::JobQueue;
use composer_solver::SolverClient;
use composer_store::BlueprintStore;

/// Shared daemon state: one blueprint store, one active distribution, one
/// job queue, one solver client. All fields are themselves cheap to clone
/// or already internally `Arc`-backed, so the whole state is handed to
/// `axum` behind a single `Arc<AppState>`.
pub struct AppState {
    pub store: BlueprintStore,
    pub distribution: Distribution,
    pub queue: JobQueue,
    pub solver: SolverClient,
}

impl AppState {
    pub fn new(store: BlueprintStore, distribution: Distribution, queue: JobQueue, solver: SolverClient) -> Self {
        Self {
            store,
            distribution,
            queue,
            solver,
        }
    }
}
