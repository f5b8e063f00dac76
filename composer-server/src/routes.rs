// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The `/api/v0/*` blueprint surface and the `/job-queue/v1/*` worker
//! surface (spec §4.6), multiplexed under one `axum::Router` bound to a
//! single Unix socket.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use composer_queue::{ImageResult, JobStatus};
use composer_store::{Blueprint, Format};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v0/blueprints/new", post(blueprints_new))
        .route("/api/v0/blueprints/workspace", post(blueprints_workspace))
        .route("/api/v0/blueprints/delete/{name}", delete(blueprints_delete))
        .route("/api/v0/blueprints/workspace/{name}", delete(blueprints_delete_workspace))
        .route("/api/v0/blueprints/info/{name}", get(blueprints_info))
        .route("/api/v0/blueprints/list", get(blueprints_list))
        .route("/api/v0/blueprints/changes/{names}", get(blueprints_changes))
        .route("/api/v0/blueprints/tag/{name}", post(blueprints_tag))
        .route("/api/v0/blueprints/undo/{name}/{commit}", post(blueprints_undo))
        .route("/api/v0/blueprints/depsolve/{name}", get(blueprints_depsolve))
        .route("/api/v0/blueprints/freeze/{name}", get(blueprints_freeze))
        .route("/api/v0/compose", post(compose))
        .route("/job-queue/v1/jobs", post(jobs_claim))
        .route("/job-queue/v1/jobs/{id}", patch(jobs_update))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusOnly {
    status: bool,
}

fn ok() -> Json<StatusOnly> {
    Json(StatusOnly { status: true })
}

fn request_format(headers: &HeaderMap) -> Format {
    let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if content_type.contains("toml") {
        Format::Toml
    } else {
        Format::Json
    }
}

fn response_format(query: &HashMap<String, String>) -> Format {
    match query.get("format").map(|s| s.as_str()) {
        Some("toml") => Format::Toml,
        _ => Format::Json,
    }
}

fn render_blueprint(bp: &Blueprint, format: Format) -> Result<Response, ApiError> {
    match format {
        Format::Json => Ok(Json(bp).into_response()),
        Format::Toml => {
            let body = toml::to_string(bp).map_err(|e| ApiError::Parse(e.to_string()))?;
            Ok(([(axum::http::header::CONTENT_TYPE, "application/toml")], body).into_response())
        }
    }
}

async fn parse_body(headers: HeaderMap, bytes: Bytes) -> Result<Blueprint, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::Parse("empty request body".to_string()));
    }
    composer_store::parse_blueprint(&bytes, request_format(&headers)).map_err(ApiError::from)
}

async fn blueprints_new(State(state): State<Arc<AppState>>, headers: HeaderMap, bytes: Bytes) -> Result<Json<StatusOnly>, ApiError> {
    let bp = parse_body(headers, bytes).await?;
    state.store.put_blueprint(bp).await?;
    Ok(ok())
}

async fn blueprints_workspace(State(state): State<Arc<AppState>>, headers: HeaderMap, bytes: Bytes) -> Result<Json<StatusOnly>, ApiError> {
    let bp = parse_body(headers, bytes).await?;
    state.store.put_workspace(bp).await?;
    Ok(ok())
}

async fn blueprints_delete(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Json<StatusOnly>, ApiError> {
    state.store.delete_blueprint(&name).await?;
    Ok(ok())
}

async fn blueprints_delete_workspace(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Json<StatusOnly>, ApiError> {
    state.store.delete_workspace(&name).await?;
    Ok(ok())
}

#[derive(Serialize)]
struct InfoResponse {
    blueprint: Blueprint,
    changed: bool,
}

async fn blueprints_info(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let info = state.store.get_info(&name).await?;
    match response_format(&query) {
        Format::Json => Ok(Json(InfoResponse {
            blueprint: info.blueprint,
            changed: info.changed,
        })
        .into_response()),
        Format::Toml => render_blueprint(&info.blueprint, Format::Toml),
    }
}

#[derive(Serialize)]
struct ListResponse {
    blueprints: Vec<String>,
}

async fn blueprints_list(State(state): State<Arc<AppState>>) -> Json<ListResponse> {
    Json(ListResponse {
        blueprints: state.store.list().await,
    })
}

async fn blueprints_changes(State(state): State<Arc<AppState>>, Path(names): Path<String>) -> Result<Response, ApiError> {
    let names: Vec<String> = names.split(',').map(|s| s.to_string()).collect();
    let changes = state.store.changes(&names).await?;
    Ok(Json(json!({ "blueprints": changes })).into_response())
}

#[derive(Serialize)]
struct TagResponse {
    status: bool,
    revision: u64,
}

async fn blueprints_tag(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Json<TagResponse>, ApiError> {
    let revision = state.store.tag(&name).await?;
    Ok(Json(TagResponse { status: true, revision }))
}

async fn blueprints_undo(State(state): State<Arc<AppState>>, Path((name, commit)): Path<(String, String)>) -> Result<Json<StatusOnly>, ApiError> {
    state.store.undo(&name, &commit).await?;
    Ok(ok())
}

async fn blueprints_depsolve(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let resolved = state.store.depsolve(&name, &state.distribution.repos, &state.solver).await?;
    Ok(Json(json!({ "packages": resolved })).into_response())
}

async fn blueprints_freeze(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let blueprint = state.store.freeze(&name, &state.distribution.repos, &state.solver).await?;
    Ok(Json(json!({ "blueprint": blueprint })).into_response())
}

#[derive(Deserialize)]
struct ComposeRequest {
    #[serde(rename = "blueprint-name")]
    blueprint_name: String,
    format: String,
}

#[derive(Serialize)]
struct ComposeResponse {
    status: bool,
    build_id: uuid::Uuid,
}

async fn compose(State(state): State<Arc<AppState>>, Json(request): Json<ComposeRequest>) -> Result<Json<ComposeResponse>, ApiError> {
    let info = state.store.get_info(&request.blueprint_name).await?;
    let recipe = state.distribution.compose(&info.blueprint, &request.format)?;
    let build_id = state.queue.enqueue(recipe).await;
    Ok(Json(ComposeResponse { status: true, build_id }))
}

async fn jobs_claim(State(state): State<Arc<AppState>>) -> Json<composer_queue::Job> {
    Json(state.queue.claim().await)
}

#[derive(Deserialize)]
struct JobUpdateRequest {
    status: JobStatus,
    #[serde(default)]
    image: Option<ImageResult>,
}

async fn jobs_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(request): Json<JobUpdateRequest>,
) -> Result<Json<StatusOnly>, ApiError> {
    state.queue.update(id, request.status, request.image).await?;
    Ok(ok())
}
