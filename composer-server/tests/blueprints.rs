// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end exercise of the `/api/v0/*` and `/job-queue/v1/*` surfaces
//! through `tower::ServiceExt::oneshot`, without binding a real socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use composer_server::{build_app, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn state() -> Arc<AppState> {
    let store = composer_store::BlueprintStore::in_memory();
    let distribution = composer_distro::fedora30::distribution();
    let queue = composer_queue::JobQueue::new();
    let solver = composer_solver::SolverClient::new("composer-dnf-solver");
    Arc::new(AppState::new(store, distribution, queue, solver))
}

fn minimal_blueprint(name: &str) -> Value {
    json!({
        "name": name,
        "version": "0.0.1",
        "packages": [{"name": "tmux", "version": "*"}],
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn blueprint_lifecycle_put_info_list() {
    let app = build_app(state());

    let put = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(minimal_blueprint("base").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);

    let info = app
        .clone()
        .oneshot(Request::builder().uri("/api/v0/blueprints/info/base").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(info.status(), StatusCode::OK);
    let info = body_json(info).await;
    assert_eq!(info["blueprint"]["name"], "base");
    assert_eq!(info["changed"], false);

    let list = app
        .clone()
        .oneshot(Request::builder().uri("/api/v0/blueprints/list").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let list = body_json(list).await;
    assert_eq!(list["blueprints"], json!(["base"]));
}

#[tokio::test]
async fn workspace_shadows_committed_blueprint_until_deleted() {
    let app = build_app(state());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(minimal_blueprint("base").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let mut draft = minimal_blueprint("base");
    draft["description"] = json!("a draft edit");
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/workspace")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(draft.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let info = body_json(
        app.clone()
            .oneshot(Request::builder().uri("/api/v0/blueprints/info/base").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(info["changed"], true);
    assert_eq!(info["blueprint"]["description"], "a draft edit");

    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v0/blueprints/workspace/base")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let info = body_json(
        app.clone()
            .oneshot(Request::builder().uri("/api/v0/blueprints/info/base").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(info["changed"], false);
    assert_eq!(info["blueprint"]["description"], "");
}

#[tokio::test]
async fn info_on_unknown_blueprint_is_404_not_found() {
    let app = build_app(state());

    let response = app
        .oneshot(Request::builder().uri("/api/v0/blueprints/info/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["id"], "NotFound");
}

#[tokio::test]
async fn empty_body_on_new_blueprint_is_400_parse_error() {
    let app = build_app(state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["id"], "ParseError");
}

#[tokio::test]
async fn toml_content_type_round_trips_through_info() {
    let app = build_app(state());

    let toml_body = "name = \"tomled\"\nversion = \"0.0.1\"\n";
    let put = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/toml")
                .body(Body::from(toml_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::OK);

    let info = app
        .oneshot(
            Request::builder()
                .uri("/api/v0/blueprints/info/tomled?format=toml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(info.status(), StatusCode::OK);
    let bytes = info.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("name = \"tomled\""));
}

#[tokio::test]
async fn repost_of_same_payload_bumps_patch_version() {
    let app = build_app(state());
    let body = minimal_blueprint("stable");

    for _ in 0..2 {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v0/blueprints/new")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    let info = body_json(
        app.oneshot(Request::builder().uri("/api/v0/blueprints/info/stable").body(Body::empty()).unwrap()).await.unwrap(),
    )
    .await;
    assert_eq!(info["blueprint"]["version"], "0.0.2");
}

#[tokio::test]
async fn compose_enqueues_a_waiting_job_the_worker_can_claim_and_finish() {
    let app = build_app(state());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(minimal_blueprint("imagey").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let compose = body_json(
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v0/compose")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({"blueprint-name": "imagey", "format": "vmdk"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(compose["status"], true);
    let build_id = compose["build_id"].as_str().unwrap().to_string();

    let claimed = body_json(
        app.clone()
            .oneshot(Request::builder().method("POST").uri("/job-queue/v1/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(claimed["id"], build_id);
    assert_eq!(claimed["status"], "RUNNING");
    assert_eq!(claimed["recipe"]["assembler"]["name"], "qemu");

    let update = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/job-queue/v1/jobs/{build_id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "status": "FINISHED",
                        "image": {
                            "format": "vmdk",
                            "filename": "disk.vmdk",
                            "mime_type": "application/x-vmdk",
                            "output_ref": "refs/deadbeef/disk.vmdk",
                        },
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_compose_format_is_404_unknown_format() {
    let app = build_app(state());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(minimal_blueprint("imagey").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/compose")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"blueprint-name": "imagey", "format": "floppy"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["id"], "UnknownFormat");
}

#[tokio::test]
async fn undo_against_unknown_commit_is_400_invalid_blueprint() {
    let app = build_app(state());

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/new")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(minimal_blueprint("history").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v0/blueprints/undo/history/0000000000000000000000000000000000000000000000000000000000000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["id"], "UnknownCommit");
}
