// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::AuthenticatedSubject,
    gate::GatePhase,
    models::{
        DisclosureStatusResponse, DownloadResponse, FileListResponse, FileResponse, HideResponse,
        LockResponse, RevealResponse, ShareFileRequest, UnlockRequest, UnlockResponse,
        UploadFileRequest, VerifyResponse,
    },
    state::AppState,
};

pub mod disclosure;
pub mod files;
pub mod health;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/files", get(files::list_files).post(files::upload_file))
        .route("/files/received", get(files::list_received_files))
        .route(
            "/files/{file_id}",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/files/{file_id}/share", post(files::share_file))
        .route("/files/{file_id}/download", post(files::download_file))
        .route("/files/{file_id}/verify", post(files::verify_file))
        .route("/files/{file_id}/reveal", post(disclosure::reveal_key))
        .route("/files/{file_id}/hide", post(disclosure::hide_key))
        .route("/disclosure/unlock", post(disclosure::unlock))
        .route("/disclosure/lock", post(disclosure::lock))
        .route("/disclosure/status", get(disclosure::status));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        files::upload_file,
        files::list_files,
        files::list_received_files,
        files::get_file,
        files::delete_file,
        files::share_file,
        files::download_file,
        files::verify_file,
        disclosure::unlock,
        disclosure::lock,
        disclosure::status,
        disclosure::reveal_key,
        disclosure::hide_key,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            AuthenticatedSubject,
            GatePhase,
            UploadFileRequest,
            FileResponse,
            FileListResponse,
            ShareFileRequest,
            DownloadResponse,
            VerifyResponse,
            UnlockRequest,
            UnlockResponse,
            LockResponse,
            RevealResponse,
            HideResponse,
            DisclosureStatusResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Files", description = "File custody: upload, share, download, verify, delete"),
        (name = "Disclosure", description = "Gate unlock and key reveal"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{test_harness, test_state};
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
    };
    use base64ct::{Base64, Encoding};
    use chrono::Duration;
    use tower::ServiceExt;

    fn bearer(state: &AppState, subject: &str) -> String {
        let token = state.tokens.issue(subject, Duration::minutes(5)).unwrap();
        format!("Bearer {token}")
    }

    fn json_request(method: Method, uri: &str, auth: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, auth)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _temp) = test_state();
        let app = router(state);
        let response = app
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn files_require_bearer_token() {
        let (state, _temp) = test_state();
        let app = router(state);
        let (status, body) = send(
            &app,
            Request::get("/v1/files").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    /// Upload, share, unlock, download and delete over HTTP.
    #[tokio::test]
    async fn custody_flow_over_http() {
        let (state, _temp) = test_state();
        let alice = bearer(&state, "alice");
        let bob = bearer(&state, "bob");
        let app = router(state);

        let (status, file) = send(
            &app,
            json_request(
                Method::POST,
                "/v1/files",
                &alice,
                serde_json::json!({
                    "file_name": "plan.txt",
                    "content_base64": Base64::encode_string(b"the plan"),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let file_id = file["file_id"].as_str().unwrap().to_string();

        // Locked gate blocks sharing.
        let share_uri = format!("/v1/files/{file_id}/share");
        let (status, body) = send(
            &app,
            json_request(Method::POST, &share_uri, &alice, serde_json::json!({ "username": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["error_code"], "locked");

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/v1/disclosure/unlock",
                &alice,
                serde_json::json!({ "password": "alice-pw" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, shared) = send(
            &app,
            json_request(Method::POST, &share_uri, &alice, serde_json::json!({ "username": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shared["recipient_id"], "bob");
        assert_eq!(shared["revision"], 1);

        // Bob must unlock with his own credential before downloading.
        let download_uri = format!("/v1/files/{file_id}/download");
        let (status, _) = send(&app, empty_request(Method::POST, &download_uri, &bob)).await;
        assert_eq!(status, StatusCode::LOCKED);

        send(
            &app,
            json_request(
                Method::POST,
                "/v1/disclosure/unlock",
                &bob,
                serde_json::json!({ "password": "bob-pw" }),
            ),
        )
        .await;
        let (status, download) = send(&app, empty_request(Method::POST, &download_uri, &bob)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            Base64::decode_vec(download["content_base64"].as_str().unwrap()).unwrap(),
            b"the plan"
        );

        let (status, _) = send(
            &app,
            empty_request(Method::DELETE, &format!("/v1/files/{file_id}"), &alice),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(
            &app,
            empty_request(Method::GET, &format!("/v1/files/{file_id}"), &bob),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }

    #[tokio::test]
    async fn tampered_file_fails_verification() {
        let harness = test_harness();
        let alice = bearer(&harness.state, "alice");
        let record = harness
            .state
            .custody
            .upload("alice", "a.txt", b"data", None)
            .await
            .unwrap();
        harness.objects.corrupt(&record.storage_locator);
        let app = router(harness.state.clone());

        let (status, body) = send(
            &app,
            empty_request(
                Method::POST,
                &format!("/v1/files/{}/verify", record.file_id),
                &alice,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_code"], "tamper_detected");
    }

    #[tokio::test]
    async fn openapi_lists_custody_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/files/{file_id}/download"));
        assert!(doc.paths.paths.contains_key("/v1/disclosure/unlock"));
    }
}
