// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64ct::{Base64, Encoding};
use zeroize::Zeroizing;

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        DownloadResponse, FileListResponse, FileResponse, ShareFileRequest, UploadFileRequest,
        VerifyResponse,
    },
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/files",
    request_body = UploadFileRequest,
    tag = "Files",
    responses(
        (status = 201, body = FileResponse),
        (status = 400, description = "Invalid name, content or recipient"),
        (status = 503, description = "Object storage unavailable")
    )
)]
pub async fn upload_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Json(request): Json<UploadFileRequest>,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let content = Zeroizing::new(
        Base64::decode_vec(&request.content_base64)
            .map_err(|_| ApiError::bad_request("content_base64 is not valid base64"))?,
    );

    let record = state
        .custody
        .upload(
            &subject.subject_id,
            &request.file_name,
            &content,
            request.recipient_username.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    get,
    path = "/v1/files",
    tag = "Files",
    responses((status = 200, body = FileListResponse))
)]
pub async fn list_files(
    Auth(subject): Auth,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let records = state.custody.list_owned(&subject.subject_id)?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    get,
    path = "/v1/files/received",
    tag = "Files",
    responses((status = 200, body = FileListResponse))
)]
pub async fn list_received_files(
    Auth(subject): Auth,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let records = state.custody.list_received(&subject.subject_id)?;
    Ok(Json(records.into()))
}

#[utoipa::path(
    get,
    path = "/v1/files/{file_id}",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 200, body = FileResponse),
        (status = 403, description = "Caller does not hold the file"),
        (status = 404, description = "File not found")
    )
)]
pub async fn get_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state.custody.get_file(&subject.subject_id, &file_id)?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/files/{file_id}",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Caller does not hold the file"),
        (status = 404, description = "File not found"),
        (status = 503, description = "Object storage unavailable; nothing was deleted")
    )
)]
pub async fn delete_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .custody
        .delete_file(&subject.subject_id, &file_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/share",
    params(("file_id" = String, Path, description = "File identifier")),
    request_body = ShareFileRequest,
    tag = "Files",
    responses(
        (status = 200, body = FileResponse),
        (status = 403, description = "Caller is not the owner"),
        (status = 423, description = "Disclosure gate is locked")
    )
)]
pub async fn share_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Json(request): Json<ShareFileRequest>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state
        .custody
        .share_file(&subject.subject_id, &file_id, &request.username)
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/download",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 200, body = DownloadResponse),
        (status = 422, description = "Stored payload failed verification"),
        (status = 423, description = "Disclosure gate is locked")
    )
)]
pub async fn download_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let file = state
        .custody
        .download(&subject.subject_id, &file_id)
        .await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/verify",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 200, body = VerifyResponse),
        (status = 422, description = "Stored payload does not match its anchored hash")
    )
)]
pub async fn verify_file(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let record = state
        .custody
        .verify_file(&subject.subject_id, &file_id)
        .await?;
    Ok(Json(VerifyResponse {
        file_id: record.file_id,
        content_hash: record.content_hash.as_str().to_string(),
        verified: true,
    }))
}
