// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::time::Instant;

use crate::{
    auth::Auth,
    error::ApiError,
    gate::GatePhase,
    models::{
        DisclosureStatusResponse, HideResponse, LockResponse, RevealResponse, UnlockRequest,
        UnlockResponse,
    },
    providers::Credential,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/disclosure/unlock",
    request_body = UnlockRequest,
    tag = "Disclosure",
    responses(
        (status = 200, body = UnlockResponse),
        (status = 401, description = "Credential rejected"),
        (status = 429, description = "Too many failures; retry after the cooldown"),
        (status = 503, description = "Authentication service unavailable")
    )
)]
pub async fn unlock(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Json(request): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>, ApiError> {
    let credential = Credential::new(request.password);
    let unlocked = state
        .custody
        .unlock(&subject.subject_id, &credential)
        .await?;

    Ok(Json(UnlockResponse {
        phase: GatePhase::Unlocked,
        expires_in_secs: unlocked
            .expires_at
            .saturating_duration_since(Instant::now())
            .as_secs(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/disclosure/lock",
    tag = "Disclosure",
    responses((status = 200, body = LockResponse))
)]
pub async fn lock(Auth(subject): Auth, State(state): State<AppState>) -> Json<LockResponse> {
    Json(LockResponse {
        was_unlocked: state.custody.lock(&subject.subject_id),
    })
}

#[utoipa::path(
    get,
    path = "/v1/disclosure/status",
    tag = "Disclosure",
    responses((status = 200, body = DisclosureStatusResponse))
)]
pub async fn status(
    Auth(subject): Auth,
    State(state): State<AppState>,
) -> Json<DisclosureStatusResponse> {
    Json(state.custody.status(&subject.subject_id).into())
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/reveal",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Disclosure",
    responses(
        (status = 200, body = RevealResponse),
        (status = 403, description = "Caller does not hold the file"),
        (status = 423, description = "Disclosure gate is locked")
    )
)]
pub async fn reveal_key(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<RevealResponse>, ApiError> {
    let key = state.custody.reveal_key(&subject.subject_id, &file_id)?;
    Ok(Json(RevealResponse {
        file_id,
        file_key: key.to_base64().as_str().to_owned(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/hide",
    params(("file_id" = String, Path, description = "File identifier")),
    tag = "Disclosure",
    responses((status = 200, body = HideResponse))
)]
pub async fn hide_key(
    Auth(subject): Auth,
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Json<HideResponse> {
    let hidden = state.custody.hide_key(&subject.subject_id, &file_id);
    Json(HideResponse { file_id, hidden })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticatedSubject;
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;

    fn auth(subject: &str) -> Auth {
        Auth(AuthenticatedSubject {
            subject_id: subject.to_string(),
            session_id: None,
            expires_at: 0,
        })
    }

    fn unlock_request(password: &str) -> Json<UnlockRequest> {
        Json(UnlockRequest {
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn unlock_then_lock() {
        let (state, _temp) = test_state();

        let Json(unlocked) = unlock(auth("alice"), State(state.clone()), unlock_request("alice-pw"))
            .await
            .unwrap();
        assert_eq!(unlocked.phase, GatePhase::Unlocked);
        assert!(unlocked.expires_in_secs > 0);

        let Json(current) = status(auth("alice"), State(state.clone())).await;
        assert_eq!(current.phase, GatePhase::Unlocked);

        let Json(locked) = lock(auth("alice"), State(state.clone())).await;
        assert!(locked.was_unlocked);
        let Json(current) = status(auth("alice"), State(state)).await;
        assert_eq!(current.phase, GatePhase::Locked);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized_then_locked_out() {
        let (state, _temp) = test_state();
        for _ in 0..5 {
            let err = unlock(auth("bob"), State(state.clone()), unlock_request("nope"))
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }

        let err = unlock(auth("bob"), State(state.clone()), unlock_request("bob-pw"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);

        let Json(current) = status(auth("bob"), State(state)).await;
        assert!(current.lockout_remaining_secs.is_some());
    }

    #[tokio::test]
    async fn reveal_and_hide() {
        let (state, _temp) = test_state();
        let record = state
            .custody
            .upload("alice", "k.txt", b"x", None)
            .await
            .unwrap();

        let err = reveal_key(auth("alice"), State(state.clone()), Path(record.file_id.clone()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::LOCKED);

        unlock(auth("alice"), State(state.clone()), unlock_request("alice-pw"))
            .await
            .unwrap();
        let Json(revealed) =
            reveal_key(auth("alice"), State(state.clone()), Path(record.file_id.clone()))
                .await
                .unwrap_or_else(|e| panic!("reveal failed: {}", e.message));
        assert_eq!(revealed.file_key.len(), 44);

        let Json(current) = status(auth("alice"), State(state.clone())).await;
        assert_eq!(current.revealed_file_ids, vec![record.file_id.clone()]);

        let Json(hidden) = hide_key(auth("alice"), State(state.clone()), Path(record.file_id)).await;
        assert!(hidden.hidden);
        let Json(current) = status(auth("alice"), State(state)).await;
        assert!(current.revealed_file_ids.is_empty());
    }
}
