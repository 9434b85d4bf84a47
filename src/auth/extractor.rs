// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated subjects.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(subject): Auth) -> impl IntoResponse {
//!     // subject.subject_id is the caller's account id
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedSubject};
use crate::state::AppState;

pub struct Auth(pub AuthenticatedSubject);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(subject) = parts.extensions.get::<AuthenticatedSubject>().cloned() {
            return Ok(Auth(subject));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let subject = state.tokens.verify(token.trim())?;
        Ok(Auth(subject))
    }
}
