// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification backends.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use url::Url;
use zeroize::Zeroizing;

use super::CredentialVerifier;

/// A secret presented by a subject. Erased on drop, never printed.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential service unavailable: {0}")]
    Unavailable(String),

    #[error("credential service returned unexpected status {0}")]
    UnexpectedStatus(u16),
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Verifies a credential by performing a login call against the account service.
///
/// Account ids double as login usernames.
#[derive(Debug, Clone)]
pub struct LoginCredentialVerifier {
    login_url: Url,
    http: Client,
}

impl LoginCredentialVerifier {
    pub fn new(login_url: Url, timeout: Duration) -> Result<Self, CredentialError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { login_url, http })
    }
}

#[async_trait]
impl CredentialVerifier for LoginCredentialVerifier {
    async fn verify_credential(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError> {
        let response = self
            .http
            .post(self.login_url.clone())
            .json(&LoginRequest {
                username: subject_id,
                password: credential.expose(),
            })
            .send()
            .await
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            other => {
                tracing::warn!(
                    subject_id = %subject_id,
                    status = other.as_u16(),
                    "Login endpoint returned unexpected status"
                );
                Err(CredentialError::UnexpectedStatus(other.as_u16()))
            }
        }
    }
}

/// In-memory verifier for tests and local development.
#[derive(Default)]
pub struct MemoryCredentialVerifier {
    credentials: HashMap<String, Zeroizing<String>>,
}

impl MemoryCredentialVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, subject_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials
            .insert(subject_id.into(), Zeroizing::new(secret.into()));
        self
    }
}

#[async_trait]
impl CredentialVerifier for MemoryCredentialVerifier {
    async fn verify_credential(
        &self,
        subject_id: &str,
        credential: &Credential,
    ) -> Result<bool, CredentialError> {
        let Some(expected) = self.credentials.get(subject_id) else {
            return Ok(false);
        };
        Ok(ring::constant_time::verify_slices_are_equal(
            expected.as_bytes(),
            credential.expose().as_bytes(),
        )
        .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Login {
        username: String,
        password: String,
    }

    async fn login(Json(body): Json<Login>) -> AxumStatus {
        match (body.username.as_str(), body.password.as_str()) {
            ("broken", _) => AxumStatus::INTERNAL_SERVER_ERROR,
            ("alice", "correct horse") => AxumStatus::OK,
            _ => AxumStatus::UNAUTHORIZED,
        }
    }

    async fn spawn_login_server() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/api/v1/auth/login/", post(login));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/api/v1/auth/login/")).unwrap()
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("hunter2");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
    }

    #[tokio::test]
    async fn memory_verifier_checks_exact_secret() {
        let verifier = MemoryCredentialVerifier::new().with_account("alice", "pw");

        assert!(verifier
            .verify_credential("alice", &Credential::new("pw"))
            .await
            .unwrap());
        assert!(!verifier
            .verify_credential("alice", &Credential::new("pw "))
            .await
            .unwrap());
        assert!(!verifier
            .verify_credential("mallory", &Credential::new("pw"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn login_verifier_maps_statuses() {
        let url = spawn_login_server().await;
        let verifier = LoginCredentialVerifier::new(url, Duration::from_secs(5)).unwrap();

        assert!(verifier
            .verify_credential("alice", &Credential::new("correct horse"))
            .await
            .unwrap());
        assert!(!verifier
            .verify_credential("alice", &Credential::new("wrong"))
            .await
            .unwrap());
        assert!(matches!(
            verifier
                .verify_credential("broken", &Credential::new("x"))
                .await,
            Err(CredentialError::UnexpectedStatus(500))
        ));
    }

    #[tokio::test]
    async fn login_verifier_reports_unreachable_service() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/login")).unwrap();
        let verifier = LoginCredentialVerifier::new(url, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            verifier.verify_credential("alice", &Credential::new("x")).await,
            Err(CredentialError::Unavailable(_))
        ));
    }
}
