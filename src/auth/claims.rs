// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims and HS256 signing.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AuthError;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the account id the request acts as.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// The subject a request was authenticated as.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedSubject {
    pub subject_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp).
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedSubject {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            subject_id: claims.sub,
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }
}

/// Issues and verifies HS256 session tokens.
pub struct SessionTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionTokens {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, subject_id: &str, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            sid: Some(uuid::Uuid::new_v4().to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedSubject, AuthError> {
        let token_data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AuthError::EmptySubject);
        }
        Ok(AuthenticatedSubject::from_claims(token_data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_verifies() {
        let tokens = SessionTokens::new(SECRET);
        let token = tokens.issue("alice", Duration::minutes(5)).unwrap();

        let subject = tokens.verify(&token).unwrap();
        assert_eq!(subject.subject_id, "alice");
        assert!(subject.session_id.is_some());
        assert!(subject.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = SessionTokens::new(SECRET);
        let token = tokens.issue("alice", Duration::hours(-1)).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = SessionTokens::new(b"another-secret-another-secret-xx");
        let token = other.issue("alice", Duration::minutes(5)).unwrap();
        assert!(matches!(
            SessionTokens::new(SECRET).verify(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_and_empty_subject_are_rejected() {
        let tokens = SessionTokens::new(SECRET);
        assert!(matches!(
            tokens.verify("not.a.token"),
            Err(AuthError::MalformedToken)
        ));

        let token = tokens.issue(" ", Duration::minutes(5)).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AuthError::EmptySubject)));
    }
}
