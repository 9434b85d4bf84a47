// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Requests carry `Authorization: Bearer <JWT>`, signed HS256 with the
//! configured session secret. The `sub` claim is the subject id every custody
//! operation acts as.
//!
//! A bearer token only identifies the caller. Disclosure still requires the
//! caller to unlock the gate with their account credential.

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::{AuthenticatedSubject, SessionClaims, SessionTokens};
pub use error::AuthError;
pub use extractor::Auth;
