// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CryptoVault Custody - Encrypted File Custody & Key Disclosure Service
//!
//! Files are encrypted at rest under a per-file key. Each holder of a file
//! gets that key wrapped under their own secret, and a key or payload is
//! released only after the holder re-presents their account credential.
//!
//! ## Modules
//!
//! - `crypto` - Key wrap/unwrap engine, payload cipher, keyring
//! - `storage` - File key store, record database, audit log
//! - `gate` - Disclosure gate and lockout policy
//! - `reveal` - Per-subject reveal sessions
//! - `integrity` - Content hash anchoring and verification
//! - `custody` - Upload, download, share and delete flows
//! - `providers` - Authentication, object storage and directory backends
//! - `api` / `auth` - HTTP surface (Axum) and bearer tokens

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod gate;
pub mod integrity;
pub mod models;
pub mod providers;
pub mod reveal;
pub mod session_reaper;
pub mod state;
pub mod storage;
