// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Username directory for directed sharing.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use unicode_normalization::UnicodeNormalization;

use super::RecipientResolver;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unknown username: {0}")]
    NotFound(String),

    #[error("failed to read directory file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid directory file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Canonical form used for lookups: NFKC, trimmed, lowercase.
pub fn normalize_username(username: &str) -> String {
    username.trim().nfkc().collect::<String>().to_lowercase()
}

/// Fixed username → account id map.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, account_id: impl Into<String>) -> Self {
        self.entries
            .insert(normalize_username(username), account_id.into());
        self
    }

    /// Parse a JSON object mapping usernames to account ids.
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(raw
            .into_iter()
            .fold(Self::new(), |dir, (name, id)| dir.with_user(&name, id)))
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let json = std::fs::read_to_string(path)?;
        let directory = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            users = directory.len(),
            "Loaded username directory"
        );
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RecipientResolver for StaticDirectory {
    async fn resolve_username(&self, username: &str) -> Result<String, DirectoryError> {
        self.entries
            .get(&normalize_username(username))
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_folds_case_and_compatibility_forms() {
        assert_eq!(normalize_username("  Alice "), "alice");
        // Fullwidth letters fold to ASCII under NFKC.
        assert_eq!(normalize_username("\u{FF22}\u{FF4F}\u{FF42}"), "bob");
    }

    #[tokio::test]
    async fn resolves_normalized_usernames() {
        let dir = StaticDirectory::from_json(r#"{"Alice": "acct-1", "bob": "acct-2"}"#).unwrap();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.resolve_username("ALICE").await.unwrap(), "acct-1");
        assert_eq!(dir.resolve_username(" bob").await.unwrap(), "acct-2");
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let dir = StaticDirectory::new().with_user("carol", "acct-3");
        assert!(matches!(
            dir.resolve_username("dave").await,
            Err(DirectoryError::NotFound(name)) if name == "dave"
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            StaticDirectory::from_json("[1, 2]"),
            Err(DirectoryError::Json(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), r#"{"erin": "acct-5"}"#).unwrap();
        let dir = StaticDirectory::load(temp.path()).unwrap();
        assert_eq!(dir.len(), 1);
    }
}
