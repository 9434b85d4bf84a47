// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for records, objects, keyring and audit | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `AUTH_LOGIN_URL` | Login endpoint used to verify credentials | Required |
//! | `SESSION_JWT_SECRET` | HS256 secret for bearer tokens (32+ bytes) | Required |
//! | `DIRECTORY_FILE` | JSON map of usernames to account ids | None |
//! | `LOCKOUT_MAX_FAILURES` | Failures before lockout | `5` |
//! | `LOCKOUT_WINDOW_SECS` | Window in which failures count | `300` |
//! | `LOCKOUT_COOLDOWN_SECS` | Lockout duration | `900` |
//! | `UNLOCK_TTL_SECS` | Lifetime of an unlock | `600` |
//! | `ATTEMPT_RETENTION_SECS` | How long attempts are kept | `3600` |
//! | `AUTH_TIMEOUT_SECS` | Credential check timeout | `10` |
//! | `REVEAL_CACHE_CAPACITY` | Revealed keys kept per subject | `64` |
//! | `SWEEP_INTERVAL_SECS` | Session reaper interval | `30` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | None (plain HTTP) |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::gate::GatePolicy;
use crate::reveal::DEFAULT_REVEAL_CAPACITY;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const AUTH_LOGIN_URL_ENV: &str = "AUTH_LOGIN_URL";
pub const SESSION_JWT_SECRET_ENV: &str = "SESSION_JWT_SECRET";
pub const DIRECTORY_FILE_ENV: &str = "DIRECTORY_FILE";
pub const LOCKOUT_MAX_FAILURES_ENV: &str = "LOCKOUT_MAX_FAILURES";
pub const LOCKOUT_WINDOW_SECS_ENV: &str = "LOCKOUT_WINDOW_SECS";
pub const LOCKOUT_COOLDOWN_SECS_ENV: &str = "LOCKOUT_COOLDOWN_SECS";
pub const UNLOCK_TTL_SECS_ENV: &str = "UNLOCK_TTL_SECS";
pub const ATTEMPT_RETENTION_SECS_ENV: &str = "ATTEMPT_RETENTION_SECS";
pub const AUTH_TIMEOUT_SECS_ENV: &str = "AUTH_TIMEOUT_SECS";
pub const REVEAL_CACHE_CAPACITY_ENV: &str = "REVEAL_CACHE_CAPACITY";
pub const SWEEP_INTERVAL_SECS_ENV: &str = "SWEEP_INTERVAL_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

const DEFAULT_DATA_DIR: &str = "/data";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum length of the bearer token signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub auth_login_url: Url,
    pub session_jwt_secret: Zeroizing<String>,
    pub directory_file: Option<PathBuf>,
    pub gate_policy: GatePolicy,
    pub reveal_cache_capacity: usize,
    pub sweep_interval: Duration,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_ENV,
                    reason: format!("expected json or pretty, got {other}"),
                })
            }
        };

        let auth_login_url = get(AUTH_LOGIN_URL_ENV)
            .ok_or(ConfigError::Missing(AUTH_LOGIN_URL_ENV))
            .and_then(|raw| parse_http_url(AUTH_LOGIN_URL_ENV, &raw))?;

        let session_jwt_secret = Zeroizing::new(
            get(SESSION_JWT_SECRET_ENV).ok_or(ConfigError::Missing(SESSION_JWT_SECRET_ENV))?,
        );
        if session_jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: SESSION_JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let defaults = GatePolicy::default();
        let gate_policy = GatePolicy {
            max_failures: parse_or(&get, LOCKOUT_MAX_FAILURES_ENV, defaults.max_failures)?,
            window: secs_or(&get, LOCKOUT_WINDOW_SECS_ENV, defaults.window)?,
            cooldown: secs_or(&get, LOCKOUT_COOLDOWN_SECS_ENV, defaults.cooldown)?,
            unlock_ttl: secs_or(&get, UNLOCK_TTL_SECS_ENV, defaults.unlock_ttl)?,
            attempt_retention: secs_or(
                &get,
                ATTEMPT_RETENTION_SECS_ENV,
                defaults.attempt_retention,
            )?,
            auth_timeout: secs_or(&get, AUTH_TIMEOUT_SECS_ENV, defaults.auth_timeout)?,
        };
        if gate_policy.max_failures == 0 {
            return Err(ConfigError::Invalid {
                var: LOCKOUT_MAX_FAILURES_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let reveal_cache_capacity =
            parse_or(&get, REVEAL_CACHE_CAPACITY_ENV, DEFAULT_REVEAL_CAPACITY)?;
        if reveal_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: REVEAL_CACHE_CAPACITY_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let sweep_interval = secs_or(&get, SWEEP_INTERVAL_SECS_ENV, DEFAULT_SWEEP_INTERVAL)?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, PORT_ENV, DEFAULT_PORT)?,
            log_format,
            auth_login_url,
            session_jwt_secret,
            directory_file: get(DIRECTORY_FILE_ENV).map(PathBuf::from),
            gate_policy,
            reveal_cache_capacity,
            sweep_interval,
            tls,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("auth_login_url", &self.auth_login_url.as_str())
            .field("session_jwt_secret", &"[REDACTED]")
            .field("directory_file", &self.directory_file)
            .field("gate_policy", &self.gate_policy)
            .field("reveal_cache_capacity", &self.reveal_cache_capacity)
            .field("sweep_interval", &self.sweep_interval)
            .field("tls", &self.tls)
            .finish()
    }
}

fn parse_http_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn parse_or<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn secs_or<G>(get: &G, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
