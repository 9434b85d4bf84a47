// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cryptovault_custody::{
    api::router,
    auth::SessionTokens,
    config::{AppConfig, LogFormat},
    crypto::Keyring,
    custody::CustodyService,
    error::CustodyError,
    gate::DisclosureGate,
    providers::{
        CredentialError, DirectoryError, FsObjectStore, LoginCredentialVerifier, ObjectStore,
        StaticDirectory,
    },
    session_reaper::SessionReaper,
    state::AppState,
    storage::{DataDir, FileKeyStore, RecordDatabase, StorageError, StoragePaths},
};

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("credential verifier: {0}")]
    Credentials(#[from] CredentialError),

    #[error("directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("custody: {0}")]
    Custody(#[from] CustodyError),

    #[error("invalid bind address {0}")]
    BindAddress(String),

    #[error("TLS: {0}")]
    Tls(std::io::Error),

    #[error("server: {0}")]
    Server(std::io::Error),
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CryptoVault custody starting"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter())
            .init(),
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    // Install the ring crypto provider for rustls before any TLS operations
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let mut data_dir = DataDir::new(StoragePaths::new(&config.data_dir));
    data_dir.initialize()?;
    info!(data_dir = %config.data_dir.display(), "Data directory ready");

    let keyring = Arc::new(Keyring::load_or_generate(&data_dir)?);
    let records = RecordDatabase::open(&data_dir.paths().records_db())?;
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(data_dir.clone()));

    let directory = match &config.directory_file {
        Some(path) => StaticDirectory::load(path)?,
        None => {
            warn!("DIRECTORY_FILE not set; sharing by username will find no recipients");
            StaticDirectory::new()
        }
    };

    let store = Arc::new(FileKeyStore::new(
        records,
        objects.clone(),
        Arc::new(directory),
    ));
    let resumed = store.resume_pending_deletes().await?;
    if resumed > 0 {
        info!(resumed, "Finished deletes interrupted by the last shutdown");
    }

    let verifier = LoginCredentialVerifier::new(
        config.auth_login_url.clone(),
        config.gate_policy.auth_timeout,
    )?;
    let gate = Arc::new(DisclosureGate::new(
        Arc::new(verifier),
        config.gate_policy.clone(),
    ));

    let custody = Arc::new(CustodyService::new(
        data_dir,
        keyring,
        store,
        objects,
        gate,
        config.reveal_cache_capacity,
    ));

    let shutdown = CancellationToken::new();
    let reaper = tokio::spawn(
        SessionReaper::new(custody.clone(), config.sweep_interval).run(shutdown.clone()),
    );

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone(), shutdown.clone()));

    let tokens = SessionTokens::new(config.session_jwt_secret.as_bytes());
    let app = router(AppState::new(custody, tokens));

    let bind_address = config.bind_address();
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|_| StartupError::BindAddress(bind_address.clone()))?;

    let served = match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(StartupError::Tls)?;
            info!(%addr, "CryptoVault custody listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            warn!("TLS_CERT_PATH and TLS_KEY_PATH not set; serving plain HTTP");
            info!(%addr, "CryptoVault custody listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    shutdown.cancel();
    if let Err(e) = reaper.await {
        warn!(error = %e, "Session reaper task failed");
    }
    served.map_err(StartupError::Server)
}

async fn shutdown_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
}
