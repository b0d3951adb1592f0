//! Boot sequence: configuration, logging, cache, resolver, executor, server.

use std::net::SocketAddr;
use std::sync::Arc;

use imgrelay_api::ApiServer;
use imgrelay_cache::{CacheStore, DiskCache};
use imgrelay_config::{ProxyConfig, load_from_env};
use imgrelay_fetch::FetchResolver;
use imgrelay_pipeline::Executor;
use imgrelay_telemetry::{
    GlobalContextGuard, LOG_FORMAT_ENV, LogFormat, LoggingConfig, Metrics, init_logging,
};
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the proxy.
pub(crate) struct BootstrapDependencies {
    pub(crate) logging: LoggingConfig<'static>,
    pub(crate) config: ProxyConfig,
    pub(crate) telemetry: Metrics,
}

impl BootstrapDependencies {
    pub(crate) fn from_env() -> AppResult<Self> {
        let format = LogFormat::from_override(std::env::var(LOG_FORMAT_ENV).ok().as_deref());
        let logging = LoggingConfig {
            format,
            ..LoggingConfig::default()
        };
        let config = load_from_env().map_err(|err| AppError::config("config.load", err))?;
        let telemetry = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;
        Ok(Self {
            logging,
            config,
            telemetry,
        })
    }
}

/// Load configuration from the environment, serve until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed,
/// the cache directory cannot be opened, or the listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("imgrelay");

    let BootstrapDependencies {
        logging: _,
        config,
        telemetry,
    } = dependencies;

    info!(
        cache_enabled = config.cache_enabled,
        whitelist_entries = config.whitelist.entries().len(),
        "image proxy bootstrap starting"
    );
    let (server, addr) = build_server(&config, telemetry).await?;
    server
        .serve(addr, shutdown_signal())
        .await
        .map_err(|err| AppError::api_server("serve", err))
}

/// Wire cache, resolver and executor into an [`ApiServer`] for `config`.
pub(crate) async fn build_server(
    config: &ProxyConfig,
    telemetry: Metrics,
) -> AppResult<(ApiServer, SocketAddr)> {
    let cache: Option<Arc<dyn CacheStore>> = if config.cache_enabled {
        let store = DiskCache::open(config.cache_folder.clone())
            .await
            .map_err(|err| AppError::cache("cache.open", err))?;
        info!(folder = %store.root().display(), "variant cache enabled");
        Some(Arc::new(store))
    } else {
        None
    };
    let resolver =
        FetchResolver::new(config).map_err(|err| AppError::fetch("resolver.new", err))?;
    let executor = Executor::new(resolver, cache, telemetry.clone());
    let addr = SocketAddr::new(config.bind_addr, config.port);
    Ok((ApiServer::new(executor, telemetry, config), addr))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, draining in-flight requests"),
        () = terminate => info!("received SIGTERM, draining in-flight requests"),
    }
}
