//! Runs a gateway from a TOML configuration file until interrupted.
//!
//! Usage:
//!
//! ```text
//! toolgate [config-path]
//! ```
//!
//! Without an argument the path is taken from `TOOLGATE_CONFIG`; without
//! either the built-in defaults apply and no servers are registered.
//! `RUST_LOG` controls log verbosity and defaults to `info`.

use mockable::DefaultClock;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use toolgate::{
    config::{CONFIG_PATH_ENV, ConfigError, GatewayConfig, StorageBackend},
    connection_pool::services::ConnectionPool,
    gateway::{
        adapters::{DefaultSecurityPolicy, TracingAuditSink},
        domain::GatewayError,
        services::Gateway,
    },
    resilience::{adapters::PoolExecutor, services::RetryExecutor},
    tool_registry::{
        adapters::{
            CachedRegistryStore, memory::InMemoryRegistryStore, postgres::PostgresRegistryStore,
        },
        domain::{ServerFilter, ServerStatus, UserId},
        ports::{RegistryStore, RegistryStoreError},
        services::{ToolRegistry, ToolRegistryError},
    },
    transport::adapters::DefaultTransportConnector,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that stop the gateway from starting or shutting down cleanly.
#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("registry store unavailable: {0}")]
    Store(#[from] RegistryStoreError),
    #[error("failed to load registry: {0}")]
    Registry(#[from] ToolRegistryError),
    #[error("gateway failure: {0}")]
    Gateway(#[from] GatewayError),
}

fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = load_config()?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::from)?;
    runtime.block_on(serve(config)).map_err(Into::into)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
}

fn load_config() -> Result<GatewayConfig, AppError> {
    let Some(path) = config_path() else {
        info!("no configuration file given; using defaults");
        let mut config = GatewayConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        return Ok(config);
    };
    info!(path = %path.display(), "loading configuration");
    Ok(GatewayConfig::load(&path)?)
}

async fn serve(config: GatewayConfig) -> Result<(), AppError> {
    match (config.storage.backend, config.database_url()) {
        (StorageBackend::Postgres, Some(url)) => {
            let url = url.to_owned();
            let pool_size = config.storage.pool_size;
            let store = tokio::task::spawn_blocking(move || {
                PostgresRegistryStore::connect(&url, pool_size)
            })
            .await
            .map_err(RegistryStoreError::persistence)??;
            info!("using postgres registry store");
            with_cache(config, store).await
        }
        _ => {
            info!("using in-memory registry store");
            with_cache(config, InMemoryRegistryStore::new()).await
        }
    }
}

async fn with_cache<S>(config: GatewayConfig, store: S) -> Result<(), AppError>
where
    S: RegistryStore + 'static,
{
    let Some(ttl) = config.cache_ttl() else {
        return run(config, store).await;
    };
    run(config, CachedRegistryStore::new(store, ttl)).await
}

async fn run<S>(config: GatewayConfig, store: S) -> Result<(), AppError>
where
    S: RegistryStore + 'static,
{
    let clock = Arc::new(DefaultClock);
    let registry = Arc::new(ToolRegistry::new(Arc::new(store), Arc::clone(&clock)));
    let summary = registry.hydrate().await?;
    info!(
        servers = summary.servers,
        tools = summary.tools,
        resources = summary.resources,
        "registry loaded"
    );

    let connector = Arc::new(DefaultTransportConnector::new(config.stop_grace()));
    let pool = Arc::new(ConnectionPool::new(
        connector,
        Arc::clone(&clock),
        config.pool_settings(),
    ));
    let security = DefaultSecurityPolicy::new(config.security_settings());
    let mut gateway = Gateway::new(
        registry,
        Arc::clone(&pool),
        Arc::new(security),
        Arc::new(TracingAuditSink),
        clock,
        config.gateway_settings(),
    );
    if let Some(policy) = config.retry_policy() {
        gateway = gateway.with_executor(Arc::new(RetryExecutor::new(
            Arc::new(PoolExecutor::new(pool)),
            policy,
        )));
    }
    let gateway = Arc::new(gateway);

    register_configured_servers(&gateway, &config).await?;
    gateway.spawn_health_monitor();
    info!("gateway ready; press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for Ctrl-C; shutting down");
    }
    let stopped = gateway.shutdown().await?;
    info!(servers = stopped.len(), "gateway stopped");
    Ok(())
}

/// Registers configured servers as the first admin, or anonymously when
/// authentication is off, and discovers tools on those that started.
async fn register_configured_servers<S>(
    gateway: &Arc<Gateway<S, DefaultClock>>,
    config: &GatewayConfig,
) -> Result<(), AppError>
where
    S: RegistryStore + 'static,
{
    let operator = config
        .security
        .admin_users
        .iter()
        .next()
        .map(UserId::new);
    let operator = operator.as_ref();
    let existing = gateway.registry().list_servers(&ServerFilter::default())?;

    for definition in config.server_definitions() {
        let known = existing
            .iter()
            .find(|server| server.name().as_str() == definition.name);
        let registered = match known {
            Some(server) if definition.auto_start && server.status() != ServerStatus::Running => {
                let server_id = server.id();
                if let Err(err) = gateway.start_server(server_id, operator).await {
                    warn!(%server_id, %err, "failed to restart persisted server");
                }
                server_id
            }
            Some(server) => server.id(),
            None => match gateway.register_server(&definition, operator).await {
                Ok(server_id) => server_id,
                Err(err) => {
                    warn!(name = %definition.name, %err, "failed to register configured server");
                    continue;
                }
            },
        };

        let running = gateway
            .registry()
            .get_server(registered)
            .await?
            .is_some_and(|server| server.status() == ServerStatus::Running);
        if !running {
            continue;
        }
        if let Err(err) = gateway.discover_tools(registered, operator).await {
            warn!(server_id = %registered, %err, "initial discovery failed");
        }
    }
    Ok(())
}
