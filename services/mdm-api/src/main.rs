//! Partnership MDM API server.

use std::sync::Arc;

use anyhow::Result;
use mdm_api::{
    api,
    auth::{
        Authenticator, DevIdentityProvider, FirebaseTokenVerifier, IdentityProvider,
        PermissionPolicy,
    },
    config,
    partnerships::PartnershipStore,
    state::AppState,
};
use mdm_warehouse::{BigQueryClient, Warehouse};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to MDM_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting partnership MDM API");
    info!(
        listen_addr = %config.listen_addr,
        dev_mode = config.dev_mode,
        table = %config.warehouse.table(),
        "Configuration loaded"
    );

    let bigquery = match BigQueryClient::new(config.warehouse.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build warehouse client");
            return Err(e.into());
        }
    };
    let warehouse: Arc<dyn Warehouse> = Arc::new(bigquery);

    let provider: Arc<dyn IdentityProvider> = match &config.firebase {
        Some(firebase) => Arc::new(FirebaseTokenVerifier::new(firebase.clone())?),
        None => {
            warn!("Dev mode: accepting unsigned user:<email> bearer tokens");
            Arc::new(DevIdentityProvider)
        }
    };

    let policy = PermissionPolicy::new(&config.internal_domain, &config.admin_emails);
    let authenticator = Authenticator::new(provider, policy);
    let partnerships = PartnershipStore::new(warehouse.clone(), config.warehouse.table());

    let state = AppState::new(authenticator, partnerships, warehouse);
    let app = api::create_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => info!("Server exited normally"),
        Err(e) => {
            error!(error = %e, "Server error");
            return Err(e.into());
        }
    }

    info!("MDM API shutdown complete");
    Ok(())
}
