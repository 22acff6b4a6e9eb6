use std::sync::Arc;

use often_gateway::{
    AppState, Config, EnvSecretStore, Gateway, LedgerStore, PricingTable, ProviderRegistry,
    RateOracle, SecretCache,
};
use often_gateway::auth::AuthService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = LedgerStore::new(&config.db_path);
    store.init().await?;

    let gateway = Gateway::new(
        store.clone(),
        ProviderRegistry::builtin(),
        PricingTable::builtin(),
        SecretCache::new(Arc::new(EnvSecretStore)),
        RateOracle::new(config.oracle_base_url.clone()),
        config.admin_api_key.clone(),
    );
    let auth = AuthService::new(&config.jwt_secret);
    let state = AppState::new(gateway, auth, store);
    let app = often_gateway::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("often-gateway listening on 0.0.0.0:{}", config.port);
    axum::serve(listener, app).await?;
    Ok(())
}
