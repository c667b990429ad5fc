mod auth;
mod branches;
mod cars;
mod categories;
mod envelope;
mod rate_limit;
mod reports;
mod router;
mod staff;
mod telemetry;

use std::{net::SocketAddr, time::Duration};

use axum::http::HeaderValue;
use tracing::{info, warn};
use url::Url;

use rentdesk_carsxe::CarsxeClient;
use rentdesk_storage::Database;
use rentdesk_util::{load_env_file, AppConfig};

use crate::auth::TokenService;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", "database ready");

    let carsxe = match &config.carsxe_api_key {
        Some(api_key) => {
            let http = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
            let base_url = Url::parse(&config.carsxe_base_url)?;
            Some(CarsxeClient::new(api_key.clone(), base_url, http))
        }
        None => {
            warn!(stage = "app", "CARSXE_API_KEY is not set; vehicle lookup disabled");
            None
        }
    };

    let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.jwt_ttl);
    let mut state = router::AppState::new(metrics, database, tokens, carsxe, &config.rate_limit);
    if let Some(frontend_url) = &config.frontend_url {
        state = state.with_frontend_origin(HeaderValue::from_str(frontend_url)?);
    }

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router::app_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|err| err.into())
}
