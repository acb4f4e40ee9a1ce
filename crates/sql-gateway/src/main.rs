use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sql_gateway::{config::GatewayConfig, routes, state::AppState, BindingTable};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| {
        tracing::error!("Failed to load configuration: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let port = config.port;
    let bind_addr = config.bind_addr.clone();
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!("Starting sql-gateway on {}:{}", bind_addr, port);
    tracing::info!("Execute method: {}", config.execute_method);
    tracing::info!("Allowed verbs: {}", config.gate.allowed_verbs().join(", "));
    tracing::info!(
        "Denied keywords: {} ({:?} match)",
        config.gate.denied_keywords().join(", "),
        config.gate.deny_match()
    );
    tracing::info!("Query timeout: {:?}", config.query_timeout);
    tracing::info!("Max body size: {} bytes", config.max_body_bytes);

    // Open database bindings
    let bindings = BindingTable::from_config(&config).map_err(|e| {
        tracing::error!("Failed to open database bindings: {e}");
        std::io::Error::other(e.to_string())
    })?;
    tracing::info!(
        "Bindings: {} (default {}, multiple {})",
        bindings.names().join(", "),
        bindings.default_name(),
        if bindings.supports_multiple() {
            "enabled"
        } else {
            "disabled"
        }
    );

    let state_data = web::Data::new(AppState::new(config, bindings));

    // Configure rate limiter
    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limiter config"))?;

    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_conf))
            .configure(routes::health::configure)
            .configure(routes::query::configure)
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await
}
