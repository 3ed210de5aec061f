use std::net::SocketAddr;

use axum::middleware;
use tracing::info;

use keygate::config::init_config;
use keygate::errors::KeygateError;
use keygate::server::database::Database;
use keygate::server::logging::request_logging_middleware;
use keygate::server::routes::build_router;
use keygate::server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = init_config()?;

    let level: tracing::Level = config
        .logging
        .level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    // Refuse to serve admin endpoints with no secret configured: an empty
    // secret would match an empty admin_key field.
    if config.admin.secret.is_empty() {
        return Err(Box::new(KeygateError::ConfigError(
            "admin.secret must be set (KEYGATE_ADMIN_SECRET)".to_string(),
        )) as Box<dyn std::error::Error>);
    }

    let db = Database::connect(&config.database).await?;
    db.init_schema().await?;
    info!("Database initialized ({})", config.database.db_type);

    let state = AppState::new(db, config.admin.secret.as_str());
    let mut app = build_router(state);
    if config.logging.enabled {
        app = app.layer(middleware::from_fn(request_logging_middleware));
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("License server listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
