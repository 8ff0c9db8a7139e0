use clap::Parser;
use schemock::cli::Cli;
use schemock::config::{load_schema, watcher::SchemaWatcher, Settings};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new_with_cli(&cli)?;

    // Initialize tracing, RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let schema = match &settings.schema.path {
        Some(path) => load_schema(path)?,
        None => {
            warn!("No schema file given, serving an empty object schema");
            json!({"type": "object"})
        }
    };

    let state = schemock::build_state(&settings, schema)?;
    for route in state.current_routes().await.list() {
        info!("  {} {}", route.method, route.path);
    }

    // Start schema watcher
    let _watcher = match (&settings.schema.path, settings.watch) {
        (Some(path), true) => {
            let reload_state = state.clone();
            let reload_path = path.clone();
            Some(SchemaWatcher::new(path, move || {
                match load_schema(&reload_path) {
                    Ok(raw) => match reload_state.reload_blocking(raw) {
                        Ok(()) => info!("Schema reloaded successfully"),
                        Err(e) => error!("Failed to rebuild routes, keeping previous table: {}", e),
                    },
                    Err(e) => error!("Failed to reload schema: {:#}", e),
                }
            })?)
        }
        _ => None,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    info!(
        "Starting Schemock on {}:{} (scenario: {})",
        host, port, settings.scenario
    );

    let app = schemock::create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
