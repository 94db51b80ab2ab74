//! Edge Gateway - CLI Application
//!
//! An HTTP edge gateway with:
//! - Configuration via TOML
//! - Login/refresh token issuance
//! - Access-token-gated proxying to backend services
//! - Prometheus metrics

use clap::{Parser, Subcommand};
use edge_gateway::{build_router, config::GatewayConfig, AppState};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Edge Gateway - bearer token authentication and prefix routing
#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(version, about = "An HTTP edge gateway with bearer token authentication", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Start {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Validate the configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Generate a sample configuration file with a fresh signing secret
    Init {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_server(&config).await?,
        Commands::Validate { config } => validate_config(&config)?,
        Commands::Init { output } => generate_sample_config(&output)?,
    }

    Ok(())
}

/// Start the gateway server
async fn start_server(config_path: &str) -> anyhow::Result<()> {
    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = GatewayConfig::from_file(config_path)?;
    info!("Loaded configuration from {}", config_path);

    let state = AppState::from_config(&config)?;
    for route in state.router.routes() {
        info!("Route /api/v1/{}* → {} ({})", route.prefix, route.backend_url, route.service);
    }
    info!("Login forwarded to {}", state.login_url);

    let app = build_router(&config, state);

    info!("Liveness endpoint at {}", config.health.path);
    if config.metrics.enabled {
        info!("Metrics endpoint enabled at {}", config.metrics.path);
    }

    // Start server
    let addr: SocketAddr = config.server_addr().parse()?;
    info!("Starting gateway server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Validate configuration file
fn validate_config(config_path: &str) -> anyhow::Result<()> {
    match GatewayConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid!");
            println!();
            println!("Server: {}:{}", config.server.host, config.server.port);
            println!("Upstream timeout: {}s", config.server.timeout);
            println!();
            println!("Services:");
            for (name, url) in &config.services {
                println!("  {} → {}", name, url);
            }
            println!();
            println!("Routes:");
            for route in &config.routes {
                println!("  /api/v1/{}* → {}", route.prefix, route.service);
            }
            println!();
            println!(
                "Login: {} (service '{}')",
                config.login_url().unwrap_or_default(),
                config.login.service
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

/// Generate sample configuration file
fn generate_sample_config(output_path: &str) -> anyhow::Result<()> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();

    let sample_config = format!(
        r#"# Edge Gateway Configuration

[server]
host = "0.0.0.0"
port = 3000
timeout = 30  # upstream request timeout, seconds

[health]
path = "/up"

[metrics]
enabled = true
path = "/metrics"

[auth]
# Overridden by the EDGE_GATEWAY_SECRET environment variable when set
secret = "{secret}"
access_token_ttl = 3600      # 1 hour
refresh_token_ttl = 604800   # 7 days

# Backend services
[services]
users = "http://localhost:3001"

# Credentials are checked by POSTing the login body here
[login]
service = "users"
path = "/api/v1/auth/login"

# /api/v1/<prefix>... is forwarded to the route's service; first match wins
[[routes]]
prefix = "users"
service = "users"
description = "User accounts"

[[routes]]
prefix = "collections"
service = "users"
description = "Collections, currently served by the user service"
"#
    );

    std::fs::write(output_path, sample_config)?;
    println!("Sample configuration written to {}", output_path);
    Ok(())
}
