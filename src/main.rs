//! itemvault -- CRUD item API server.
//!
//! Wiring only: load configuration, build one client per managed
//! backend, inject the adapters into [`itemvault::AppState`], and serve
//! until SIGTERM/SIGINT.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

/// Command-line arguments for the itemvault server.
#[derive(Parser, Debug)]
#[command(
    name = "itemvault",
    version,
    about = "CRUD item API over DynamoDB, S3, SNS and Cognito"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "itemvault.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = itemvault::config::load_config(&cli.config)?;

    // Initialize tracing; RUST_LOG wins over the configured level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Loaded configuration from {}", cli.config);

    // Fail fast on missing backend parameters, before any client exists.
    config.validate()?;

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // One shared SDK config; every backend client derives from it.
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()));
    if !config.aws.endpoint_url.is_empty() {
        loader = loader.endpoint_url(&config.aws.endpoint_url);
    }
    let sdk_config = loader.load().await;

    let store = itemvault::store::dynamodb::DynamoItemStore::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        &config.store.table_name,
    );
    info!("DynamoDB item store initialized: table={}", config.store.table_name);

    let storage = itemvault::storage::s3::S3ObjectStorage::new(
        aws_sdk_s3::Client::new(&sdk_config),
        &config.storage.bucket_name,
    );
    info!("S3 object storage initialized: bucket={}", config.storage.bucket_name);

    let notify = itemvault::notify::sns::SnsNotificationBus::new(
        aws_sdk_sns::Client::new(&sdk_config),
        &config.notify.topic_arn,
    );
    info!("SNS notification bus initialized: topic={}", config.notify.topic_arn);

    let identity = itemvault::identity::cognito::CognitoIdentityProvider::new(
        aws_sdk_cognitoidentityprovider::Client::new(&sdk_config),
        &config.identity.user_pool_id,
        &config.identity.client_id,
    );
    info!(
        "Cognito identity provider initialized: pool={}",
        config.identity.user_pool_id
    );

    // Bounded HTTP client for the create path's image download.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch.timeout_secs))
        .build()?;

    let state = Arc::new(itemvault::AppState {
        config: config.clone(),
        store: Arc::new(store),
        storage: Arc::new(storage),
        notify: Arc::new(notify),
        identity: Arc::new(identity),
        http,
    });

    let app = itemvault::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("itemvault listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new
    // connections and wait for in-flight requests to complete.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("itemvault shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
