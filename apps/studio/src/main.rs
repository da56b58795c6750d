mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod retry;
mod routes;
mod state;
mod storage;
mod sync;
#[cfg(test)]
mod testing;
mod timeline;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::generation::generator::LlmStoryboardGenerator;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{DocumentStore, PgDocumentStore, S3AssetStore};
use crate::sync::SyncBridge;
use crate::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Studio API v{}", env!("CARGO_PKG_VERSION"));

    // Document store on PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    ensure_schema(&pool).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));

    // Asset store on S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let assets = Arc::new(S3AssetStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_endpoint.clone(),
    ));
    info!("S3 client initialized");

    // Storyboard generator
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let generator = Arc::new(LlmStoryboardGenerator::new(llm));

    // Workspace hydrated from the store, then kept current by the subscription
    let projects = sync::hydrate(store.as_ref()).await?;
    let workspace = Arc::new(Mutex::new(Workspace::from_projects(projects)));
    let (sync, _sync_worker) = SyncBridge::spawn(Arc::clone(&store), config.sync_retry_policy());
    let _subscription =
        sync::spawn_subscription(store.as_ref(), Arc::clone(&workspace), sync.clone()).await?;

    let state = AppState {
        workspace,
        sync,
        assets,
        generator,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the editor has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "studio-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
