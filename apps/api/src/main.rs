mod audit;
mod auth;
mod config;
mod db;
mod errors;
mod export;
mod intelligence;
mod listing;
mod llm_client;
mod models;
mod portfolio;
mod routes;
mod staffing;
mod state;
mod tenancy;
mod validation;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::auth::identity::JwtIdentityVerifier;
use crate::auth::session::SessionKeys;
use crate::config::Config;
use crate::db::create_pool;
use crate::export::compiler::PdfCompiler;
use crate::intelligence::matching::{CandidateMatcher, LlmMatcher, SkillMatcher};
use crate::llm_client::LlmClient;
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;

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

    info!("Starting ResourceAlloc API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let mut llm = LlmClient::new(config.anthropic_api_key.clone())?;
    if let Some(url) = &config.anthropic_api_url {
        llm = llm.with_api_url(url.clone());
    }
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Candidate matcher (SkillMatcher by default; swap via ENABLE_LLM_MATCHING)
    let matcher: Arc<dyn CandidateMatcher> = if config.enable_llm_matching {
        info!("Candidate matching: LLM with resource tools");
        Arc::new(LlmMatcher::new(llm.clone(), db.clone()))
    } else {
        info!("Candidate matching: deterministic skill matcher");
        Arc::new(SkillMatcher)
    };

    let sessions = Arc::new(SessionKeys::new(
        &config.session_secret,
        config.session_ttl_hours,
        config.cookie_secure,
    ));
    let identity = Arc::new(JwtIdentityVerifier::new(
        &config.identity_jwt_secret,
        config.identity_issuer.as_deref(),
        config.identity_audience.as_deref(),
    ));
    let pdf = PdfCompiler::new(
        config.pdflatex_path.clone(),
        Duration::from_secs(config.pdf_timeout_secs),
    );

    // Build app state
    let state = AppState {
        db,
        redis,
        s3,
        llm,
        config: config.clone(),
        sessions,
        identity,
        matcher,
        pdf,
    };

    // Build router
    let cors = cors_layer(&config.cors_allowed_origins)?;
    info!("CORS origins: {}", config.cors_allowed_origins.join(", "));
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

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
        "resourcealloc-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
