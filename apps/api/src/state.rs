use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::auth::identity::IdentityVerifier;
use crate::auth::session::SessionKeys;
use crate::config::Config;
use crate::export::compiler::PdfCompiler;
use crate::intelligence::matching::CandidateMatcher;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Holds revoked session ids until the token would have expired anyway.
    pub redis: RedisClient,
    pub s3: S3Client,
    pub llm: LlmClient,
    pub config: Config,
    pub sessions: Arc<SessionKeys>,
    /// Verifies ID tokens from the hosted identity provider.
    pub identity: Arc<dyn IdentityVerifier>,
    /// Pluggable candidate matcher. Default: SkillMatcher. Swap via ENABLE_LLM_MATCHING.
    pub matcher: Arc<dyn CandidateMatcher>,
    pub pdf: PdfCompiler,
}
