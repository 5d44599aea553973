//! HTTP server: shared state, router assembly and the `serve` entry point.

mod auth;
mod consulting;
mod error;
mod extract;
mod onboarding;
mod plans;
mod projects;


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bizplan_core::credentials::{PasswordHasher, TokenConfig};
use bizplan_core::generation::PlanGenerationEngine;
use bizplan_core::generator::{ContentCollaborator, GeminiGenerator};
use bizplan_core::notify::{self, APP_NAME, LogMailer, NotificationDispatcher};
use bizplan_core::services::{
    AuthService, ConsultingService, OnboardingService, PlanService, ProjectService,
};
use bizplan_db::queries::projects as project_db;

use crate::config::BizplanConfig;

/// Prefix under which every API route is mounted.
pub const API_PREFIX: &str = "/api/v1";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Services shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub projects: ProjectService,
    pub onboarding: OnboardingService,
    pub plans: PlanService,
    pub consulting: ConsultingService,
    pub engine: PlanGenerationEngine,
    pub ai_configured: bool,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        tokens: TokenConfig,
        hasher: PasswordHasher,
        collaborator: ContentCollaborator,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            auth: AuthService::new(pool.clone(), tokens, hasher, notifier.clone()),
            projects: ProjectService::new(pool.clone()),
            onboarding: OnboardingService::new(pool.clone()),
            plans: PlanService::new(pool.clone()),
            consulting: ConsultingService::new(pool.clone(), notifier.clone()),
            ai_configured: collaborator.is_configured(),
            engine: PlanGenerationEngine::new(pool, collaborator, notifier),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(projects::routes())
        .merge(onboarding::routes())
        .merge(plans::routes())
        .merge(consulting::routes());

    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": format!("{APP_NAME} API is running"),
        "ai_configured": state.ai_configured,
    }))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the content collaborator from resolved config. A missing API key
/// yields the unconfigured collaborator.
pub fn build_collaborator(config: &BizplanConfig) -> Result<ContentCollaborator> {
    let Some(gemini) = config.gemini.clone() else {
        tracing::warn!("no Gemini API key configured, plans will contain placeholders");
        return Ok(ContentCollaborator::Unconfigured);
    };
    tracing::info!(model = %gemini.model, "using Gemini content generator");
    let generator = GeminiGenerator::new(gemini).context("failed to build Gemini client")?;
    Ok(ContentCollaborator::configured(
        Arc::new(generator),
        config.ai_timeout,
    ))
}

pub async fn run_serve(pool: PgPool, config: BizplanConfig) -> Result<()> {
    let reset = project_db::reset_orphaned_generations(&pool).await?;
    if !reset.is_empty() {
        tracing::warn!(
            count = reset.len(),
            "projects left generating by a previous process were reset to onboarding"
        );
    }

    let collaborator = build_collaborator(&config)?;
    let (notifier, rx) = NotificationDispatcher::channel();
    let worker = notify::spawn_notification_worker(rx, Arc::new(LogMailer), config.mail.clone());

    let state = AppState::new(
        pool,
        config.token_config.clone(),
        PasswordHasher::default(),
        collaborator,
        notifier,
    );
    let app = build_router(state, &config.server.cors_origins);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    tracing::info!("bizplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it every dispatcher clone) is gone; let the
    // worker drain what is already queued.
    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "notification worker ended abnormally");
    }
    tracing::info!("bizplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
