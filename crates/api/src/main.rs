use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folioai_core::advisor::{
    Advisor, AiPortfolioInput, AllocationSuggestion, GeneratedReport, Sourced,
    DEFAULT_SENTIMENT_DAYS, MAX_SENTIMENT_DAYS,
};
use folioai_core::domain::allocation::{
    validate_strategy, AllocationRequest, Bucket, BucketAllocation, OptimizationStrategy,
};
use folioai_core::domain::asset::CatalogAsset;
use folioai_core::domain::portfolio::{NewPortfolio, Portfolio};
use folioai_core::domain::report::{
    AnalysisKind, AnalysisReport, RebalanceProposal, RebalanceRow, SentimentEntry,
    SentimentReport, SentimentTrend,
};
use folioai_core::settings::{AiSettings, AiSettingsView};
use folioai_core::storage::{MemoryStore, PgStore, PortfolioStore};

const MAX_REPORT_BYTES: usize = 20 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = folioai_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store: Arc<dyn PortfolioStore> = match settings.require_database_url() {
        Ok(_) => match PgStore::connect(&settings).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db setup failed; starting API in degraded mode");
                Arc::new(MemoryStore::seeded())
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            Arc::new(MemoryStore::seeded())
        }
    };

    let advisor = Advisor::from_settings(settings.clone(), store).await?;
    let state = AppState {
        advisor: Arc::new(advisor),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/portfolios", get(list_portfolios).post(create_portfolio))
        .route("/portfolios/ai", post(create_ai_portfolio))
        .route("/portfolios/:id", get(get_portfolio))
        .route("/portfolios/:id/rebalance", post(propose_rebalance))
        .route("/portfolios/:id/rebalance/apply", post(apply_rebalance))
        .route("/portfolios/:id/analysis/:kind", get(analyze_portfolio))
        .route("/assets", get(list_assets))
        .route("/assets/:id", get(get_asset))
        .route("/suggestions", post(suggest_allocation))
        .route("/allocation/adjust", post(adjust_allocation))
        .route("/market/sentiment", get(market_sentiment))
        .route("/market/sentiment/latest", get(latest_sentiment))
        .route("/market/sentiment/history", get(sentiment_history))
        .route(
            "/reports",
            post(generate_report).layer(DefaultBodyLimit::max(MAX_REPORT_BYTES)),
        )
        .route("/settings/ai", get(get_ai_settings).put(put_ai_settings))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port()));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    advisor: Arc<Advisor>,
}

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn internal(e: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

fn bad_request(e: anyhow::Error) -> ApiError {
    tracing::debug!(error = %e, "rejected request");
    (StatusCode::BAD_REQUEST, format!("{e:#}"))
}

fn not_found(what: &str, id: i64) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{what} {id} not found"))
}

async fn list_portfolios(State(state): State<AppState>) -> ApiResult<Vec<Portfolio>> {
    let portfolios = state.advisor.list_portfolios().await.map_err(internal)?;
    Ok(Json(portfolios))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Portfolio> {
    state
        .advisor
        .get_portfolio(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("portfolio", id))
}

async fn create_portfolio(
    State(state): State<AppState>,
    Json(input): Json<NewPortfolio>,
) -> Result<(StatusCode, Json<Portfolio>), ApiError> {
    if input.name.trim().is_empty() {
        return Err(bad_request(anyhow::anyhow!("portfolio name must be non-empty")));
    }
    let portfolio = state
        .advisor
        .create_portfolio(input)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

async fn create_ai_portfolio(
    State(state): State<AppState>,
    Json(input): Json<AiPortfolioInput>,
) -> Result<(StatusCode, Json<Portfolio>), ApiError> {
    input.request.validate().map_err(bad_request)?;
    if input.suggestions.is_empty() {
        return Err(bad_request(anyhow::anyhow!("suggestions must be non-empty")));
    }
    let portfolio = state
        .advisor
        .create_ai_portfolio(input)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

#[derive(Debug, Deserialize)]
struct RebalanceBody {
    strategy: OptimizationStrategy,
    #[serde(default)]
    risk_tier: Option<u8>,
}

async fn propose_rebalance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RebalanceBody>,
) -> ApiResult<Sourced<RebalanceProposal>> {
    validate_strategy(body.strategy, body.risk_tier).map_err(bad_request)?;
    state
        .advisor
        .propose_rebalance(id, body.strategy, body.risk_tier)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("portfolio", id))
}

#[derive(Debug, Deserialize)]
struct ApplyRebalanceBody {
    current_vs_target: Vec<RebalanceRow>,
}

async fn apply_rebalance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ApplyRebalanceBody>,
) -> ApiResult<Portfolio> {
    if body.current_vs_target.is_empty() {
        return Err(bad_request(anyhow::anyhow!("current_vs_target must be non-empty")));
    }
    state
        .advisor
        .apply_rebalance(id, body.current_vs_target)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("portfolio", id))
}

async fn analyze_portfolio(
    State(state): State<AppState>,
    Path((id, kind)): Path<(i64, String)>,
) -> ApiResult<Sourced<AnalysisReport>> {
    let kind: AnalysisKind = kind.parse().map_err(bad_request)?;
    state
        .advisor
        .analyze_portfolio(id, kind)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("portfolio", id))
}

async fn list_assets(State(state): State<AppState>) -> ApiResult<Vec<CatalogAsset>> {
    let assets = state.advisor.list_assets().await.map_err(internal)?;
    Ok(Json(assets))
}

async fn get_asset(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<CatalogAsset> {
    state
        .advisor
        .get_asset(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("asset", id))
}

async fn suggest_allocation(
    State(state): State<AppState>,
    Json(req): Json<AllocationRequest>,
) -> ApiResult<Sourced<AllocationSuggestion>> {
    req.validate().map_err(bad_request)?;
    let suggestion = state
        .advisor
        .suggest_allocation(req)
        .await
        .map_err(internal)?;
    Ok(Json(suggestion))
}

#[derive(Debug, Deserialize)]
struct AdjustBody {
    #[serde(flatten)]
    buckets: BucketAllocation,
    bucket: Bucket,
    value: u8,
}

async fn adjust_allocation(Json(body): Json<AdjustBody>) -> ApiResult<BucketAllocation> {
    if body.buckets.total() != 100 {
        return Err(bad_request(anyhow::anyhow!(
            "bucket percentages must sum to 100 (got {})",
            body.buckets.total()
        )));
    }
    Ok(Json(body.buckets.adjust(body.bucket, body.value)))
}

async fn market_sentiment(State(state): State<AppState>) -> Json<Sourced<SentimentReport>> {
    Json(state.advisor.market_sentiment().await)
}

async fn latest_sentiment(State(state): State<AppState>) -> ApiResult<SentimentEntry> {
    state
        .advisor
        .latest_sentiment()
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "no market sentiment recorded".to_string()))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    days: Option<usize>,
}

async fn sentiment_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Sourced<SentimentTrend>> {
    let days = query.days.unwrap_or(DEFAULT_SENTIMENT_DAYS);
    if !(1..=MAX_SENTIMENT_DAYS).contains(&days) {
        return Err(bad_request(anyhow::anyhow!(
            "days must be 1..={} (got {days})",
            MAX_SENTIMENT_DAYS
        )));
    }
    let trend = state
        .advisor
        .sentiment_trend(days)
        .await
        .map_err(internal)?;
    Ok(Json(trend))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    #[serde(default)]
    prompt: Option<String>,
}

async fn generate_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    body: Bytes,
) -> ApiResult<Sourced<GeneratedReport>> {
    if body.is_empty() {
        return Err(bad_request(anyhow::anyhow!("request body must be a PDF document")));
    }
    Ok(Json(
        state
            .advisor
            .generate_report(body.to_vec(), query.prompt)
            .await,
    ))
}

async fn get_ai_settings(State(state): State<AppState>) -> Json<AiSettingsView> {
    Json(state.advisor.ai_settings().await)
}

async fn put_ai_settings(
    State(state): State<AppState>,
    Json(next): Json<AiSettings>,
) -> ApiResult<AiSettingsView> {
    if next.model.trim().is_empty() {
        return Err(bad_request(anyhow::anyhow!("model must be non-empty")));
    }
    let view = state
        .advisor
        .update_ai_settings(next)
        .await
        .map_err(internal)?;
    Ok(Json(view))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &folioai_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
