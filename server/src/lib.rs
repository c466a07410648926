use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use triage_core::analysis::{AnalysisRequest, AnalysisResult, Analyzer, CannedSuggester, NeighborClassifier};
use triage_core::kb::load_path;
use triage_core::live::LiveSearcher;
use triage_core::service::{IngestReport, ServiceStats};
use triage_core::{
    Feedback, FeedbackCounts, FeedbackLedger, FeedbackOutcome, SearchConfig, SearchError, SimilarIssue, SimilarityService,
    Ticket, TicketRecord,
};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<IssueHit>,
}

/// Similar issue as rendered by the UI, score rounded to two decimals.
#[derive(Serialize)]
pub struct IssueHit {
    pub ticket_id: String,
    pub problem_description: String,
    pub solution_text: String,
    pub similarity_score: f64,
}

impl From<SimilarIssue> for IssueHit {
    fn from(i: SimilarIssue) -> Self {
        Self {
            ticket_id: i.ticket_id,
            problem_description: i.problem_description,
            solution_text: i.solution_text,
            similarity_score: round2(i.similarity_score),
        }
    }
}

fn round2(score: f32) -> f64 { (score as f64 * 100.0).round() / 100.0 }

#[derive(Serialize)]
pub struct LiveResponse {
    pub seq: u64,
    /// Echo of the caller's own draft number, if it sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_seq: Option<u64>,
    pub issues: Vec<IssueHit>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub predicted_module: String,
    pub predicted_priority: String,
    pub similar_issues: Vec<IssueHit>,
    pub ai_suggestion: String,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(r: AnalysisResult) -> Self {
        Self {
            predicted_module: r.predicted_module,
            predicted_priority: r.predicted_priority,
            similar_issues: r.similar_issues.into_iter().map(IssueHit::from).collect(),
            ai_suggestion: r.ai_suggestion,
        }
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub service: ServiceStats,
    pub feedback: FeedbackCounts,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub report: IngestReport,
    pub stats: ServiceStats,
}

/// Startup options for the app.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub search: SearchConfig,
    /// Knowledge-base file or directory loaded at startup
    pub kb_path: Option<PathBuf>,
    pub admin_token: Option<String>,
    /// Comma-separated allowed origins; any origin when unset
    pub cors_allow_origin: Option<String>,
}

impl AppConfig {
    /// `ADMIN_TOKEN` and `CORS_ALLOW_ORIGIN` from the environment.
    pub fn from_env(search: SearchConfig, kb_path: Option<PathBuf>) -> Self {
        Self {
            search,
            kb_path,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SimilarityService>,
    pub searcher: LiveSearcher,
    pub analyzer: Arc<Analyzer>,
    pub feedback: Arc<FeedbackLedger>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(service: Arc<SimilarityService>, admin_token: Option<String>) -> Self {
        let cfg = service.config().clone();
        let searcher = LiveSearcher::new(Arc::clone(&service));
        let analyzer = Analyzer::new(
            searcher.clone(),
            Arc::new(CannedSuggester::default()),
            Arc::new(NeighborClassifier::new(cfg.default_module, cfg.default_priority)),
        );
        Self { service, searcher, analyzer: Arc::new(analyzer), feedback: Arc::new(FeedbackLedger::new()), admin_token }
    }
}

/// JSON error body with the status the UI keys off.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::NotReady => ApiError(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            SearchError::InvalidQuery(_) => ApiError(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

pub fn build_app(config: AppConfig) -> Result<Router> {
    let service = Arc::new(SimilarityService::new(config.search.clone()));
    if let Some(path) = &config.kb_path {
        let kb = load_path(path)?;
        let report = service.ingest(kb.records);
        tracing::info!(
            path = %path.display(),
            inserted = report.load.inserted,
            skipped = report.load.skip_count() + report.build.skipped.len(),
            malformed = kb.malformed.len(),
            "knowledge base loaded"
        );
    }
    Ok(router(AppState::new(service, config.admin_token), config.cors_allow_origin.as_deref()))
}

pub fn router(state: AppState, cors_allow_origin: Option<&str>) -> Router {
    // CORS: comma-separated origin list, or allow Any by default
    let cors = match cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/search", get(search_handler))
        .route("/live", post(live_handler))
        .route("/analyze", post(analyze_handler))
        .route("/feedback", post(feedback_handler))
        .route("/tickets", post(ingest_handler))
        .route("/tickets/:ticket_id", get(ticket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, 100);
    let service = Arc::clone(&state.service);
    let q = params.q.clone();
    let issues = tokio::task::spawn_blocking(move || service.similar_issues(&q, k))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), results: issues.into_iter().map(IssueHit::from).collect() }))
}

/// Body is `"text"` or `{ "text": ... }`; any other shape is an invalid query.
pub async fn live_handler(State(state): State<AppState>, Json(body): Json<serde_json::Value>) -> Result<Json<LiveResponse>, ApiError> {
    let query = triage_core::Query::from_value(&body)?;
    let res = state.searcher.search(query.text).await?;
    Ok(Json(LiveResponse { seq: res.seq, client_seq: query.seq, issues: res.issues.into_iter().map(IssueHit::from).collect() }))
}

pub async fn analyze_handler(State(state): State<AppState>, Json(req): Json<AnalysisRequest>) -> Result<Json<AnalyzeResponse>, ApiError> {
    if req.description.trim().is_empty() && req.image.is_none() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "provide a description or an image".into()));
    }
    let result = state.analyzer.analyze(req).await;
    Ok(Json(result.into()))
}

pub async fn feedback_handler(State(state): State<AppState>, Json(fb): Json<Feedback>) -> Json<FeedbackOutcome> {
    Json(state.feedback.record(&fb))
}

pub async fn ticket_handler(State(state): State<AppState>, Path(ticket_id): Path<String>) -> Result<Json<Ticket>, ApiError> {
    match state.service.ticket(&ticket_id) {
        Some(t) => Ok(Json(Ticket::clone(&t))),
        None => Err(ApiError(StatusCode::NOT_FOUND, format!("ticket {ticket_id} not found"))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse { service: state.service.stats(), feedback: state.feedback.counts() })
}

async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(records): Json<Vec<TicketRecord>>,
) -> Result<Json<IngestResponse>, ApiError> {
    authorize(&state, &headers)?;
    let service = Arc::clone(&state.service);
    let report = tokio::task::spawn_blocking(move || service.ingest(records))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(IngestResponse { report, stats: state.service.stats() }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
