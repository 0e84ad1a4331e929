//! HTTP server for the dashboard API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                  |
//! |--------|-------------------|----------------------------------------------|
//! | GET    | `/health`         | Health check                                 |
//! | GET    | `/api/dashboard`  | Chart, summaries and overview (`?city=&order=`) |
//! | GET    | `/api/selection`  | Stored city selection                        |
//! | PUT    | `/api/selection`  | Store a city selection                       |
//! | POST   | `/api/reload`     | Clear the source cache and reload            |
//! | GET    | `/api/logs`       | SSE stream for real-time logs                |

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{
    error_response, DashboardQuery, DashboardResponse, DashboardStatus, ReloadResponse, SelectionRequest,
    SelectionResponse,
};
use crate::cache::SourceCache;
use crate::config::DashboardConfig;
use crate::error::{PipelineError, PipelineResult, ServerError, ServerResult};
use crate::models::{DimensionFilter, SummaryOrder};
use crate::selection::{FileSelectionStore, SelectionStore};
use crate::transform::{DatasetOutcome, Pipeline};

// =============================================================================
// State
// =============================================================================

/// Pipeline, source cache, selection store and the last dataset.
pub struct AppState {
    pipeline: Pipeline,
    cache: SourceCache,
    selection: Box<dyn SelectionStore>,
    outcome: Option<Arc<DatasetOutcome>>,
}

pub type SharedState = Arc<Mutex<AppState>>;

impl AppState {
    pub fn new(pipeline: Pipeline, selection: Box<dyn SelectionStore>) -> Self {
        Self {
            pipeline,
            cache: SourceCache::new(),
            selection,
            outcome: None,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(
            Pipeline::from_config(config),
            Box::new(FileSelectionStore::new(config.selection_file())),
        )
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Current dataset, running the pipeline on first use.
    pub async fn outcome(&mut self) -> PipelineResult<Arc<DatasetOutcome>> {
        if let Some(outcome) = &self.outcome {
            return Ok(Arc::clone(outcome));
        }
        let outcome = Arc::new(self.pipeline.run(&mut self.cache).await?);
        self.outcome = Some(Arc::clone(&outcome));
        Ok(outcome)
    }

    /// Forget cached sources and the dataset, then load again.
    pub async fn reload(&mut self) -> PipelineResult<Arc<DatasetOutcome>> {
        self.cache.clear();
        self.outcome = None;
        self.outcome().await
    }

    fn selection_response(&self) -> PipelineResult<SelectionResponse> {
        Ok(SelectionResponse {
            selected: self.selection.get_selected_dimension()?,
            fallback: self.selection.fallback_dimension()?,
        })
    }
}

// =============================================================================
// Errors
// =============================================================================

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::AllSourcesFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

// =============================================================================
// Server
// =============================================================================

/// Routes with permissive CORS.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/dashboard", get(dashboard))
        .route("/api/selection", get(get_selection).put(put_selection))
        .route("/api/reload", post(reload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: DashboardConfig) -> ServerResult<()> {
    let state = AppState::from_config(&config).shared();
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log_info(format!("Cropdash server running on http://localhost:{}", config.port));
    log_info("GET  /api/dashboard?city=  - Chart, summaries, overview");
    log_info("GET  /api/selection        - Stored city");
    log_info("PUT  /api/selection        - Store city");
    log_info("POST /api/reload           - Reload sources");
    log_info("GET  /api/logs             - SSE log stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cropdash",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn dashboard(
    State(state): State<SharedState>,
    Query(query): Query<DashboardQuery>,
) -> ServerResult<Json<DashboardResponse>> {
    let order = match query.order.as_deref() {
        Some(raw) => raw.parse::<SummaryOrder>().map_err(ServerError::BadRequest)?,
        None => SummaryOrder::default(),
    };

    let mut state = state.lock().await;
    let selected = match query.city {
        Some(city) => city,
        None => state.selection.get_selected_dimension().map_err(PipelineError::from)?,
    };

    let response = match &*state.outcome().await? {
        DatasetOutcome::Loaded(dataset) => {
            let filter = dataset.resolve_filter(&selected);
            DashboardResponse::ready(dataset.view(&filter, order), dataset.notes.clone())
        }
        DatasetOutcome::Empty { source } => {
            DashboardResponse::empty(source.clone(), DimensionFilter::parse(&selected).as_selector())
        }
    };

    Ok(Json(response))
}

async fn get_selection(State(state): State<SharedState>) -> ServerResult<Json<SelectionResponse>> {
    let state = state.lock().await;
    Ok(Json(state.selection_response()?))
}

async fn put_selection(
    State(state): State<SharedState>,
    Json(request): Json<SelectionRequest>,
) -> ServerResult<Json<SelectionResponse>> {
    let mut state = state.lock().await;
    state
        .selection
        .set_selected_dimension(&request.city)
        .map_err(PipelineError::from)?;
    log_info(format!("Selected city: {}", DimensionFilter::parse(&request.city)));

    Ok(Json(state.selection_response()?))
}

async fn reload(State(state): State<SharedState>) -> ServerResult<Json<ReloadResponse>> {
    let mut state = state.lock().await;
    let outcome = state.reload().await?;

    let response = match &*outcome {
        DatasetOutcome::Loaded(dataset) => ReloadResponse {
            status: DashboardStatus::Ready,
            source: dataset.source.clone(),
            records: dataset.records.len(),
            dimensions: dataset.dimensions.clone(),
        },
        DatasetOutcome::Empty { source } => ReloadResponse {
            status: DashboardStatus::Empty,
            source: source.clone(),
            records: 0,
            dimensions: Vec::new(),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::builtin::BUILTIN_SOURCE;
    use crate::selection::MemorySelectionStore;
    use crate::transform::SourceStrategy;
    use tempfile::tempdir;

    fn state_with(strategies: Vec<SourceStrategy>) -> SharedState {
        AppState::new(
            Pipeline::new(strategies, Duration::from_secs(1)),
            Box::new(MemorySelectionStore::new()),
        )
        .shared()
    }

    #[tokio::test]
    async fn test_dashboard_uses_stored_selection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(
            &path,
            "Crop,Date,City,Price\nWheat,2024-01-15,Pune,20\nWheat,2024-02-15,Pune,22\nWheat,2024-02-15,Thane,30\n",
        )
        .unwrap();
        let state = state_with(vec![SourceStrategy::source(path.to_str().unwrap())]);

        put_selection(State(state.clone()), Json(SelectionRequest { city: "Pune".into() }))
            .await
            .unwrap();

        let Json(response) = dashboard(State(state.clone()), Query(DashboardQuery::default())).await.unwrap();
        assert_eq!(response.status, DashboardStatus::Ready);
        assert_eq!(response.city, "Pune");
        assert_eq!(response.summaries[0].latest_value, 22.0);
        assert_eq!(response.dimensions, vec!["Pune", "Thane"]);
    }

    #[tokio::test]
    async fn test_dashboard_unknown_city_shows_all() {
        let state = state_with(vec![SourceStrategy::Builtin]);
        let query = DashboardQuery {
            city: Some("Atlantis".into()),
            order: Some("change".into()),
        };

        let Json(response) = dashboard(State(state), Query(query)).await.unwrap();
        assert_eq!(response.city, "ALL");
        assert_eq!(response.source, BUILTIN_SOURCE);
        assert_eq!(response.summaries.len(), 10);
    }

    #[tokio::test]
    async fn test_dashboard_rejects_bad_order() {
        let state = state_with(vec![SourceStrategy::Builtin]);
        let query = DashboardQuery {
            city: None,
            order: Some("random".into()),
        };

        let err = dashboard(State(state), Query(query)).await.unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_empty_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "Crop,Date,Price\n").unwrap();
        let state = state_with(vec![SourceStrategy::source(path.to_str().unwrap())]);

        let Json(response) = dashboard(State(state), Query(DashboardQuery::default())).await.unwrap();
        assert_eq!(response.status, DashboardStatus::Empty);
        assert!(response.summaries.is_empty());
    }

    #[tokio::test]
    async fn test_all_sources_failed_is_503() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        let state = state_with(vec![SourceStrategy::source(missing.to_str().unwrap())]);

        let err = dashboard(State(state), Query(DashboardQuery::default())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "Crop,Date,Price\nWheat,2024-01-15,21.5\n").unwrap();
        let state = state_with(vec![SourceStrategy::source(path.to_str().unwrap())]);

        dashboard(State(state.clone()), Query(DashboardQuery::default())).await.unwrap();
        std::fs::write(&path, "Crop,Date,Price\nWheat,2024-01-15,21.5\nRice,2024-01-15,34\n").unwrap();

        let Json(cached) = dashboard(State(state.clone()), Query(DashboardQuery::default())).await.unwrap();
        assert_eq!(cached.summaries.len(), 1);

        let Json(reloaded) = reload(State(state)).await.unwrap();
        assert_eq!(reloaded.records, 2);
    }
}
