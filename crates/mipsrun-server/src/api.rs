//! HTTP API for submitting simulations and browsing the example catalog.
//!
//! Every response body is JSON except `/health`. Simulation outcomes that
//! reached the simulator (including timeouts and unparseable output) are
//! `200 OK`; only requests rejected up front or broken by the service itself
//! get an error status.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use mipsrun::catalog::{self, Catalog, ExampleProgram};
use mipsrun::{ErrorKind, SimulationRequest, SimulationResult, Simulator};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub simulator: Arc<Simulator>,
}

impl AppState {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator: Arc::new(simulator),
        }
    }
}

/// The simulation HTTP service.
pub struct Api;

impl Api {
    /// Build the axum router.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/api/simulate", post(simulate))
            .route("/api/examples", get(list_examples))
            .route("/api/examples/{key}", get(get_example))
            .route("/health", get(health_check))
            .with_state(state)
    }

    /// Bind `addr` and serve until the process is stopped.
    pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, Self::router(state)).await
    }
}

/// Status code for a simulation outcome
fn status_for(result: &SimulationResult) -> StatusCode {
    match result.error_kind() {
        None | Some(ErrorKind::Timeout | ErrorKind::Process | ErrorKind::Parse) => StatusCode::OK,
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Staging | ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// -- Handlers --

async fn health_check() -> &'static str {
    "ok"
}

async fn simulate(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<SimulationResult>) {
    let result = match SimulationRequest::from_slice(&body) {
        Ok(request) => state.simulator.simulate(request).await,
        Err(e) => {
            debug!(error = %e, "rejected request body");
            SimulationResult::failure(ErrorKind::Validation, e.to_string())
        }
    };
    (status_for(&result), Json(result))
}

async fn list_examples() -> Json<Catalog> {
    Json(Catalog)
}

async fn get_example(
    Path(key): Path<String>,
) -> Result<Json<&'static ExampleProgram>, (StatusCode, Json<SimulationResult>)> {
    catalog::get(&key).map(Json).map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(SimulationResult::failure(ErrorKind::Validation, e.to_string())),
        )
    })
}
