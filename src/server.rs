use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::db::StudentStore;
use crate::matcher::{self, RequestError};
use crate::models::{ErrorBody, MatchCandidate, MatchRequest, StudentProfile};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid match request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Student not found")]
    StudentNotFound,

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload(_) | AppError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::StudentNotFound => StatusCode::NOT_FOUND,
            AppError::Internal(err) => {
                error!(error = %err, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub struct AppState {
    pub store: StudentStore,
}

pub fn router(store: StudentStore) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/health", get(health_handler))
        .route("/student/{id}", get(student_handler))
        .route("/match", post(match_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StudentProfile>, AppError> {
    let student = state
        .store
        .find_by_roll(&id)
        .await?
        .ok_or(AppError::StudentNotFound)?;
    Ok(Json(student.profile()))
}

async fn match_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<Vec<MatchCandidate>>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected match payload");
        AppError::MalformedPayload(rejection.body_text())
    })?;
    matcher::validate_request(&request)?;

    let students = state.store.all().await?;
    let ranked = matcher::rank_students(&request, &students);
    info!(
        workspace = %request.workspace_name,
        considered = students.len(),
        matched = ranked.len(),
        "match computed"
    );
    Ok(Json(ranked))
}

pub async fn serve(bind: &str, store: StudentStore) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "matching service listening");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("matching service shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
