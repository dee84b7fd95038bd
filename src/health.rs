use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub port: u16,
    pub upstream: String,
    pub spindle_log: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "spindle",
        status: "ok",
        port: state.args.port,
        upstream: state.upstream.clone(),
        spindle_log: state.logger.path().display().to_string(),
    })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub log_writer: String,
    pub dump_dir: String,
}

pub async fn readiness(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let writer_ok = state.logger.is_open();

    let dump_ok = if state.args.disable_raw_dump {
        true
    } else {
        match tokio::fs::metadata(&state.args.dump_dir).await {
            Ok(m) => m.is_dir(),
            Err(_) => false,
        }
    };

    let status_code = if writer_ok && dump_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            status: if writer_ok && dump_ok { "ready" } else { "unready" }.to_string(),
            log_writer: if writer_ok { "ok" } else { "closed" }.to_string(),
            dump_dir: if dump_ok { "ok" } else { "missing" }.to_string(),
        }),
    )
}
