//! HTTP surface: `GET /` for liveness and `POST /predict` for one prediction.
//!
//! Every prediction failure is answered with status 500 and a JSON body carrying
//! the error message under `detail` and its class under `kind`.

use crate::pipeline::{Pipeline, PredictError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, warn};
use serde_json::{Value, json};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "Student Retention AI API";

/// Build the axum [`Router`] with all routes.
pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/predict", post(predict_handler))
        .with_state(pipeline)
}

/// Liveness and basic service information. Never triggers artifact loading.
pub async fn info_handler(State(pipeline): State<Arc<Pipeline>>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "artifacts_loaded": pipeline.store().is_loaded(),
        "decision_threshold": pipeline.threshold(),
    }))
}

/// Runs the prediction pipeline for one JSON-encoded student record.
pub async fn predict_handler(State(pipeline): State<Arc<Pipeline>>, body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Request body is not valid JSON: {e}"),
                "invalid_body",
            );
        }
    };

    // Inference is CPU-bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || pipeline.predict_json(&body)).await;

    match outcome {
        Ok(Ok(prediction)) => {
            debug!(
                "Predicted {} (probability {:.4})",
                prediction.label, prediction.probability
            );
            (StatusCode::OK, Json(prediction)).into_response()
        }
        Ok(Err(e)) => prediction_error_response(&e),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Prediction task failed: {e}"),
            "internal",
        ),
    }
}

fn prediction_error_response(e: &PredictError) -> Response {
    warn!("Prediction failed ({}): {e}", e.kind());
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), e.kind())
}

fn error_response(status: StatusCode, detail: &str, kind: &str) -> Response {
    (status, Json(json!({ "detail": detail, "kind": kind }))).into_response()
}
