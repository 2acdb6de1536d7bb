use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use concord_core::{analyze_consensus, build_report, explain, scorecard, similarity, similarity_matrix, verify_with, ConsensusAnalysis, ConsensusConfig, Scorecard};
use concord_schema::{validate_batch, BatchError, ConsensusReport, Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub static PROM: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct AppState { pub config: Arc<ConsensusConfig> }

#[derive(Debug, Deserialize)]
pub struct BatchRequest { pub responses: Vec<Response> }
#[derive(Debug, Deserialize)]
pub struct VerifyRequest { pub responses: Vec<Response>, pub consensus: String }
#[derive(Debug, Deserialize)]
pub struct SimilarityRequest { pub a: String, pub b: String }

#[derive(Debug, Serialize)]
pub struct SimilarityReply { pub similarity: f64 }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainReply { pub analysis: ConsensusAnalysis, pub scorecard: Scorecard, pub similarity_matrix: Vec<Vec<f64>>, pub explanation: String }

#[derive(Debug)]
pub enum ApiError { InvalidBody(String), Batch(BatchError) }

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self { ApiError::InvalidBody(r.body_text()) }
}
impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self { ApiError::Batch(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let (kind, detail) = match &self {
            ApiError::InvalidBody(d) => ("invalid_body", d.clone()),
            ApiError::Batch(e) => (e.kind(), e.to_string()),
        };
        counter!("consensus_rejected_total", "reason" => kind).increment(1);
        tracing::debug!(kind, %detail, "request rejected");
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"error": kind, "detail": detail}))).into_response()
    }
}

fn accept(route: &'static str, responses: &[Response]) -> Result<(), ApiError> {
    counter!("consensus_requests_total", "route" => route).increment(1);
    histogram!("consensus_batch_size").record(responses.len() as f64);
    validate_batch(responses)?;
    Ok(())
}

async fn metrics_handler() -> String { PROM.get().map(|h| h.render()).unwrap_or_default() }

pub async fn consensus_handler(State(state): State<AppState>, payload: Result<Json<BatchRequest>, JsonRejection>) -> Result<Json<ConsensusReport>, ApiError> {
    let Json(req) = payload?;
    accept("consensus", &req.responses)?;
    let report = build_report(&req.responses, &state.config);
    if let Some(r) = &report.result { gauge!("consensus_confidence").set(r.confidence_score); }
    counter!("consensus_verified_total").increment(report.verified_count() as u64);
    Ok(Json(report))
}

pub async fn verify_handler(State(state): State<AppState>, payload: Result<Json<VerifyRequest>, JsonRejection>) -> Result<Json<Vec<Response>>, ApiError> {
    let Json(req) = payload?;
    accept("verify", &req.responses)?;
    let verified = verify_with(&req.responses, &req.consensus, &state.config.verification);
    counter!("consensus_verified_total").increment(verified.iter().filter(|r| r.verified).count() as u64);
    Ok(Json(verified))
}

pub async fn similarity_handler(payload: Result<Json<SimilarityRequest>, JsonRejection>) -> Result<Json<SimilarityReply>, ApiError> {
    let Json(req) = payload?;
    counter!("consensus_requests_total", "route" => "similarity").increment(1);
    Ok(Json(SimilarityReply { similarity: similarity(&req.a, &req.b) }))
}

/// Explains a batch whose `verified` flags were already set by a consensus run.
pub async fn explain_handler(State(state): State<AppState>, payload: Result<Json<BatchRequest>, JsonRejection>) -> Result<Json<ExplainReply>, ApiError> {
    let Json(req) = payload?;
    accept("explain", &req.responses)?;
    let analysis = analyze_consensus(&req.responses, &state.config);
    let scorecard = scorecard(&req.responses);
    let explanation = explain(&req.responses, scorecard.verified, analysis.confidence, state.config.cluster_threshold);
    let similarity_matrix = similarity_matrix(&req.responses);
    Ok(Json(ExplainReply { analysis, scorecard, similarity_matrix, explanation }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics_handler))
        .route("/v1/consensus", post(consensus_handler))
        .route("/v1/verify", post(verify_handler))
        .route("/v1/similarity", post(similarity_handler))
        .route("/v1/explain", post(explain_handler))
        .with_state(state)
}
