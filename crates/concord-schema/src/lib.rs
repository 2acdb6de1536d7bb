use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Consensus text returned for an empty batch.
pub const NO_RESPONSES: &str = "No responses available";

/// One model's answer to a query. Only `verified` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub id: String,
    pub content: String,
    pub source: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Prior reliability weight in `[0, 1]` assigned by the fetch layer.
    pub confidence: f64,
    #[serde(default)]
    pub verified: bool,
}

impl Response {
    pub fn new(source: impl Into<String>, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            source: source.into(),
            timestamp: Utc::now().timestamp_millis(),
            confidence,
            verified: false,
        }
    }
    pub fn with_id(mut self, id: impl Into<String>) -> Self { self.id = id.into(); self }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel { High, Moderate, Low }

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { ConfidenceLabel::High => "High", ConfidenceLabel::Moderate => "Moderate", ConfidenceLabel::Low => "Low" })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    /// Representative answer body, without the metadata block.
    pub text: String,
    pub confidence_label: ConfidenceLabel,
    pub confidence_score: f64,
    pub support_count: usize,
    pub total_count: usize,
}

impl ConsensusResult {
    pub fn percent(&self) -> i64 { (self.confidence_score * 100.0).round() as i64 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub model_name: String,
    pub accuracy_score: f64,
    pub hallucination_rate: f64,
    pub consensus_agreement: f64,
    pub response_quality: f64,
    pub factual_consistency: f64,
    pub outlier_score: f64,
    pub contradiction_rate: f64,
    pub total_responses: usize,
    pub verified_responses: usize,
}

/// Everything one consensus run produces, as handed to storage or notarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusReport {
    /// Formatted consensus string, treated as opaque text downstream.
    pub consensus: String,
    pub result: Option<ConsensusResult>,
    pub responses: Vec<Response>,
    pub metrics: Vec<ModelMetrics>,
    pub explanation: String,
    pub checksum: Option<String>,
}

impl ConsensusReport {
    pub fn compute_checksum(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(obj) = value.as_object_mut() { obj.remove("checksum"); }
        let canonical = serde_json::to_vec(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical);
        Ok(format!("{:x}", hasher.finalize()))
    }
    pub fn with_computed_checksum(mut self) -> Result<Self, serde_json::Error> { let c = self.compute_checksum()?; self.checksum = Some(c); Ok(self) }
    pub fn verify_checksum(&self) -> bool {
        match (self.checksum.as_ref(), self.compute_checksum()) { (Some(existing), Ok(recalc)) => existing == &recalc, _ => false }
    }
    pub fn verified_count(&self) -> usize { self.responses.iter().filter(|r| r.verified).count() }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error("response at position {0} has an empty id")]
    EmptyId(usize),
    #[error("response id {0:?} appears more than once")]
    DuplicateId(String),
    #[error("response {id:?} has confidence {value}, expected a value in [0, 1]")]
    ConfidenceOutOfRange { id: String, value: f64 },
}

impl BatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::EmptyId(_) => "empty_id",
            BatchError::DuplicateId(_) => "duplicate_id",
            BatchError::ConfidenceOutOfRange { .. } => "confidence_out_of_range",
        }
    }
}

/// Ingress check for hosts. The engine accepts any batch; this rejects the
/// ones whose ids or confidences would make tie-breaks and averages meaningless.
pub fn validate_batch(responses: &[Response]) -> Result<(), BatchError> {
    let mut seen = HashSet::with_capacity(responses.len());
    for (idx, r) in responses.iter().enumerate() {
        if r.id.is_empty() { return Err(BatchError::EmptyId(idx)); }
        if !seen.insert(r.id.as_str()) { return Err(BatchError::DuplicateId(r.id.clone())); }
        if !r.confidence.is_finite() || !(0.0..=1.0).contains(&r.confidence) {
            return Err(BatchError::ConfidenceOutOfRange { id: r.id.clone(), value: r.confidence });
        }
    }
    Ok(())
}
