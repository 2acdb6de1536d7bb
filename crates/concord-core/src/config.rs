//! Tunable policy constants for the consensus pipeline.
//!
//! The values are empirical. They are kept as named, overridable fields so
//! hosts and tests can move them without touching the algorithms.

use concord_schema::ConfidenceLabel;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 0.12;
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.30;
pub const DEFAULT_VERIFICATION_THRESHOLD: f64 = 0.45;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Mean similarity to the rest of the batch below which a response is an outlier.
    pub outlier_threshold: f64,
    /// Minimum similarity to a cluster seed for a response to join it.
    pub cluster_threshold: f64,
    pub confidence: ConfidencePolicy,
    pub verification: VerificationPolicy,
    pub metrics: MetricWeights,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            confidence: ConfidencePolicy::default(),
            verification: VerificationPolicy::default(),
            metrics: MetricWeights::default(),
        }
    }
}

/// `score = size_weight * cluster_share + confidence_weight * mean_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    pub size_weight: f64,
    pub confidence_weight: f64,
    pub high_cutoff: f64,
    pub moderate_cutoff: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self { Self { size_weight: 0.7, confidence_weight: 0.3, high_cutoff: 0.8, moderate_cutoff: 0.5 } }
}

impl ConfidencePolicy {
    pub fn label(&self, score: f64) -> ConfidenceLabel {
        if score >= self.high_cutoff { ConfidenceLabel::High } else if score >= self.moderate_cutoff { ConfidenceLabel::Moderate } else { ConfidenceLabel::Low }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    pub base_threshold: f64,
    /// Population standard deviation above which the threshold is relaxed.
    pub variance_trigger: f64,
    pub stddev_factor: f64,
    /// Lowest threshold the relaxed rule may produce.
    pub floor: f64,
}

impl Default for VerificationPolicy {
    fn default() -> Self { Self { base_threshold: DEFAULT_VERIFICATION_THRESHOLD, variance_trigger: 0.2, stddev_factor: 0.5, floor: 0.4 } }
}

impl VerificationPolicy {
    pub fn with_base_threshold(mut self, base_threshold: f64) -> Self { self.base_threshold = base_threshold; self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub consensus_agreement: f64,
    pub response_quality: f64,
    pub factual_consistency: f64,
    /// Applied to `1 - outlier_score`.
    pub outlier: f64,
    /// Applied to `1 - contradiction_rate`.
    pub contradiction: f64,
}

impl Default for MetricWeights {
    fn default() -> Self { Self { consensus_agreement: 0.30, response_quality: 0.20, factual_consistency: 0.20, outlier: 0.15, contradiction: 0.15 } }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("moderate cutoff {moderate} exceeds high cutoff {high}")]
    InvertedCutoffs { high: f64, moderate: f64 },
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("outlier_threshold", self.outlier_threshold),
            ("cluster_threshold", self.cluster_threshold),
            ("confidence.high_cutoff", self.confidence.high_cutoff),
            ("confidence.moderate_cutoff", self.confidence.moderate_cutoff),
            ("verification.base_threshold", self.verification.base_threshold),
            ("verification.variance_trigger", self.verification.variance_trigger),
            ("verification.floor", self.verification.floor),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) { return Err(ConfigError::OutOfUnitRange { name, value }); }
        }
        let weights = [
            ("confidence.size_weight", self.confidence.size_weight),
            ("confidence.confidence_weight", self.confidence.confidence_weight),
            ("verification.stddev_factor", self.verification.stddev_factor),
            ("metrics.consensus_agreement", self.metrics.consensus_agreement),
            ("metrics.response_quality", self.metrics.response_quality),
            ("metrics.factual_consistency", self.metrics.factual_consistency),
            ("metrics.outlier", self.metrics.outlier),
            ("metrics.contradiction", self.metrics.contradiction),
        ];
        for (name, value) in weights {
            if value.is_nan() || value < 0.0 { return Err(ConfigError::NegativeWeight { name, value }); }
        }
        if self.confidence.moderate_cutoff > self.confidence.high_cutoff {
            return Err(ConfigError::InvertedCutoffs { high: self.confidence.high_cutoff, moderate: self.confidence.moderate_cutoff });
        }
        Ok(())
    }
}
