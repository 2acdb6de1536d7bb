//! Response-consensus engine.
//!
//! Takes N independent free-text answers to one question and
//! - scores pairwise similarity ([`similarity`]),
//! - filters outliers and clusters the rest ([`is_outlier`], [`cluster`], [`partition`]),
//! - derives a representative consensus with a confidence score ([`derive_consensus`]),
//! - back-verifies each answer against it ([`verify`]),
//! - aggregates per-source accuracy metrics ([`compute_model_metrics`]).
//!
//! Everything here is pure and synchronous. Inputs are borrowed, outputs are
//! new values, and degenerate batches yield sentinels instead of errors.

pub mod analysis;
pub mod cluster;
pub mod config;
pub mod derivation;
pub mod explain;
pub mod metrics;
pub mod report;
pub mod similarity;
pub mod verify;

pub use analysis::{analyze_consensus, average_similarity, scorecard, similarity_matrix, ClusterSummary, ConsensusAnalysis, Scorecard};
pub use cluster::{cluster, is_outlier, partition, Cluster, Partition};
pub use config::{ConfigError, ConfidencePolicy, ConsensusConfig, MetricWeights, VerificationPolicy};
pub use derivation::{derive, derive_consensus, derive_consensus_with, Consensus};
pub use explain::{explain, ConsensusLevel};
pub use metrics::{compute_model_metrics, compute_model_metrics_with};
pub use report::build_report;
pub use similarity::{similarity, TokenSet};
pub use verify::{verify, verify_with};
