//! End-to-end run over one batch: derive, verify, score sources, explain.

use concord_schema::{ConsensusReport, Response};
use tracing::{info, info_span, warn};

use crate::config::ConsensusConfig;
use crate::derivation::derive;
use crate::explain::explain;
use crate::metrics::compute_model_metrics_with;
use crate::verify::verify_with;

pub fn build_report(responses: &[Response], config: &ConsensusConfig) -> ConsensusReport {
    let span = info_span!("consensus_report", responses = responses.len());
    let _e = span.enter();

    let consensus = derive(responses, config);
    let body = consensus.body().unwrap_or_default();
    let verified = verify_with(responses, body, &config.verification);
    let metrics = compute_model_metrics_with(&verified, body, &config.metrics);
    let verified_count = verified.iter().filter(|r| r.verified).count();
    let confidence = consensus.result().map(|r| r.confidence_score).unwrap_or(0.0);
    let explanation = explain(&verified, verified_count, confidence, config.cluster_threshold);

    let mut report = ConsensusReport {
        consensus: consensus.render(),
        result: consensus.result().cloned(),
        responses: verified,
        metrics,
        explanation,
        checksum: None,
    };
    match report.compute_checksum() {
        Ok(c) => report.checksum = Some(c),
        Err(e) => warn!(error = %e, "report checksum failed"),
    }
    info!(total = responses.len(), verified = verified_count, confidence, "consensus report built");
    report
}
