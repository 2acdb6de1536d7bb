//! Consensus derivation: pick the representative answer of the majority
//! cluster, score it, and render the human-readable consensus string.
//!
//! Selection looks only at similarity and confidence. The `source` label is
//! carried for logging and never consulted when choosing.

use concord_schema::{ConsensusResult, Response, NO_RESPONSES};
use tracing::{debug, info_span};

use crate::cluster::partition;
use crate::config::{ConfidencePolicy, ConsensusConfig};

pub const DISAGREEMENT_NOTE: &str = "(Note: There was significant disagreement between AI responses on this query.)";
pub const DISCLAIMER: &str = "Disclaimer: This AI-generated consensus is for informational purposes only and not a substitute for professional advice, especially for medical, legal, or other specialized domains.";

#[derive(Debug, Clone, PartialEq)]
pub enum Consensus {
    /// No responses at all.
    Empty,
    /// Exactly one response; rendered verbatim.
    Single(ConsensusResult),
    /// Every response was an outlier; the highest-confidence one stands in.
    Divergent(ConsensusResult),
    /// Representative of the largest cluster.
    Agreed(ConsensusResult),
}

impl Consensus {
    pub fn result(&self) -> Option<&ConsensusResult> {
        match self {
            Consensus::Empty => None,
            Consensus::Single(r) | Consensus::Divergent(r) | Consensus::Agreed(r) => Some(r),
        }
    }

    /// Representative text without metadata; what responses are verified against.
    pub fn body(&self) -> Option<&str> { self.result().map(|r| r.text.as_str()) }

    pub fn render(&self) -> String {
        match self {
            Consensus::Empty => NO_RESPONSES.to_string(),
            Consensus::Single(r) => r.text.clone(),
            Consensus::Divergent(r) => format!("{}\n\n{}", r.text, DISAGREEMENT_NOTE),
            Consensus::Agreed(r) => format!(
                "{}\n\nConsensus Confidence: {} ({}%)\n{} out of {} AI responses agreed on this answer.\n\n{}",
                r.text, r.confidence_label, r.percent(), r.support_count, r.total_count, DISCLAIMER
            ),
        }
    }
}

/// First response with the strictly highest confidence.
pub fn highest_confidence<'a, I>(responses: I) -> Option<&'a Response>
where
    I: IntoIterator<Item = &'a Response>,
{
    responses.into_iter().fold(None, |best: Option<&'a Response>, r| match best {
        Some(b) if r.confidence > b.confidence => Some(r),
        Some(b) => Some(b),
        None => Some(r),
    })
}

/// Weighted blend of how much of the batch the cluster covers and how
/// confident its members are. 0 for an empty cluster or batch.
pub fn consensus_confidence(cluster: &[&Response], total: usize, policy: &ConfidencePolicy) -> f64 {
    if cluster.is_empty() || total == 0 { return 0.0; }
    let share = cluster.len() as f64 / total as f64;
    let mean_confidence = cluster.iter().map(|r| r.confidence).sum::<f64>() / cluster.len() as f64;
    policy.size_weight * share + policy.confidence_weight * mean_confidence
}

fn result_for(representative: &Response, cluster: &[&Response], total: usize, policy: &ConfidencePolicy) -> ConsensusResult {
    let score = consensus_confidence(cluster, total, policy);
    ConsensusResult {
        text: representative.content.clone(),
        confidence_label: policy.label(score),
        confidence_score: score,
        support_count: cluster.len(),
        total_count: total,
    }
}

pub fn derive(responses: &[Response], config: &ConsensusConfig) -> Consensus {
    let span = info_span!("derive_consensus", responses = responses.len());
    let _e = span.enter();
    let total = responses.len();
    let policy = &config.confidence;
    match responses {
        [] => return Consensus::Empty,
        [only] => return Consensus::Single(result_for(only, &[only], 1, policy)),
        _ => {}
    }

    let p = partition(responses, config.outlier_threshold, config.cluster_threshold);
    let Some(largest) = p.largest() else {
        let Some(fallback) = highest_confidence(responses) else { return Consensus::Empty };
        debug!(source = %fallback.source, "all responses were outliers, using highest confidence");
        return Consensus::Divergent(result_for(fallback, &[fallback], total, policy));
    };
    let Some(representative) = highest_confidence(largest.iter().copied()) else { return Consensus::Empty };
    let result = result_for(representative, largest, total, policy);
    debug!(
        support = result.support_count,
        total,
        score = result.confidence_score,
        label = %result.confidence_label,
        representative = %representative.source,
        "consensus derived"
    );
    Consensus::Agreed(result)
}

/// Formatted consensus for `responses` under the default policy.
pub fn derive_consensus(responses: &[Response]) -> String {
    derive(responses, &ConsensusConfig::default()).render()
}

pub fn derive_consensus_with(responses: &[Response], config: &ConsensusConfig) -> String {
    derive(responses, config).render()
}
