//! Plain-language explanation of a finished consensus run.

use std::fmt;

use concord_schema::{Response, NO_RESPONSES};

use crate::analysis::pairwise_mean;
use crate::cluster::cluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusLevel { Strong, Moderate, Weak, VeryLow }

impl ConsensusLevel {
    /// From the verified share in percent.
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 80.0 { ConsensusLevel::Strong } else if percent >= 60.0 { ConsensusLevel::Moderate } else if percent >= 40.0 { ConsensusLevel::Weak } else { ConsensusLevel::VeryLow }
    }
    pub fn is_low(self) -> bool { matches!(self, ConsensusLevel::Weak | ConsensusLevel::VeryLow) }
}

impl fmt::Display for ConsensusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { ConsensusLevel::Strong => "strong", ConsensusLevel::Moderate => "moderate", ConsensusLevel::Weak => "weak", ConsensusLevel::VeryLow => "very low" })
    }
}

const LOW_CONSENSUS_CAUSES: &[&str] = &[
    "The question may be ambiguous or open to multiple interpretations",
    "The topic might involve subjective perspectives rather than objective facts",
    "Different AI models may have different training data or knowledge cutoffs",
    "The query might involve emerging or rapidly evolving topics where information is still developing",
    "Some models may be more cautious about providing definitive answers on certain topics",
    "Different models may prioritize different aspects of the same topic",
];

fn pct(x: f64) -> i64 { x.round() as i64 }

pub fn explain(responses: &[Response], verified_count: usize, consensus_confidence: f64, cluster_threshold: f64) -> String {
    if responses.is_empty() { return NO_RESPONSES.to_string(); }
    let total = responses.len();
    let share = verified_count as f64 / total as f64 * 100.0;
    let level = ConsensusLevel::from_percent(share);
    let avg = pairwise_mean(responses).unwrap_or(0.0);
    let clusters = cluster(responses, cluster_threshold);

    let mut out = String::new();
    out.push_str(&format!("Consensus Analysis: {verified_count} out of {total} AI responses align with the consensus view ({}%).\n\n", pct(share)));
    out.push_str(&format!("Confidence: {}% - This reflects both how many models agree and their individual confidence levels.\n\n", pct(consensus_confidence * 100.0)));
    out.push_str(&format!("The average text similarity between all responses is {}%. ", pct(avg * 100.0)));
    if clusters.len() > 1 {
        out.push_str(&format!("The responses formed {} distinct clusters of opinion, with the largest cluster containing {} responses.\n\n", clusters.len(), clusters[0].len()));
    } else {
        out.push_str("All responses formed a single cluster of similar opinions.\n\n");
    }
    out.push_str(&format!("This represents a {level} consensus among the queried AI models. "));
    if level.is_low() {
        out.push_str("Possible reasons for low consensus include:\n");
        for cause in LOW_CONSENSUS_CAUSES {
            out.push_str(&format!("- {cause}\n"));
        }
    }
    out
}
