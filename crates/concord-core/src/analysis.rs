//! Batch-level summaries used for display: cluster breakdown, similarity
//! matrix and scorecard.
//! Unlike derivation, these cluster the whole batch without outlier filtering.

use concord_schema::Response;
use serde::Serialize;

use crate::cluster::cluster;
use crate::config::ConsensusConfig;
use crate::derivation::consensus_confidence;
use crate::similarity::TokenSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub size: usize,
    pub sources: Vec<String>,
    /// Mean prior confidence of the members.
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusAnalysis {
    pub confidence: f64,
    pub agreement_rate: f64,
    pub clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub verified: usize,
    pub total: usize,
    pub average_similarity: f64,
    pub score: f64,
}

/// Mean similarity over all unordered pairs, `None` without a pair.
pub(crate) fn pairwise_mean(responses: &[Response]) -> Option<f64> {
    let sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..sets.len() {
        for j in i + 1..sets.len() {
            total += sets[i].jaccard(&sets[j]);
            pairs += 1;
        }
    }
    (pairs > 0).then(|| total / pairs as f64)
}

/// 1.0 when there are fewer than two responses.
pub fn average_similarity(responses: &[Response]) -> f64 {
    pairwise_mean(responses).unwrap_or(1.0)
}

pub fn analyze_consensus(responses: &[Response], config: &ConsensusConfig) -> ConsensusAnalysis {
    if responses.is_empty() { return ConsensusAnalysis::default(); }
    let clusters = cluster(responses, config.cluster_threshold);
    let largest: &[&Response] = clusters.first().map(Vec::as_slice).unwrap_or(&[]);
    ConsensusAnalysis {
        confidence: consensus_confidence(largest, responses.len(), &config.confidence),
        agreement_rate: largest.len() as f64 / responses.len() as f64,
        clusters: clusters
            .iter()
            .map(|c| ClusterSummary {
                size: c.len(),
                sources: c.iter().map(|r| r.source.clone()).collect(),
                confidence: c.iter().map(|r| r.confidence).sum::<f64>() / c.len() as f64,
            })
            .collect(),
    }
}

/// N×N pairwise similarity in input order. Entries for the same id are 1.
pub fn similarity_matrix(responses: &[Response]) -> Vec<Vec<f64>> {
    let sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    responses
        .iter()
        .enumerate()
        .map(|(i, a)| {
            responses
                .iter()
                .enumerate()
                .map(|(j, b)| if a.id == b.id { 1.0 } else { sets[i].jaccard(&sets[j]) })
                .collect()
        })
        .collect()
}

/// Share of verified responses scaled by how alike the batch is overall.
pub fn scorecard(responses: &[Response]) -> Scorecard {
    if responses.is_empty() { return Scorecard::default(); }
    let verified = responses.iter().filter(|r| r.verified).count();
    let average_similarity = average_similarity(responses);
    Scorecard { verified, total: responses.len(), average_similarity, score: verified as f64 / responses.len() as f64 * average_similarity }
}
