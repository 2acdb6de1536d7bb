//! Per-source accuracy metrics for one query batch.

use concord_schema::{ModelMetrics, Response};
use tracing::debug;

use crate::config::MetricWeights;
use crate::similarity::TokenSet;

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.into_iter().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Groups by exact `source`, in order of first appearance.
fn group_by_source(responses: &[Response]) -> Vec<(&str, Vec<usize>)> {
    let mut groups: Vec<(&str, Vec<usize>)> = vec![];
    for (i, r) in responses.iter().enumerate() {
        match groups.iter_mut().find(|(source, _)| *source == r.source) {
            Some((_, members)) => members.push(i),
            None => groups.push((r.source.as_str(), vec![i])),
        }
    }
    groups
}

pub fn compute_model_metrics_with(responses: &[Response], consensus_text: &str, weights: &MetricWeights) -> Vec<ModelMetrics> {
    let consensus = TokenSet::new(consensus_text);
    let token_sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    let sets = token_sets.as_slice();

    group_by_source(responses)
        .into_iter()
        .map(|(source, members)| {
            let members = members.as_slice();
            let consensus_agreement = mean(members.iter().map(|&i| sets[i].jaccard(&consensus))).unwrap_or(0.0);
            let response_quality = mean(members.iter().map(|&i| responses[i].confidence)).unwrap_or(0.0);
            let factual_consistency = (consensus_agreement + response_quality) / 2.0;
            let hallucination_rate = (1.0 - factual_consistency).max(0.0);

            let cross = members.iter().flat_map(move |&i| {
                responses.iter().enumerate().filter(move |(_, other)| other.source != source).map(move |(j, _)| sets[i].jaccard(&sets[j]))
            });
            let outlier_score = mean(cross).map(|s| 1.0 - s).unwrap_or(0.0);

            let own = members.iter().enumerate().flat_map(move |(k, &i)| members[k + 1..].iter().map(move |&j| sets[i].jaccard(&sets[j])));
            let contradiction_rate = mean(own).map(|s| 1.0 - s).unwrap_or(0.0);

            let accuracy_score = (weights.consensus_agreement * consensus_agreement
                + weights.response_quality * response_quality
                + weights.factual_consistency * factual_consistency
                + weights.outlier * (1.0 - outlier_score)
                + weights.contradiction * (1.0 - contradiction_rate))
                .clamp(0.0, 1.0);

            let m = ModelMetrics {
                model_name: source.to_string(),
                accuracy_score,
                hallucination_rate,
                consensus_agreement,
                response_quality,
                factual_consistency,
                outlier_score,
                contradiction_rate,
                total_responses: members.len(),
                verified_responses: members.iter().filter(|&&i| responses[i].verified).count(),
            };
            debug!(model = %m.model_name, accuracy = m.accuracy_score, agreement = m.consensus_agreement, outlier = m.outlier_score, "model metrics");
            m
        })
        .collect()
}

pub fn compute_model_metrics(responses: &[Response], consensus_text: &str) -> Vec<ModelMetrics> {
    compute_model_metrics_with(responses, consensus_text, &MetricWeights::default())
}
