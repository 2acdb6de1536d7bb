//! Back-verification of every response against the consensus text.
//!
//! When similarities to the consensus are widely spread the threshold is
//! relaxed toward the mean, never below the policy floor.

use concord_schema::Response;
use tracing::{debug, info_span};

use crate::config::VerificationPolicy;
use crate::similarity::TokenSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl SimilarityStats {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() { return Self { mean: 0.0, std_dev: 0.0 }; }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { mean, std_dev: variance.sqrt() }
    }
}

pub fn effective_threshold(stats: SimilarityStats, policy: &VerificationPolicy) -> f64 {
    if stats.std_dev > policy.variance_trigger {
        (stats.mean - policy.stddev_factor * stats.std_dev).max(policy.floor)
    } else {
        policy.base_threshold
    }
}

/// Copies of `responses` with `verified` set, input order preserved.
pub fn verify_with(responses: &[Response], consensus_text: &str, policy: &VerificationPolicy) -> Vec<Response> {
    let span = info_span!("verify", responses = responses.len());
    let _e = span.enter();
    let consensus = TokenSet::new(consensus_text);
    let similarities: Vec<f64> = responses.iter().map(|r| TokenSet::new(&r.content).jaccard(&consensus)).collect();
    let stats = SimilarityStats::of(&similarities);
    let threshold = effective_threshold(stats, policy);
    debug!(mean = stats.mean, std_dev = stats.std_dev, threshold, "verification threshold");

    responses
        .iter()
        .zip(similarities)
        .map(|(r, s)| {
            let verified = s >= threshold;
            debug!(source = %r.source, similarity = s, verified, "verified");
            Response { verified, ..r.clone() }
        })
        .collect()
}

/// [`verify_with`] at the default policy. For a different base threshold pass
/// `VerificationPolicy::default().with_base_threshold(t)` to [`verify_with`].
pub fn verify(responses: &[Response], consensus_text: &str) -> Vec<Response> {
    verify_with(responses, consensus_text, &VerificationPolicy::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resp(id: &str, content: &str) -> Response { Response::new(format!("model-{id}"), content, 0.5).with_id(id) }

    fn rayleigh() -> Vec<Response> {
        vec![
            resp("1", "The sky is blue because of Rayleigh scattering"),
            resp("2", "Rayleigh scattering causes the sky to appear blue"),
            resp("3", "Bananas are yellow"),
        ]
    }

    fn flags(rs: &[Response]) -> Vec<bool> { rs.iter().map(|r| r.verified).collect() }

    #[test]
    fn agreeing_answers_verify_and_outlier_diverges() {
        let batch = rayleigh();
        let out = verify(&batch, &batch[0].content);
        assert_eq!(flags(&out), vec![true, true, false]);
        assert_eq!(out.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn input_is_left_untouched() {
        let batch = rayleigh();
        let snapshot = batch.clone();
        let _ = verify(&batch, &batch[0].content);
        assert_eq!(batch, snapshot);
    }

    #[test]
    fn previously_verified_flag_is_recomputed() {
        let mut batch = rayleigh();
        batch[2].verified = true;
        assert!(!verify(&batch, &batch[0].content)[2].verified);
    }

    #[test]
    fn low_spread_uses_base_threshold() {
        let policy = VerificationPolicy::default();
        let stats = SimilarityStats::of(&[0.5, 0.55, 0.6]);
        assert!(stats.std_dev <= policy.variance_trigger);
        assert_eq!(effective_threshold(stats, &policy), 0.45);
        assert_eq!(effective_threshold(stats, &policy.clone().with_base_threshold(0.7)), 0.7);
    }

    #[test]
    fn high_spread_relaxes_toward_mean() {
        let policy = VerificationPolicy::default();
        let stats = SimilarityStats::of(&[1.0, 1.0, 1.0, 0.1]);
        assert!((stats.mean - 0.775).abs() < 1e-12);
        assert!((effective_threshold(stats, &policy) - 0.580144).abs() < 1e-5);
    }

    #[test]
    fn raised_base_threshold_rejects_partial_agreement() {
        let batch = vec![
            resp("1", "Rayleigh scattering makes skies blue"),
            resp("2", "Rayleigh scattering makes skies blue daily"),
        ];
        // similarities 1.0 and 5/6, spread stays on the base threshold
        let consensus = batch[0].content.clone();
        assert_eq!(flags(&verify(&batch, &consensus)), vec![true, true]);
        let strict = VerificationPolicy::default().with_base_threshold(0.9);
        assert_eq!(flags(&verify_with(&batch, &consensus, &strict)), vec![true, false]);
    }

    #[test]
    fn relaxed_threshold_is_floored() {
        let stats = SimilarityStats::of(&[1.0, 0.0]);
        assert_eq!(stats.std_dev, 0.5);
        assert_eq!(effective_threshold(stats, &VerificationPolicy::default()), 0.4);
    }

    #[test]
    fn empty_batch_verifies_nothing() {
        assert!(verify(&[], "anything at all").is_empty());
        assert_eq!(SimilarityStats::of(&[]), SimilarityStats { mean: 0.0, std_dev: 0.0 });
    }

    proptest! {
        #[test]
        fn prop_rerun_gives_identical_flags(docs in proptest::collection::vec("[a-z]{2,7}( [a-z]{2,7}){0,5}", 0..8), pick in 0usize..8) {
            let batch: Vec<Response> = docs.iter().enumerate().map(|(i, d)| resp(&i.to_string(), d)).collect();
            let consensus = docs.get(pick).cloned().unwrap_or_default();
            let first = verify(&batch, &consensus);
            let second = verify(&batch, &consensus);
            prop_assert_eq!(flags(&first), flags(&second));
            prop_assert_eq!(first.len(), batch.len());
        }
    }
}
