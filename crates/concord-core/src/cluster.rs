//! Outlier detection and greedy seed-based clustering.
//!
//! Clustering is a single order-dependent pass: each unassigned response
//! seeds a cluster and pulls in every other unassigned response
//! whose similarity to the seed clears the threshold. Membership is judged
//! against the seed only, never transitively.

use concord_schema::Response;
use tracing::debug;

use crate::similarity::TokenSet;

pub type Cluster<'a> = Vec<&'a Response>;

/// Clusters over the non-outlier responses plus the outliers that were held back.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    /// Largest first; equal sizes keep creation order.
    pub clusters: Vec<Cluster<'a>>,
    /// Input order.
    pub outliers: Vec<&'a Response>,
}

impl<'a> Partition<'a> {
    pub fn largest(&self) -> Option<&Cluster<'a>> { self.clusters.first() }
}

/// True when the mean similarity of `response` to every other response in
/// `responses` is below `threshold`. "Other" is decided by id. A response
/// with nobody to compare against has mean 0.
pub fn is_outlier(response: &Response, responses: &[Response], threshold: f64) -> bool {
    let sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    let mean = mean_similarity(response, &TokenSet::new(&response.content), responses, &sets);
    debug!(source = %response.source, mean_similarity = mean, threshold, "outlier check");
    mean < threshold
}

/// `sets[j]` is the token set of `responses[j]`.
fn mean_similarity(response: &Response, own: &TokenSet, responses: &[Response], sets: &[TokenSet]) -> f64 {
    let (total, count) = responses
        .iter()
        .zip(sets)
        .filter(|(other, _)| other.id != response.id)
        .fold((0.0, 0usize), |(total, count), (_, set)| (total + own.jaccard(set), count + 1));
    if count > 0 { total / count as f64 } else { 0.0 }
}

/// Greedy clustering of `responses` at `threshold`.
pub fn cluster(responses: &[Response], threshold: f64) -> Vec<Cluster<'_>> {
    let refs: Vec<&Response> = responses.iter().collect();
    cluster_refs(&refs, threshold)
}

pub(crate) fn cluster_refs<'a>(responses: &[&'a Response], threshold: f64) -> Vec<Cluster<'a>> {
    let sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    let mut assigned = vec![false; responses.len()];
    let mut clusters: Vec<Cluster<'a>> = vec![];
    for seed in 0..responses.len() {
        if assigned[seed] { continue; }
        assigned[seed] = true;
        let mut members = vec![responses[seed]];
        for j in 0..responses.len() {
            if assigned[j] { continue; }
            let s = sets[seed].jaccard(&sets[j]);
            if s >= threshold {
                assigned[j] = true;
                members.push(responses[j]);
                debug!(seed = %responses[seed].source, member = %responses[j].source, similarity = s, "joined cluster");
            }
        }
        clusters.push(members);
    }
    // stable: equal sizes stay in creation order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));
    debug!(threshold, clusters = clusters.len(), largest = clusters.first().map(Vec::len).unwrap_or(0), "clustered");
    clusters
}

/// Outlier filtering over the full batch followed by clustering of the rest.
pub fn partition(responses: &[Response], outlier_threshold: f64, cluster_threshold: f64) -> Partition<'_> {
    let sets: Vec<TokenSet> = responses.iter().map(|r| TokenSet::new(&r.content)).collect();
    let mut kept = vec![];
    let mut outliers = vec![];
    for (i, r) in responses.iter().enumerate() {
        let mean = mean_similarity(r, &sets[i], responses, &sets);
        if mean < outlier_threshold {
            debug!(source = %r.source, mean_similarity = mean, outlier_threshold, "outlier");
            outliers.push(r);
        } else {
            kept.push(r);
        }
    }
    if kept.is_empty() {
        return Partition { clusters: vec![], outliers };
    }
    Partition { clusters: cluster_refs(&kept, cluster_threshold), outliers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn resp(id: &str, content: &str, confidence: f64) -> Response {
        Response::new(format!("model-{id}"), content, confidence).with_id(id)
    }

    fn ids(c: &[&Response]) -> Vec<String> { c.iter().map(|r| r.id.clone()).collect() }

    fn rayleigh() -> Vec<Response> {
        vec![
            resp("1", "The sky is blue because of Rayleigh scattering", 0.9),
            resp("2", "Rayleigh scattering causes the sky to appear blue", 0.85),
            resp("3", "Bananas are yellow", 0.5),
        ]
    }

    #[test]
    fn unrelated_answer_is_an_outlier() {
        let batch = rayleigh();
        assert!(!is_outlier(&batch[0], &batch, 0.12));
        assert!(!is_outlier(&batch[1], &batch, 0.12));
        assert!(is_outlier(&batch[2], &batch, 0.12));
    }

    #[test]
    fn outside_candidate_is_compared_to_whole_batch() {
        let batch = rayleigh();
        let candidate = resp("x", "Rayleigh scattering turns skies blue", 0.6);
        // mean of 1/2, 3/7 and 0
        assert!(!is_outlier(&candidate, &batch, 0.12));
        assert!(is_outlier(&candidate, &batch, 0.35));
    }

    #[test]
    fn lone_response_is_an_outlier() {
        let batch = vec![resp("1", "Photosynthesis converts light", 0.7)];
        assert!(is_outlier(&batch[0], &batch, 0.12));
    }

    #[test]
    fn partition_holds_back_outliers() {
        let batch = rayleigh();
        let p = partition(&batch, 0.12, 0.30);
        assert_eq!(p.clusters.len(), 1);
        assert_eq!(ids(&p.clusters[0]), vec!["1", "2"]);
        assert_eq!(ids(&p.outliers), vec!["3"]);
        assert_eq!(p.largest().map(Vec::len), Some(2));
        for r in &batch {
            assert_eq!(ids(&p.outliers).contains(&r.id), is_outlier(r, &batch, 0.12));
        }
    }

    #[test]
    fn all_outliers_leave_no_clusters() {
        let batch = vec![resp("1", "Volcanoes erupt magma", 0.4), resp("2", "Penguins cannot fly", 0.6)];
        let p = partition(&batch, 0.12, 0.30);
        assert!(p.clusters.is_empty());
        assert_eq!(p.outliers.len(), 2);
        assert!(p.largest().is_none());
    }

    #[test]
    fn membership_is_judged_against_the_seed_only() {
        let a = resp("a", "alpha beta gamma delta", 0.5);
        let b = resp("b", "gamma delta epsilon zeta", 0.5);
        let c = resp("c", "epsilon zeta theta iota", 0.5);
        let forward = vec![a.clone(), b.clone(), c.clone()];
        let clusters = cluster(&forward, 0.30);
        assert_eq!(clusters.iter().map(|c| ids(c)).collect::<Vec<_>>(), vec![vec!["a", "b"], vec!["c"]]);

        // seeding from the middle pulls in both ends
        let middle_first = vec![b, a, c];
        let clusters = cluster(&middle_first, 0.30);
        assert_eq!(clusters.len(), 1);
        assert_eq!(ids(&clusters[0]), vec!["b", "a", "c"]);
    }

    #[test]
    fn equal_sizes_keep_creation_order() {
        let batch = vec![
            resp("1", "mercury venus", 0.5),
            resp("2", "jupiter saturn", 0.5),
            resp("3", "jupiter saturn", 0.5),
            resp("4", "mercury venus", 0.5),
            resp("5", "neptune uranus", 0.5),
        ];
        let clusters = cluster(&batch, 0.30);
        assert_eq!(clusters.iter().map(|c| ids(c)).collect::<Vec<_>>(), vec![vec!["1", "4"], vec!["2", "3"], vec!["5"]]);
    }

    #[test]
    fn empty_input_gives_no_clusters() {
        assert!(cluster(&[], 0.3).is_empty());
        let p = partition(&[], 0.12, 0.3);
        assert!(p.clusters.is_empty() && p.outliers.is_empty());
    }

    #[test]
    fn raising_the_threshold_never_grows_the_largest_cluster() {
        let batch = vec![
            resp("1", "ocean tides follow lunar gravity", 0.8),
            resp("2", "ocean tides follow lunar cycles", 0.7),
            resp("3", "ocean tides depend on winds", 0.6),
            resp("4", "volcanic islands form slowly", 0.9),
        ];
        let mut previous = usize::MAX;
        for step in 0..=20 {
            let t = step as f64 / 20.0;
            let largest = cluster(&batch, t).first().map(Vec::len).unwrap_or(0);
            assert!(largest <= previous, "threshold {t} grew largest cluster to {largest}");
            previous = largest;
        }
        assert_eq!(cluster(&batch, 0.0)[0].len(), 4);
        assert_eq!(cluster(&batch, 1.0)[0].len(), 1);
    }

    const VOCAB: &[&str] = &["river", "mountain", "forest", "desert", "glacier", "canyon", "valley", "the", "and", "is"];

    fn batch_strategy() -> impl Strategy<Value = Vec<Response>> {
        proptest::collection::vec(proptest::collection::vec(proptest::sample::select(VOCAB), 0..6), 0..10).prop_map(|docs| {
            docs.into_iter().enumerate().map(|(i, words)| resp(&i.to_string(), &words.join(" "), 0.5)).collect()
        })
    }

    proptest! {
        #[test]
        fn prop_partition_covers_every_response_once(batch in batch_strategy(), t in 0.0f64..=1.0) {
            let p = partition(&batch, 0.12, t);
            let mut seen = HashSet::new();
            for r in p.clusters.iter().flatten().chain(p.outliers.iter()) {
                prop_assert!(seen.insert(r.id.clone()), "{} appears twice", r.id);
            }
            prop_assert_eq!(seen.len(), batch.len());
            for r in &batch {
                let held_back = p.outliers.iter().any(|o| o.id == r.id);
                prop_assert_eq!(held_back, is_outlier(r, &batch, 0.12));
            }
        }

        #[test]
        fn prop_clusters_are_sorted_and_non_empty(batch in batch_strategy(), t in 0.0f64..=1.0) {
            let clusters = cluster(&batch, t);
            prop_assert!(clusters.iter().all(|c| !c.is_empty()));
            prop_assert!(clusters.windows(2).all(|w| w[0].len() >= w[1].len()));
            prop_assert_eq!(clusters.iter().map(Vec::len).sum::<usize>(), batch.len());
        }
    }
}
