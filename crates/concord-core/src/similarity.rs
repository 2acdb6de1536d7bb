//! Token-set Jaccard similarity between two answer bodies.

use std::collections::HashSet;

/// Tokens of at most this many characters are dropped before comparison.
/// Acts as a cheap stopword filter ("the", "is", "and").
pub const MAX_IGNORED_TOKEN_CHARS: usize = 3;

/// Lowercased whitespace tokens longer than [`MAX_IGNORED_TOKEN_CHARS`].
/// Punctuation stays attached, so `"blue."` and `"blue"` are different tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet(HashSet<String>);

impl TokenSet {
    pub fn new(text: &str) -> Self {
        Self(
            text.to_lowercase()
                .split_whitespace()
                .filter(|t| t.chars().count() > MAX_IGNORED_TOKEN_CHARS)
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// `|A ∩ B| / |A ∪ B|`, or 0 when both sets are empty.
    pub fn jaccard(&self, other: &TokenSet) -> f64 {
        let intersection = self.0.intersection(&other.0).count();
        let union = self.0.len() + other.0.len() - intersection;
        if union == 0 { return 0.0; }
        intersection as f64 / union as f64
    }
}

/// Similarity in `[0, 1]`. A text with no qualifying token scores 0 even
/// against itself.
pub fn similarity(a: &str, b: &str) -> f64 {
    TokenSet::new(a).jaccard(&TokenSet::new(b))
}
