//! Keyword extraction for cluster records.
//!
//! Keywords are ranked by class-based TF-IDF: each cluster is treated as one
//! document made of all its members' text.
//!
//! ```text
//! score(t, c) = tf(t, c) · ln(1 + C / df(t))
//! ```
//!
//! where `tf` is the share of cluster `c`'s tokens equal to `t`, `C` is the
//! number of clusters and `df` the number of clusters containing `t`. Terms
//! frequent in one cluster and rare elsewhere rank highest. Equal scores are
//! ordered lexicographically.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Tokens shorter than this are dropped.
pub const MIN_TOKEN_LEN: usize = 3;

/// Common English stopwords (only entries of [`MIN_TOKEN_LEN`] or more matter).
const STOPWORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "was", "are", "were", "been", "have", "has", "had", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "this", "that",
    "these", "those", "you", "she", "they", "him", "her", "them", "from", "its", "not", "their",
    "which", "into", "than", "when", "what", "all", "more", "some", "other", "most", "also",
    "about", "such", "only", "see", "our", "your", "there", "then", "just", "very", "really",
    "any", "who", "how", "why", "out", "too", "own", "same", "each", "few", "both", "because",
];

/// Split `text` into lowercase alphabetic tokens of at least
/// [`MIN_TOKEN_LEN`] characters. Stopwords are not removed here.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// Ranks distinguishing terms per cluster.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stopwords: HashSet<String>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self {
            stopwords: STOPWORDS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl KeywordExtractor {
    /// Extractor with the built-in English stopword list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add domain stopwords (e.g. the survey question's own words).
    pub fn with_extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    /// Whether `token` (already lowercased) is a stopword.
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Content tokens of `text`.
    pub fn terms(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|t| !self.is_stopword(t))
            .collect()
    }

    /// Top `max_keywords` terms for each cluster.
    ///
    /// `clusters[c]` holds the member texts of cluster `c`. The output has one
    /// entry per cluster, in the same order.
    pub fn extract<S: AsRef<str>>(&self, clusters: &[Vec<S>], max_keywords: usize) -> Vec<Vec<String>> {
        // BTreeMap gives a stable iteration order for the scoring pass.
        let counts: Vec<BTreeMap<String, usize>> = clusters
            .iter()
            .map(|texts| {
                let mut tf = BTreeMap::new();
                for text in texts {
                    for term in self.terms(text.as_ref()) {
                        *tf.entry(term).or_insert(0usize) += 1;
                    }
                }
                tf
            })
            .collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for tf in &counts {
            for term in tf.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n_clusters = clusters.len() as f64;
        counts
            .iter()
            .map(|tf| {
                let total: usize = tf.values().sum();
                if total == 0 || max_keywords == 0 {
                    return Vec::new();
                }
                let mut scored: Vec<(&str, f64)> = tf
                    .iter()
                    .map(|(term, &count)| {
                        let docs = df.get(term.as_str()).copied().unwrap_or(1) as f64;
                        let idf = (1.0 + n_clusters / docs).ln();
                        (term.as_str(), count as f64 / total as f64 * idf)
                    })
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                scored
                    .into_iter()
                    .take(max_keywords)
                    .map(|(t, _)| t.to_string())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_alphabetic_runs() {
        assert_eq!(
            tokenize("Wait-times were AWFUL!! (2x) ok"),
            vec!["wait", "times", "were", "awful"]
        );
        assert!(tokenize("a an 42 to").is_empty());
    }

    #[test]
    fn stopwords_are_removed() {
        let ex = KeywordExtractor::new();
        assert_eq!(ex.terms("The service was great and the staff"), vec!["service", "great", "staff"]);
        let ex = ex.with_extra_stopwords(["Staff"]);
        assert_eq!(ex.terms("great staff"), vec!["great"]);
    }

    #[test]
    fn distinguishing_terms_rank_first() {
        let clusters = vec![
            vec!["great service", "great staff service"],
            vec!["awful wait times", "long wait", "service slow wait"],
        ];
        let kw = KeywordExtractor::new().extract(&clusters, 3);
        assert_eq!(kw[0][0], "great");
        assert_eq!(kw[1][0], "wait");
        assert!(kw.iter().all(|k| k.len() <= 3));
    }

    #[test]
    fn ties_are_lexicographic() {
        let clusters = vec![vec!["zebra apple mango"]];
        let kw = KeywordExtractor::new().extract(&clusters, 10);
        assert_eq!(kw[0], vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn empty_text_gives_no_keywords() {
        let clusters = vec![vec!["the and of"], vec!["pricing"]];
        let kw = KeywordExtractor::new().extract(&clusters, 5);
        assert!(kw[0].is_empty());
        assert_eq!(kw[1], vec!["pricing"]);
    }
}
