//! Summarization strategies for cluster records.
//!
//! Turning a cluster into prose (e.g. a language-model call) is left to the
//! caller via closures or trait implementations, keeping this crate
//! lightweight. [`KeywordSummarizer`] gives a deterministic extractive
//! description for offline runs.

use crate::summary::ClusterRecord;

/// Trait for summarization strategies.
///
/// `samples` are the texts of the record's representatives, closest first.
pub trait Summarizer<S = String> {
    /// Summarize one cluster.
    fn summarize(&self, record: &ClusterRecord, samples: &[&str]) -> S;
}

/// Extractive one-line description built from keywords and the closest
/// representative.
#[derive(Debug, Clone)]
pub struct KeywordSummarizer {
    /// Keywords to mention.
    pub max_terms: usize,
    /// Maximum length of the quoted sample (truncated with `...`).
    pub max_len: Option<usize>,
}

impl Default for KeywordSummarizer {
    fn default() -> Self {
        Self {
            max_terms: 3,
            max_len: Some(120),
        }
    }
}

impl KeywordSummarizer {
    /// Create a summarizer with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many keywords to mention.
    pub fn with_max_terms(mut self, n: usize) -> Self {
        self.max_terms = n;
        self
    }

    /// Set maximum quoted sample length.
    pub fn with_max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }
}

impl Summarizer<String> for KeywordSummarizer {
    fn summarize(&self, record: &ClusterRecord, samples: &[&str]) -> String {
        let noun = if record.size == 1 { "response" } else { "responses" };
        let mut out = if record.is_noise {
            format!("Unclustered ({} {noun})", record.size)
        } else {
            let terms: Vec<&str> = record
                .keywords
                .iter()
                .take(self.max_terms)
                .map(String::as_str)
                .collect();
            if terms.is_empty() {
                format!("Theme {} ({} {noun})", record.cluster_id, record.size)
            } else {
                format!("{} ({} {noun})", terms.join(", "), record.size)
            }
        };

        if let Some(sample) = samples.first() {
            let quoted = match self.max_len {
                Some(max) if sample.chars().count() > max => {
                    let cut: String = sample.chars().take(max.saturating_sub(3)).collect();
                    format!("{cut}...")
                }
                _ => (*sample).to_string(),
            };
            out.push_str(&format!(": \"{quoted}\""));
        }
        out
    }
}

/// A function-based summarizer.
#[derive(Clone)]
pub struct FnSummarizer<F> {
    f: F,
}

impl<F> FnSummarizer<F> {
    /// Create a summarizer from a function.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<S, F> Summarizer<S> for FnSummarizer<F>
where
    F: Fn(&ClusterRecord, &[&str]) -> S,
{
    fn summarize(&self, record: &ClusterRecord, samples: &[&str]) -> S {
        (self.f)(record, samples)
    }
}

/// Create a summarizer from a closure.
pub fn from_fn<S, F>(f: F) -> FnSummarizer<F>
where
    F: Fn(&ClusterRecord, &[&str]) -> S,
{
    FnSummarizer::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(keywords: &[&str], is_noise: bool) -> ClusterRecord {
        ClusterRecord {
            cluster_id: if is_noise { usize::MAX } else { 0 },
            member_ids: BTreeSet::from([1, 2]),
            size: 2,
            representative_ids: vec![1],
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            is_noise,
            low_confidence: is_noise,
            cohesion: None,
        }
    }

    #[test]
    fn test_keyword_summarizer() {
        let s = KeywordSummarizer::new().with_max_terms(2);
        let text = s.summarize(&record(&["wait", "times", "queue"], false), &["awful wait times"]);
        assert_eq!(text, "wait, times (2 responses): \"awful wait times\"");

        let noise = s.summarize(&record(&[], true), &[]);
        assert_eq!(noise, "Unclustered (2 responses)");
    }

    #[test]
    fn test_keyword_summarizer_truncates() {
        let s = KeywordSummarizer::new().with_max_len(8);
        let text = s.summarize(&record(&["x"], false), &["abcdefghijk"]);
        assert!(text.ends_with("\"abcde...\""));
    }

    #[test]
    fn test_fn_summarizer() {
        let summarizer = from_fn(|r: &ClusterRecord, samples: &[&str]| r.size + samples.len());
        let total: usize = summarizer.summarize(&record(&[], false), &["a", "b"]);
        assert_eq!(total, 4);
    }
}
