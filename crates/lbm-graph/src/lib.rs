//! Per-group context graph: an in-memory index over claim artifacts with
//! deterministic embedding-based similarity search. Not canonical — every
//! field here is derivable by replaying a group's `claim`/`retract`
//! transactions, so the graph may be rebuilt from the chain at any time.

#![warn(missing_docs)]

pub mod embedding;

use std::collections::BTreeMap;

use lbm_types::{ClaimRecord, GraphHit};
use serde::{Deserialize, Serialize};

/// One indexed claim, with the embedding computed at index time so queries
/// don't re-embed candidate text on every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    record: ClaimRecord,
    embedding: [f64; 64],
}

/// The in-memory `{claim_hash -> (tags, created_ms, retracted)}` index for
/// one group, plus precomputed embeddings for ranked search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextGraph {
    entries: BTreeMap<String, Entry>,
}

impl ContextGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) a claim. `text` is the claim artifact's free-text
    /// body; `tags` are appended to it before embedding, per the ranking
    /// algorithm's candidate-text definition.
    pub fn index_claim(&mut self, claim_hash: &str, text: &str, tags: Vec<String>, created_ms: i64) {
        let candidate_text = candidate_text(text, &tags);
        let embedding = embedding::embed(&candidate_text);
        self.entries.insert(
            claim_hash.to_string(),
            Entry { record: ClaimRecord { tags, created_ms, retracted: false }, embedding },
        );
    }

    /// Mark a previously-indexed claim as retracted. No-op if unknown —
    /// retraction of a claim this graph never saw is harmless.
    pub fn retract(&mut self, claim_hash: &str) {
        if let Some(entry) = self.entries.get_mut(claim_hash) {
            entry.record.retracted = true;
        }
    }

    /// Number of indexed claims, including retracted ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no claims are indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one claim's record.
    pub fn get(&self, claim_hash: &str) -> Option<&ClaimRecord> {
        self.entries.get(claim_hash).map(|e| &e.record)
    }

    /// Rank up to `limit` claims by cosine similarity to `query`, skipping
    /// retracted claims unless `include_retracted` is set. Ties (equal
    /// score) break toward the newer `created_ms`.
    pub fn search(&self, query: &str, limit: usize, include_retracted: bool) -> Vec<GraphHit> {
        let query_vec = embedding::embed(query);
        let mut hits: Vec<GraphHit> = self
            .entries
            .iter()
            .filter(|(_, e)| include_retracted || !e.record.retracted)
            .map(|(hash, e)| GraphHit {
                claim_hash: hash.clone(),
                score: embedding::cosine(&query_vec, &e.embedding),
                created_ms: e.record.created_ms,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.created_ms.cmp(&a.created_ms))
        });
        hits.truncate(limit);
        hits
    }

    /// Discard every indexed claim. Used before a full rebuild from the chain.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The text a claim is embedded from: its body plus tags, space-joined, per
/// the ranking algorithm's candidate-text definition.
fn candidate_text(text: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        text.to_string()
    } else {
        format!("{text} {}", tags.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_by_similarity() {
        let mut graph = ContextGraph::new();
        graph.index_claim("h1", "rust ownership and borrowing", vec![], 1);
        graph.index_claim("h2", "baking sourdough bread at home", vec![], 2);

        let hits = graph.search("rust borrow checker", 10, false);
        assert_eq!(hits[0].claim_hash, "h1");
    }

    #[test]
    fn retracted_claims_are_skipped_by_default() {
        let mut graph = ContextGraph::new();
        graph.index_claim("h1", "rust ownership model", vec![], 1);
        graph.retract("h1");

        assert!(graph.search("rust ownership model", 10, false).is_empty());
        assert_eq!(graph.search("rust ownership model", 10, true).len(), 1);
    }

    #[test]
    fn ties_break_toward_newer_created_ms() {
        let mut graph = ContextGraph::new();
        graph.index_claim("older", "identical text here", vec![], 100);
        graph.index_claim("newer", "identical text here", vec![], 200);

        let hits = graph.search("identical text here", 10, false);
        assert_eq!(hits[0].claim_hash, "newer");
    }

    #[test]
    fn tags_are_folded_into_candidate_text() {
        let mut graph = ContextGraph::new();
        graph.index_claim("h1", "", vec!["astronomy".into(), "telescopes".into()], 1);

        let hits = graph.search("astronomy telescopes", 10, false);
        assert_eq!(hits[0].claim_hash, "h1");
        assert!(hits[0].score > 0.9);
    }

    #[test]
    fn limit_truncates_results() {
        let mut graph = ContextGraph::new();
        for i in 0..5 {
            graph.index_claim(&format!("h{i}"), "shared topic text", vec![], i);
        }
        assert_eq!(graph.search("shared topic text", 2, false).len(), 2);
    }

    #[test]
    fn clear_empties_the_index() {
        let mut graph = ContextGraph::new();
        graph.index_claim("h1", "anything", vec![], 1);
        graph.clear();
        assert!(graph.is_empty());
    }
}
