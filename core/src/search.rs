use crate::index::InvertedIndex;
use crate::manager::Snapshot;
use crate::store::DocumentStore;
use crate::tokenizer::tokenize;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query_received: String,
    pub results_found: usize,
    pub search_results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocId,
    pub title: String,
    pub url: String,
    pub content_preview: String,
    pub relevance_score: f64,
}

impl SearchResponse {
    fn empty(query: &str) -> Self {
        Self { query_received: query.to_string(), results_found: 0, search_results: Vec::new() }
    }
}

/// Sum of posting scores per document over every query term (OR semantics).
/// A term repeated in the query counts each time it appears.
pub fn accumulate_scores(index: &InvertedIndex, terms: &[String]) -> HashMap<DocId, f64> {
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for term in terms {
        for p in index.postings(term) {
            *scores.entry(p.doc_id).or_insert(0.0) += p.score;
        }
    }
    scores
}

/// Best `limit` candidates, score descending, ties by id ascending.
pub fn top_k(scores: HashMap<DocId, f64>, limit: usize) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

pub fn round_score(score: f64) -> f64 { (score * 10_000.0).round() / 10_000.0 }

fn preview(content: Option<&str>) -> String {
    let content = content.unwrap_or("");
    if content.chars().count() > PREVIEW_CHARS {
        let mut s: String = content.chars().take(PREVIEW_CHARS).collect();
        s.push_str("...");
        s
    } else {
        content.to_string()
    }
}

/// Rank documents for `query` against one snapshot and attach display data.
///
/// Documents the index still references but the store no longer has are
/// dropped from the results.
pub fn search(snapshot: &Snapshot, store: &dyn DocumentStore, query: &str, limit: usize) -> SearchResponse {
    let terms = tokenize(query);
    if terms.is_empty() {
        return SearchResponse::empty(query);
    }

    let ranked = top_k(accumulate_scores(snapshot.index(), &terms), limit);
    if ranked.is_empty() {
        return SearchResponse::empty(query);
    }

    let ids: Vec<DocId> = ranked.iter().map(|(id, _)| *id).collect();
    let docs = match store.fetch_by_ids(&ids) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!(error = %e, "could not fetch search results");
            Vec::new()
        }
    };
    let mut by_id: HashMap<DocId, _> = docs.into_iter().map(|d| (d.id, d)).collect();

    let search_results: Vec<SearchHit> = ranked
        .into_iter()
        .filter_map(|(id, score)| {
            let doc = by_id.remove(&id)?;
            Some(SearchHit {
                id,
                content_preview: preview(doc.content.as_deref()),
                title: doc.title,
                url: doc.url,
                relevance_score: round_score(score),
            })
        })
        .collect();

    tracing::debug!(query, num_terms = terms.len(), results = search_results.len(), "search");
    SearchResponse { query_received: query.to_string(), results_found: search_results.len(), search_results }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_four_places() {
        assert_eq!(round_score(0.693147), 0.6931);
        assert_eq!(round_score(0.12345678), 0.1235);
        assert_eq!(round_score(0.0), 0.0);
    }

    #[test]
    fn previews_are_truncated() {
        let long = "x".repeat(250);
        let p = preview(Some(long.as_str()));
        assert_eq!(p.len(), 203);
        assert!(p.ends_with("..."));
        assert_eq!(preview(Some("short")), "short");
        assert_eq!(preview(None), "");
    }

    #[test]
    fn top_k_orders_and_limits() {
        let scores: HashMap<DocId, f64> = [(1, 0.5), (2, 0.9), (3, 0.5), (4, 0.1)].into_iter().collect();
        assert_eq!(top_k(scores.clone(), 3), vec![(2, 0.9), (1, 0.5), (3, 0.5)]);
        assert!(top_k(scores, 0).is_empty());
    }
}
