use crate::scorer::tfidf;
use crate::stats::{indexable_text, Statistics};
use crate::store::Document;
use crate::tokenizer::tokenize;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub score: f64, // tf-idf of the term in this document
}

/// Ranks postings by score descending, ties by document id ascending.
fn by_rank(a: &Posting, b: &Posting) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Term -> postings ranked by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Score every document against `stats` and collect per-term postings.
    ///
    /// Takes a completed [`Statistics`], so it cannot run ahead of the
    /// statistics pass. Output depends only on the document set and the IDF
    /// map, not on the order documents are passed in.
    pub fn build(stats: &Statistics, documents: &[Document]) -> Self {
        let mut ordered: Vec<&Document> = documents.iter().collect();
        ordered.sort_by_key(|d| d.id);

        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        for doc in ordered {
            let tokens = tokenize(&indexable_text(doc));
            for (term, score) in tfidf(&tokens, stats.idf()) {
                postings.entry(term).or_default().push(Posting { doc_id: doc.id, score });
            }
            tracing::debug!(doc_id = doc.id, num_tokens = tokens.len(), "scored document");
        }
        for list in postings.values_mut() {
            list.sort_by(by_rank);
        }
        tracing::info!(num_docs = documents.len(), num_terms = postings.len(), "inverted index built");
        Self { postings }
    }

    /// Postings for `term`, best first; empty for unknown terms.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }
    pub fn num_terms(&self) -> usize { self.postings.len() }
    pub fn is_empty(&self) -> bool { self.postings.is_empty() }
    pub fn terms(&self) -> impl Iterator<Item = &str> { self.postings.keys().map(String::as_str) }
}
