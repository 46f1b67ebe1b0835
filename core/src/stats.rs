//! Corpus-wide term statistics: document frequency and inverse document
//! frequency per term.

use crate::error::{IndexError, Result};
use crate::store::Document;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The text a document is indexed under. The title is repeated so title terms
/// weigh roughly twice as much in term frequency.
pub fn indexable_text(doc: &Document) -> String {
    format!("{title} {title} {content}", title = doc.title, content = doc.content)
}

/// `ln(N / df)`; zero when the term occurs in every document.
pub fn idf(total_documents: u64, document_frequency: u64) -> f64 {
    (total_documents as f64 / document_frequency as f64).ln()
}

/// Document count, document frequencies and IDF from one corpus scan.
///
/// Never empty: a value of this type always describes at least one document
/// and at least one term, which is what the index builder requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    total_documents: u64,
    document_frequencies: HashMap<String, u64>,
    idf: HashMap<String, f64>,
}

impl Statistics {
    pub fn compute(documents: &[Document]) -> Result<Self> {
        if documents.is_empty() {
            return Err(IndexError::NoDocuments);
        }
        let mut document_frequencies: HashMap<String, u64> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = tokenize(&indexable_text(doc)).into_iter().collect();
            for term in unique {
                *document_frequencies.entry(term).or_insert(0) += 1;
            }
        }
        if document_frequencies.is_empty() {
            return Err(IndexError::EmptyVocabulary);
        }
        let total_documents = documents.len() as u64;
        let idf = document_frequencies
            .iter()
            .map(|(term, &df)| (term.clone(), idf(total_documents, df)))
            .collect();
        tracing::info!(num_docs = total_documents, num_terms = document_frequencies.len(), "computed term statistics");
        Ok(Self { total_documents, document_frequencies, idf })
    }

    /// Reassemble statistics from cached parts; `None` if any part is empty.
    pub fn from_parts(
        total_documents: u64,
        document_frequencies: HashMap<String, u64>,
        idf: HashMap<String, f64>,
    ) -> Option<Self> {
        if total_documents == 0 || document_frequencies.is_empty() || idf.is_empty() {
            return None;
        }
        Some(Self { total_documents, document_frequencies, idf })
    }

    pub fn total_documents(&self) -> u64 { self.total_documents }
    pub fn document_frequencies(&self) -> &HashMap<String, u64> { &self.document_frequencies }
    pub fn idf(&self) -> &HashMap<String, f64> { &self.idf }
    pub fn num_terms(&self) -> usize { self.idf.len() }

    pub fn document_frequency(&self, term: &str) -> u64 {
        self.document_frequencies.get(term).copied().unwrap_or(0)
    }
}
