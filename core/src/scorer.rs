use std::collections::HashMap;

/// `count(term) / total tokens` for every distinct term.
pub fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    if tokens.is_empty() { return HashMap::new(); }
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    let total = tokens.len() as f64;
    counts.into_iter().map(|(t, c)| (t.to_string(), c as f64 / total)).collect()
}

/// TF-IDF vector of one tokenized document.
///
/// Terms missing from `idf` score zero. That is how a document admitted after
/// the last rebuild fails to rank on words the corpus had never seen: its
/// novel vocabulary has no IDF until the next rebuild.
pub fn tfidf(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    term_frequencies(tokens)
        .into_iter()
        .map(|(term, tf)| {
            let weight = idf.get(&term).copied().unwrap_or(0.0);
            (term, tf * weight)
        })
        .collect()
}
