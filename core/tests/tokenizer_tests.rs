use search_core::tokenizer::tokenize;

#[test]
fn it_lowercases_and_strips_punctuation() {
    let words = tokenize("Rust's ownership-model, EXPLAINED!");
    assert_eq!(words, vec!["rusts", "ownershipmodel", "explained"]);
}

#[test]
fn it_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn it_filters_encyclopedia_noise() {
    let words = tokenize("See also: external links, references (retrieved March 2021)");
    assert_eq!(words, vec!["2021"]);
}

#[test]
fn it_keeps_digits_and_underscores() {
    assert_eq!(tokenize("snake_case v2 1984"), vec!["snake_case", "v2", "1984"]);
}

#[test]
fn it_is_deterministic() {
    let text = "Lighthouses guide ships along rocky coasts; lighthouses are tall.";
    assert_eq!(tokenize(text), tokenize(text));
}

#[test]
fn stopword_only_text_is_empty() {
    assert!(tokenize("the and of a in").is_empty());
}
