use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","ain","all","am","an","and","any","are","aren","arent","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could","couldn","couldnt",
            "d","did","didn","didnt","do","does","doesn","doesnt","doing","don","dont","down","during",
            "each","few","for","from","further",
            "had","hadn","hadnt","has","hasn","hasnt","have","haven","havent","having","he","hed","hell","hes","her","here","heres","hers","herself","him","himself","his","how","hows",
            "i","id","ill","im","ive","if","in","into","is","isn","isnt","it","its","itself",
            "lets","ll","m","ma","me","mightn","mightnt","more","most","mustn","mustnt","my","myself",
            "needn","neednt","no","nor","not","now",
            "o","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "re","s","same","shan","shant","she","shed","shell","shes","should","shouldn","shouldnt","shouldve","so","some","such",
            "t","than","that","thatll","thats","thatve","the","their","theirs","them","themselves","then","there","theres","these","they","theyd","theyll","theyre","theyve","this","those","through","to","too",
            "under","until","up","ve","very",
            "was","wasn","wasnt","we","wed","well","were","weren","werent","what","whats","when","whens","where","wheres","which","while","who","whos","whom","why","whys","will","with","won","wont","would","wouldn","wouldnt",
            "y","you","youd","youll","youre","youve","your","yours","yourself","yourselves",
            // encyclopedia boilerplate
            "article","section","figure","table","reference","references","citation","citations","external","links",
            "see","also","page","pages","volume","chapter","edition","et","al","isbn","history","notes","reading",
            "doi","retrieved",
            "january","february","march","april","may","june","july","august","september","october","november","december"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into index terms: lowercase, drop every character that is
/// neither a word character nor whitespace, split on whitespace, remove stopwords.
///
/// Documents and queries must both go through this function; a term only
/// matches if it was normalized the same way on both sides.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() { return Vec::new(); }
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    cleaned
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .map(str::to_string)
        .collect()
}
