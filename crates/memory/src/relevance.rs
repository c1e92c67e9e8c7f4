//! Keyword relevance between a query and a memory's content.
//!
//! Scores are the fraction of meaningful query terms found in the content,
//! so they fall in `[0, 1]` and a full match scores exactly 1.0. Terms match
//! when equal or when one is a prefix of the other and the shorter is at
//! least four characters, which lets "meeting" find "meetings" and
//! "preferences" find "prefer".

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "with", "what", "can", "are", "was", "this", "that",
    "have", "from", "about", "into", "how", "please", "could", "would", "should", "will",
];

const MIN_PREFIX: usize = 4;

/// Lower-cased alphanumeric tokens of at least three characters, minus stopwords.
pub fn terms(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 3 {
            continue;
        }
        let word = word.to_lowercase();
        if !STOPWORDS.contains(&word.as_str()) && !out.contains(&word) {
            out.push(word);
        }
    }
    out
}

fn terms_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= MIN_PREFIX && long.starts_with(short)
}

/// Score `content` against `query`.
///
/// A blank query matches everything with 1.0. A query made only of
/// stopwords matches nothing.
pub fn keyword_score(query: &str, content: &str) -> f32 {
    if query.trim().is_empty() {
        return 1.0;
    }
    let query_terms = terms(query);
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_terms = terms(content);
    let matched = query_terms
        .iter()
        .filter(|q| content_terms.iter().any(|c| terms_match(q, c)))
        .count();
    matched as f32 / query_terms.len() as f32
}
