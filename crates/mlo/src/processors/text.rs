//! Text helpers shared by the rule-based processors

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "i", "in", "is", "it", "its", "me", "my", "not", "of", "on", "or", "our", "she",
    "so", "that", "the", "their", "them", "they", "this", "to", "was", "we", "were", "what",
    "when", "which", "who", "will", "with", "you", "your",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Split text into trimmed sentences, keeping terminal punctuation
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Lowercased alphanumeric words in order of appearance
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Unique non-stopword terms of at least `min_len` chars, first occurrence order
pub fn content_terms(text: &str, min_len: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= min_len && !is_stopword(w))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second? Third!  trailing bit");
        assert_eq!(
            sentences,
            vec!["First one.", "Second?", "Third!", "trailing bit"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_words_and_terms() {
        assert_eq!(words("Hello, World! it's"), vec!["hello", "world", "it's"]);
        assert_eq!(
            content_terms("The cat and the other cat sat", 3),
            vec!["cat", "other", "sat"]
        );
    }

    #[test]
    fn test_collapse_and_truncate() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
