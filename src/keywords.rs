use regex::Regex;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Words shorter than this many characters are never search terms.
const MIN_KEYWORD_CHARS: usize = 4;

/// Pick search keywords from summary text.
///
/// Returns at most `max` purely alphabetic tokens longer than three
/// characters, in order of appearance. Punctuation splits tokens, so
/// `planet's` contributes `planet`, while a token holding digits such as
/// `covid19` is dropped whole. Duplicates are kept.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|w| w.chars().all(char::is_alphabetic))
        .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
        .take(max)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_long_alphabetic_words_in_order() {
        let keywords = extract_keywords(
            "Water conservation is essential for our planet's future.",
            10,
        );
        assert_eq!(
            keywords,
            vec!["Water", "conservation", "essential", "planet", "future"]
        );
    }

    #[test]
    fn caps_at_max_and_keeps_duplicates() {
        let text = "alpha bravo alpha delta echoes foxtrot golf hotel india juliet kilo lima";
        let keywords = extract_keywords(text, 10);
        assert_eq!(keywords.len(), 10);
        assert_eq!(keywords[0], "alpha");
        assert_eq!(keywords[2], "alpha");
        assert_eq!(keywords.last().map(String::as_str), Some("juliet"));
        assert!(!keywords.iter().any(|k| k == "kilo" || k == "lima"));
    }

    #[test]
    fn tokens_with_digits_are_dropped() {
        let keywords = extract_keywords("covid19 2024 abc123def snake_case tests", 10);
        assert_eq!(keywords, vec!["tests"]);
    }

    #[test]
    fn no_qualifying_words_yields_empty() {
        assert!(extract_keywords("a an the 1234 ... !!", 10).is_empty());
        assert!(extract_keywords("", 10).is_empty());
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(extract_keywords("café über naïve", 10), vec!["café", "über", "naïve"]);
        assert!(extract_keywords("été", 10).is_empty());
    }
}
