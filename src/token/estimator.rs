//! Deterministic, O(n) token estimation.
//!
//! Combines a character-count term, a word-count term, and a
//! punctuation/non-alphanumeric adjustment:
//! `max(chars/4, words*1.3) + 0.2*non_alphanumeric`, rounded up.

/// Estimate the number of tokens `text` would consume.
pub fn estimate(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let char_count = text.chars().count() as f64;
    let word_count = text.split_whitespace().count() as f64;
    let non_alphanumeric = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count() as f64;

    let char_term = char_count / 4.0;
    let word_term = word_count * 1.3;
    let adjustment = non_alphanumeric * 0.2;

    (char_term.max(word_term) + adjustment).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_tokens() {
        assert_eq!(estimate(""), 0);
    }

    #[test]
    fn estimate_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog.";
        assert_eq!(estimate(text), estimate(text));
    }

    #[test]
    fn punctuation_heavy_text_adds_to_the_char_term() {
        let plain = "hello world";
        let punctuated = "hello, world!! (really?)";
        assert!(estimate(punctuated) > estimate(plain));
    }

    #[test]
    fn word_term_dominates_for_long_words() {
        // Many short words -> word term can exceed char term for dense text.
        let text = "a b c d e f g h i j";
        let tokens = estimate(text);
        assert!(tokens > 0);
    }

    #[test]
    fn monotonic_in_length() {
        let short = "hi";
        let long = "hi ".repeat(100);
        assert!(estimate(&long) > estimate(short));
    }
}
