//! Text splitting and counting helpers shared by the duration estimator and the
//! subtitle tracker.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?…]+["'”’)\]]*(?:\s|$)"#).unwrap());
static RE_CLAUSE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;:](?:\s|$)|[—–]").unwrap());

/// Punctuation-based sentence splitter.
///
/// A terminator only closes a sentence when it is followed by whitespace or the
/// end of the text, so decimals such as `3.14` and dotted tokens stay intact.
/// Runs like `?!` or `...` and trailing closing quotes stay attached to the
/// sentence they end. Returned sentences are trimmed and never blank.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if !is_sentence_terminator(ch) {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if is_sentence_terminator(next) || is_closing_mark(next) {
                current.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek().is_none_or(|next| next.is_whitespace()) {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }

    push_sentence(&mut sentences, &current);
    sentences
}

/// Words that will actually be voiced: whitespace-separated tokens carrying at
/// least one letter or digit.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Letters and digits after compatibility normalization, so ligatures and
/// full-width forms count the way they are pronounced.
pub fn spoken_char_count(text: &str) -> usize {
    text.nfkc().filter(|ch| ch.is_alphanumeric()).count()
}

pub fn count_sentence_breaks(text: &str) -> usize {
    RE_SENTENCE_BREAK.find_iter(text).count()
}

pub fn count_clause_breaks(text: &str) -> usize {
    RE_CLAUSE_BREAK.find_iter(text).count()
}

fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…')
}

fn is_closing_mark(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '”' | '’' | ')' | ']')
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}
