//! Text normalization for tag matching.
//!
//! - Lowercase conversion
//! - Expansion of contractions
//! - Punctuation removal (hyphens inside words survive)
//! - Whitespace collapsing
//!
//! `normalize(normalize(x)) == normalize(x)` for every input.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

const CONTRACTION_TABLE: &[(&str, &str)] = &[
    ("can't", "cannot"),
    ("won't", "will not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("didn't", "did not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("wasn't", "was not"),
    ("haven't", "have not"),
    ("hasn't", "has not"),
    ("shouldn't", "should not"),
    ("couldn't", "could not"),
    ("you're", "you are"),
    ("we're", "we are"),
    ("they're", "they are"),
    ("it's", "it is"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("we've", "we have"),
    ("we'll", "we will"),
    ("let's", "let us"),
];

lazy_static! {
    static ref CONTRACTIONS: HashMap<&'static str, &'static str> = CONTRACTION_TABLE.iter().copied().collect();

    static ref CONTRACTION: Regex = Regex::new(r"\b[a-z]+'[a-z]+\b").unwrap();
}

/// Normalize text for keyword matching
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");

    let expanded = CONTRACTION.replace_all(&lowered, |caps: &regex::Captures| {
        let word = &caps[0];
        CONTRACTIONS.get(word).map(|s| s.to_string()).unwrap_or_else(|| word.to_string())
    });

    let chars: Vec<char> = expanded.chars().collect();
    let mut cleaned = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c.is_whitespace() {
            cleaned.push(c);
        } else if c == '-'
            && i > 0
            && chars[i - 1].is_alphanumeric()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric())
        {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
