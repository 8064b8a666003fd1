//! Markdown-aware text helpers shared by the rules and the fixers
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:[-*+]|\d+[.)]|>)\s+").unwrap();
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]+(?:\s+|$)").unwrap();
    static ref HEADING: Regex = Regex::new(r"^(#{1,6})\s+(.*)$").unwrap();
}

/// A markdown heading: level and text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

pub fn headings(text: &str) -> Vec<Heading> {
    text.lines()
        .filter_map(|line| HEADING.captures(line.trim_start()))
        .map(|caps| Heading {
            level: caps[1].len(),
            text: caps[2].trim().to_string(),
        })
        .collect()
}

pub fn is_heading(line: &str) -> bool {
    HEADING.is_match(line.trim_start())
}

/// Prose lines: not headings, list items, quotes, tables, code or markup
pub fn is_paragraph_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && !is_heading(trimmed)
        && !LIST_MARKER.is_match(line)
        && !trimmed.starts_with('|')
        && !trimmed.starts_with('`')
        && !trimmed.starts_with('<')
        && !trimmed.starts_with('!')
}

/// Line content with heading hashes and list/quote markers removed
pub fn line_body(line: &str) -> &str {
    let trimmed = line.trim();
    if let Some(caps) = HEADING.captures(trimmed) {
        if let Some(m) = caps.get(2) {
            return m.as_str().trim();
        }
    }
    match LIST_MARKER.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => trimmed,
    }
}

/// Sentences of every non-empty line. Lines never merge, so a list item is
/// its own sentence.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let body = line_body(line);
        if body.is_empty() {
            continue;
        }
        let mut start = 0;
        for m in SENTENCE_END.find_iter(body) {
            let sentence = body[start..m.end()].trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            start = m.end();
        }
        let rest = body[start..].trim();
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
    }
    out
}

/// Byte offsets where sentences begin in a paragraph line
pub fn sentence_starts(line: &str) -> Vec<usize> {
    let leading = line.len() - line.trim_start().len();
    let mut starts = vec![leading];
    // a match short of the line end always ends in whitespace
    starts.extend(
        SENTENCE_END
            .find_iter(line)
            .map(|m| m.end())
            .filter(|&end| end < line.len()),
    );
    starts
}

/// Lowercased word with surrounding punctuation trimmed
pub fn bare_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Consecutive duplicate words within one line ("the the")
pub fn repeated_words(line: &str) -> Vec<String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    words
        .windows(2)
        .filter(|pair| {
            let prev = pair[0];
            let first = bare_word(prev);
            !first.is_empty()
                && first.chars().any(char::is_alphabetic)
                && !prev.ends_with(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
                && first == bare_word(pair[1])
        })
        .map(|pair| bare_word(pair[0]))
        .collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings() {
        let found = headings("# Title\ntext\n### Deep\n#not a heading");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].level, 3);
        assert_eq!(found[1].text, "Deep");
    }

    #[test]
    fn test_sentences_split_per_line() {
        let found = sentences("# Head\nOne. Two? Three\n- item one\n- item two.");
        assert_eq!(found, vec!["Head", "One.", "Two?", "Three", "item one", "item two."]);
    }

    #[test]
    fn test_sentence_starts() {
        assert_eq!(sentence_starts("One. two"), vec![0, 5]);
        assert_eq!(sentence_starts("Version 2.5 ships"), vec![0]);
    }

    #[test]
    fn test_repeated_words() {
        assert_eq!(repeated_words("the the rollout"), vec!["the"]);
        assert!(repeated_words("It ends. Ends again").is_empty());
        assert!(repeated_words("- 2 2").is_empty());
    }

    #[test]
    fn test_paragraph_lines() {
        assert!(is_paragraph_line("Plain prose."));
        assert!(!is_paragraph_line("- list"));
        assert!(!is_paragraph_line("## Heading"));
        assert!(!is_paragraph_line("![img](x.png)"));
    }
}
