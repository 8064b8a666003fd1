//! Deterministic remedies for fixable issues
use lazy_static::lazy_static;
use regex::Regex;

use crate::rules::FixKind;
use crate::text;

pub const DISCLAIMER: &str = "Forward-looking statements: This release contains forward-looking statements \
that involve risks and uncertainties. Actual results may differ materially from those described.";

pub const UNSUBSCRIBE_NOTICE: &str = "You can unsubscribe from these emails at any time.";

const DEFAULT_ALT: &str = "Illustration";

lazy_static! {
    static ref MULTI_SPACE: Regex = Regex::new(r" {2,}").unwrap();
    static ref MD_IMAGE_NO_ALT: Regex = Regex::new(r"!\[\s*\]\(").unwrap();
    static ref HTML_IMG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
}

/// Apply fixes in their canonical order. Fixes that find nothing to change
/// leave the text untouched.
pub fn apply_fixes(body: &str, fixes: &[FixKind]) -> String {
    let mut ordered: Vec<&FixKind> = fixes.iter().collect();
    ordered.sort();
    ordered.dedup();

    ordered.into_iter().fold(body.to_string(), |text, fix| apply_fix(&text, fix))
}

pub fn apply_fix(body: &str, fix: &FixKind) -> String {
    match fix {
        FixKind::FixMisspelling { from, to } => replace_word_ci(body, from, to),
        FixKind::NormalizeBrand { variant, canonical } => replace_word(body, variant, canonical),
        FixKind::RemoveRepeatedWord => map_lines(body, remove_repeated_words),
        FixKind::ReduceExclamations { keep } => reduce_exclamations(body, *keep),
        FixKind::AddAltText => add_alt_text(body),
        FixKind::CapitalizeSentenceStart => map_lines(body, capitalize_sentences),
        FixKind::CollapseDoubleSpaces => map_lines(body, collapse_spaces),
        FixKind::TrimTrailingWhitespace => map_lines(body, |l| l.trim_end().to_string()),
        FixKind::AddHeading { text } => format!("# {}\n\n{}", text, body.trim_start()),
        FixKind::InsertDisclaimer => append_paragraph(body, DISCLAIMER),
        FixKind::InsertUnsubscribe => append_paragraph(body, UNSUBSCRIBE_NOTICE),
    }
}

fn map_lines(body: &str, f: impl Fn(&str) -> String) -> String {
    let mut out: Vec<String> = body.lines().map(f).collect();
    if body.ends_with('\n') {
        out.push(String::new());
    }
    out.join("\n")
}

fn append_paragraph(body: &str, paragraph: &str) -> String {
    format!("{}\n\n{}\n", body.trim_end(), paragraph)
}

fn replace_word(body: &str, from: &str, to: &str) -> String {
    match Regex::new(&format!(r"\b{}\b", regex::escape(from))) {
        Ok(re) => re.replace_all(body, to).into_owned(),
        Err(_) => body.to_string(),
    }
}

/// Case-insensitive replacement keeping a leading capital
fn replace_word_ci(body: &str, from: &str, to: &str) -> String {
    let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from))) else {
        return body.to_string();
    };
    re.replace_all(body, |caps: &regex::Captures| {
        let found = &caps[0];
        if found.starts_with(|c: char| c.is_uppercase()) {
            capitalize_first(to)
        } else {
            to.to_string()
        }
    })
    .into_owned()
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn remove_repeated_words(line: &str) -> String {
    if text::repeated_words(line).is_empty() {
        return line.to_string();
    }
    let indent = &line[..line.len() - line.trim_start().len()];
    let mut kept: Vec<&str> = Vec::new();
    for word in line.split_whitespace() {
        let repeat = kept.last().is_some_and(|prev| {
            let bare = text::bare_word(prev);
            !bare.is_empty()
                && bare.chars().any(char::is_alphabetic)
                && !prev.ends_with(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
                && bare == text::bare_word(word)
        });
        if !repeat {
            kept.push(word);
        }
    }
    format!("{}{}", indent, kept.join(" "))
}

fn capitalize_sentences(line: &str) -> String {
    if !text::is_paragraph_line(line) {
        return line.to_string();
    }
    let starts = text::sentence_starts(line);
    let mut out = String::with_capacity(line.len());
    for (i, c) in line.char_indices() {
        if starts.contains(&i) && c.is_ascii_lowercase() {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse_spaces(line: &str) -> String {
    if line.trim_start().starts_with('|') {
        return line.to_string();
    }
    let indent_len = line.len() - line.trim_start().len();
    let (indent, rest) = line.split_at(indent_len);
    format!("{}{}", indent, MULTI_SPACE.replace_all(rest, " "))
}

fn reduce_exclamations(body: &str, keep: usize) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut seen = 0;
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if c == '!' && chars.get(i + 1) != Some(&'[') {
                seen += 1;
                if seen > keep {
                    return '.';
                }
            }
            c
        })
        .collect()
}

fn add_alt_text(body: &str) -> String {
    let markdown = MD_IMAGE_NO_ALT.replace_all(body, format!("![{}](", DEFAULT_ALT).as_str());
    HTML_IMG
        .replace_all(&markdown, |caps: &regex::Captures| {
            let tag = &caps[0];
            if tag.to_lowercase().contains("alt=") {
                tag.to_string()
            } else {
                // "<img" is four bytes in any casing
                format!("{} alt=\"{}\"{}", &tag[..4], DEFAULT_ALT, &tag[4..])
            }
        })
        .into_owned()
}
