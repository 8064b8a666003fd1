//! Static analysis of the template micro-language.
//!
//! Supported tags:
//! - `{{name}}`, `{{customer.name}}`, `{{{raw}}}`
//! - `{{#if cond}}…{{else}}…{{/if}}` and `{{#unless cond}}…{{/unless}}`
//! - `{{#each list}}…{{this}}…{{/each}}`
//! - `{{! comment }}`
//! - helper calls: `{{join items ", "}}`, `{{default name "there"}}`,
//!   `{{percent score}}`
//!
//! Inside an `each` body bare names refer to fields of the current item and
//! are not reported as template variables. `../name` climbs one scope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Block helpers the renderer understands
pub const BLOCK_HELPERS: [&str; 3] = ["if", "unless", "each"];

/// Inline helpers registered on the renderer
pub const INLINE_HELPERS: [&str; 3] = ["join", "default", "percent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntaxErrorKind {
    UnclosedBlock,
    MismatchedClose,
    UnexpectedClose,
    MisplacedElse,
    MalformedTripleBrace,
    UnterminatedTag,
    EmptyExpression,
    UnsupportedBlock,
    UnsupportedPartial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// Byte offset of the offending tag
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

/// Everything the validator and generator need to know about a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateAnalysis {
    pub errors: Vec<SyntaxError>,
    /// Root-scope variable names, sorted
    pub variables: BTreeSet<String>,
    pub max_depth: usize,
    pub conditionals: usize,
    pub loops: usize,
}

impl TemplateAnalysis {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// TOKENIZER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Tag {
        inner: &'a str,
        offset: usize,
        triple: bool,
    },
    Broken {
        kind: SyntaxErrorKind,
        offset: usize,
        raw: &'a str,
    },
}

fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(rel) = src[pos..].find("{{") {
        let open = pos + rel;
        if open > pos {
            tokens.push(Token::Text(&src[pos..open]));
        }

        let triple = src[open..].starts_with("{{{");
        let body_start = open + if triple { 3 } else { 2 };

        let Some(close_rel) = src[body_start..].find("}}") else {
            tokens.push(Token::Broken {
                kind: SyntaxErrorKind::UnterminatedTag,
                offset: open,
                raw: &src[open..],
            });
            return tokens;
        };
        let close = body_start + close_rel;

        // A nested opener before the closer means the first tag never ended
        if let Some(nested) = src[body_start..close].find("{{") {
            let next = body_start + nested;
            tokens.push(Token::Broken {
                kind: SyntaxErrorKind::UnterminatedTag,
                offset: open,
                raw: &src[open..next],
            });
            pos = next;
            continue;
        }

        if triple {
            if src[close..].starts_with("}}}") {
                tokens.push(Token::Tag {
                    inner: &src[body_start..close],
                    offset: open,
                    triple: true,
                });
                pos = close + 3;
            } else {
                tokens.push(Token::Broken {
                    kind: SyntaxErrorKind::MalformedTripleBrace,
                    offset: open,
                    raw: &src[open..close + 2],
                });
                pos = close + 2;
            }
        } else {
            let mut end = close + 2;
            let kind = if src[end..].starts_with('}') {
                end += 1;
                Some(SyntaxErrorKind::MalformedTripleBrace)
            } else {
                None
            };
            match kind {
                Some(kind) => tokens.push(Token::Broken {
                    kind,
                    offset: open,
                    raw: &src[open..end],
                }),
                None => tokens.push(Token::Tag {
                    inner: &src[body_start..close],
                    offset: open,
                    triple: false,
                }),
            }
            pos = end;
        }
    }

    if pos < src.len() {
        tokens.push(Token::Text(&src[pos..]));
    }
    tokens
}

// ============================================================================
// ANALYSIS
// ============================================================================

struct OpenBlock<'a> {
    helper: &'a str,
    offset: usize,
}

/// Scan a template and report syntax errors, variables and shape.
pub fn analyze(src: &str) -> TemplateAnalysis {
    let mut analysis = TemplateAnalysis::default();
    let mut stack: Vec<OpenBlock<'_>> = Vec::new();
    let mut each_depth = 0usize;

    for token in tokenize(src) {
        let (inner, offset, triple) = match token {
            Token::Text(_) => continue,
            Token::Broken { kind, offset, raw } => {
                let message = match kind {
                    SyntaxErrorKind::MalformedTripleBrace => {
                        format!("malformed triple-brace tag `{}`", raw)
                    }
                    _ => format!("unterminated tag `{}`", raw.chars().take(24).collect::<String>()),
                };
                analysis.errors.push(SyntaxError { kind, offset, message });
                continue;
            }
            Token::Tag { inner, offset, triple } => (inner.trim(), offset, triple),
        };

        if inner.is_empty() {
            analysis.errors.push(SyntaxError {
                kind: SyntaxErrorKind::EmptyExpression,
                offset,
                message: "empty expression".into(),
            });
            continue;
        }

        if triple {
            collect_expression(inner, each_depth, &mut analysis.variables);
            continue;
        }

        if inner.starts_with('!') {
            continue;
        }

        if let Some(rest) = inner.strip_prefix('#') {
            let mut parts = rest.split_whitespace();
            let helper = parts.next().unwrap_or("");
            let arg = parts.next();

            if !BLOCK_HELPERS.contains(&helper) {
                analysis.errors.push(SyntaxError {
                    kind: SyntaxErrorKind::UnsupportedBlock,
                    offset,
                    message: format!("unsupported block helper `#{}`", helper),
                });
            } else if let Some(arg) = arg {
                collect_path(arg, each_depth, &mut analysis.variables);
            } else {
                analysis.errors.push(SyntaxError {
                    kind: SyntaxErrorKind::EmptyExpression,
                    offset,
                    message: format!("`#{}` needs an argument", helper),
                });
            }

            match helper {
                "if" | "unless" => analysis.conditionals += 1,
                "each" => {
                    analysis.loops += 1;
                    each_depth += 1;
                }
                _ => {}
            }
            stack.push(OpenBlock { helper, offset });
            analysis.max_depth = analysis.max_depth.max(stack.len());
            continue;
        }

        if let Some(rest) = inner.strip_prefix('/') {
            let helper = rest.trim();
            match stack.last() {
                Some(open) if open.helper == helper => {
                    if helper == "each" {
                        each_depth = each_depth.saturating_sub(1);
                    }
                    stack.pop();
                }
                Some(open) => {
                    analysis.errors.push(SyntaxError {
                        kind: SyntaxErrorKind::MismatchedClose,
                        offset,
                        message: format!(
                            "`{{{{/{}}}}}` closes `{{{{#{}}}}}` opened at byte {}",
                            helper, open.helper, open.offset
                        ),
                    });
                }
                None => {
                    analysis.errors.push(SyntaxError {
                        kind: SyntaxErrorKind::UnexpectedClose,
                        offset,
                        message: format!("`{{{{/{}}}}}` has no matching opener", helper),
                    });
                }
            }
            continue;
        }

        if inner == "else" || inner == "^" {
            if stack.is_empty() {
                analysis.errors.push(SyntaxError {
                    kind: SyntaxErrorKind::MisplacedElse,
                    offset,
                    message: "`{{else}}` outside of a block".into(),
                });
            }
            continue;
        }

        if inner.starts_with('>') {
            analysis.errors.push(SyntaxError {
                kind: SyntaxErrorKind::UnsupportedPartial,
                offset,
                message: "partials are not supported".into(),
            });
            continue;
        }

        collect_expression(inner, each_depth, &mut analysis.variables);
    }

    for open in stack {
        analysis.errors.push(SyntaxError {
            kind: SyntaxErrorKind::UnclosedBlock,
            offset: open.offset,
            message: format!("`{{{{#{}}}}}` is never closed", open.helper),
        });
    }

    analysis
}

/// A plain expression is either a path or a helper call with path arguments
fn collect_expression(inner: &str, each_depth: usize, vars: &mut BTreeSet<String>) {
    let mut words = inner.split_whitespace();
    let Some(head) = words.next() else {
        return;
    };
    if INLINE_HELPERS.contains(&head) {
        for word in words {
            collect_path(word, each_depth, vars);
        }
    } else {
        collect_path(head, each_depth, vars);
    }
}

fn collect_path(word: &str, each_depth: usize, vars: &mut BTreeSet<String>) {
    if is_literal(word) {
        return;
    }

    let mut path = word;
    let mut ups = 0usize;
    while let Some(rest) = path.strip_prefix("../") {
        ups += 1;
        path = rest;
    }
    if each_depth.saturating_sub(ups) > 0 {
        return;
    }

    let root = path.split('.').next().unwrap_or("");
    if root.is_empty() || root == "this" || root.starts_with('@') {
        return;
    }
    vars.insert(root.to_string());
}

fn is_literal(word: &str) -> bool {
    word.starts_with('"')
        || word.starts_with('\'')
        || word.parse::<f64>().is_ok()
        || matches!(word, "true" | "false" | "null")
}

/// Template text with variable tags replaced by a neutral placeholder word
/// and block tags removed. Broken tags are kept verbatim.
pub fn strip_tags(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for token in tokenize(src) {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Broken { raw, .. } => out.push_str(raw),
            Token::Tag { inner, .. } => {
                let inner = inner.trim();
                let is_block = inner.starts_with('#')
                    || inner.starts_with('/')
                    || inner.starts_with('!')
                    || inner == "else"
                    || inner == "^";
                if !is_block && !inner.is_empty() {
                    out.push_str("Value");
                }
            }
        }
    }
    out
}

/// Remaining `{{…}}` markers in supposedly rendered text
pub fn leftover_placeholders(text: &str) -> usize {
    tokenize(text)
        .iter()
        .filter(|t| !matches!(t, Token::Text(_)))
        .count()
}
