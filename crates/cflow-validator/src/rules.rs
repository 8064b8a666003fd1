//! The fixed rule battery.
//!
//! Seven rules, each a pure function from [`RuleContext`] to issues. The
//! dispatch table [`RULES`] is the only place weights and criticality live.

use cflow_classifier::TagDetection;
use cflow_core::TemplateType;
use cflow_template::{leftover_placeholders, TemplateAnalysis};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::ValidationProfile;
use crate::target::{TargetKind, ValidationTarget};
use crate::text;

// ============================================================================
// RULE TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    ContentStructure,
    GrammarSpelling,
    FactAccuracy,
    BrandConsistency,
    Accessibility,
    SeoOptimization,
    LegalCompliance,
}

impl RuleId {
    pub const ALL: [RuleId; 7] = [
        RuleId::ContentStructure,
        RuleId::GrammarSpelling,
        RuleId::FactAccuracy,
        RuleId::BrandConsistency,
        RuleId::Accessibility,
        RuleId::SeoOptimization,
        RuleId::LegalCompliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentStructure => "content_structure",
            Self::GrammarSpelling => "grammar_spelling",
            Self::FactAccuracy => "fact_accuracy",
            Self::BrandConsistency => "brand_consistency",
            Self::Accessibility => "accessibility",
            Self::SeoOptimization => "seo_optimization",
            Self::LegalCompliance => "legal_compliance",
        }
    }

    pub fn spec(&self) -> &'static RuleSpec {
        // RULES is ordered like RuleId::ALL
        &RULES[*self as usize]
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type RuleCheck = fn(&RuleContext<'_>) -> Vec<Issue>;

pub struct RuleSpec {
    pub id: RuleId,
    pub weight: f64,
    pub critical: bool,
    pub check: RuleCheck,
}

pub static RULES: [RuleSpec; 7] = [
    RuleSpec { id: RuleId::ContentStructure, weight: 0.15, critical: false, check: content_structure },
    RuleSpec { id: RuleId::GrammarSpelling, weight: 0.20, critical: true, check: grammar_spelling },
    RuleSpec { id: RuleId::FactAccuracy, weight: 0.25, critical: true, check: fact_accuracy },
    RuleSpec { id: RuleId::BrandConsistency, weight: 0.15, critical: true, check: brand_consistency },
    RuleSpec { id: RuleId::Accessibility, weight: 0.10, critical: false, check: accessibility },
    RuleSpec { id: RuleId::SeoOptimization, weight: 0.10, critical: false, check: seo_optimization },
    RuleSpec { id: RuleId::LegalCompliance, weight: 0.05, critical: true, check: legal_compliance },
];

// ============================================================================
// ISSUES AND FIXES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Deterministic remedy for a fixable issue. Variant order is the order
/// fixes get applied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "fix", rename_all = "snake_case")]
pub enum FixKind {
    FixMisspelling { from: String, to: String },
    NormalizeBrand { variant: String, canonical: String },
    RemoveRepeatedWord,
    ReduceExclamations { keep: usize },
    AddAltText,
    CapitalizeSentenceStart,
    CollapseDoubleSpaces,
    TrimTrailingWhitespace,
    AddHeading { text: String },
    InsertDisclaimer,
    InsertUnsubscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixKind>,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
            fix: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
            fix: None,
        }
    }

    pub fn fixable(mut self, fix: FixKind) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

/// Read-only inputs every rule sees
pub struct RuleContext<'a> {
    pub target: &'a ValidationTarget,
    pub analysis: &'a TemplateAnalysis,
    /// Text for prose checks: rendered body, or the template with tags
    /// replaced by a placeholder word
    pub prose: &'a str,
    pub tags: &'a TagDetection,
    pub profile: &'a ValidationProfile,
}

impl RuleContext<'_> {
    fn is_template(&self) -> bool {
        self.target.kind == TargetKind::Template
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

/// Names no template may use: they collide with record metadata or are
/// script-injection vectors
pub const RESERVED_VARIABLES: [&str; 9] = [
    "id",
    "created_at",
    "updated_at",
    "script",
    "function",
    "eval",
    "constructor",
    "prototype",
    "__proto__",
];

pub const SECRET_MARKERS: [&str; 6] = ["password", "api_key", "apikey", "secret", "token", "private_key"];

lazy_static! {
    static ref STATISTIC: Regex = Regex::new(r"\d+(\.\d+)?\s?%|\b\d+(\.\d+)?x\b|\$\s?\d").unwrap();
    static ref CITATION: Regex =
        Regex::new(r"(?i)\b(according to|sources?|reported|survey|study|measured|cited)\b|\[\d+\]").unwrap();
    static ref SUPERLATIVE: Regex = Regex::new(
        r"(?i)\b(best-in-class|world's best|fastest|number one|industry-leading|unmatched|unrivaled|revolutionary)\b|#1\b"
    )
    .unwrap();
    static ref MD_IMAGE_NO_ALT: Regex = Regex::new(r"!\[\s*\]\(").unwrap();
    static ref HTML_IMG: Regex = Regex::new(r"(?i)<img\b[^>]*>").unwrap();
    static ref VAGUE_LINK: Regex = Regex::new(r"(?i)\b(click here|read more|this link)\b").unwrap();
    static ref SCRIPT_TAG: Regex = Regex::new(r"(?i)<script").unwrap();
    static ref JS_URL: Regex = Regex::new(r"(?i)javascript:").unwrap();
    static ref EVENT_HANDLER: Regex = Regex::new(r#"(?i)\bon[a-z]+\s*=\s*["']"#).unwrap();
    static ref GUARANTEE: Regex = Regex::new(r"(?i)\b(guarantee[sd]?|risk-free|100% secure)\b").unwrap();
    static ref EMAIL_ADDRESS: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE: Regex = Regex::new(r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b").unwrap();
    static ref SSN: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
    static ref SHOUTING: Regex = Regex::new(r"\b[A-Z]{2,}\b").unwrap();
}

/// Markdown images lacking alt text (`![](…)` or `<img>` without `alt=`)
pub fn images_missing_alt(text: &str) -> usize {
    MD_IMAGE_NO_ALT.find_iter(text).count()
        + HTML_IMG
            .find_iter(text)
            .filter(|m| !m.as_str().to_lowercase().contains("alt="))
            .count()
}

/// Exclamation marks that are punctuation, not markdown image openers
pub fn exclamation_count(text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|(i, &c)| c == '!' && chars.get(i + 1) != Some(&'['))
        .count()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(needle)))
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

fn contains_phrase_ci(haystack: &str, needle: &str) -> bool {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(needle)))
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Long-form types open with a title heading
pub fn wants_heading(content_type: TemplateType) -> bool {
    !matches!(content_type, TemplateType::EmailCampaign | TemplateType::SocialPost)
}

// ============================================================================
// RULES
// ============================================================================

fn content_structure(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues: Vec<Issue> = ctx
        .analysis
        .errors
        .iter()
        .map(|e| Issue::error(format!("syntax: {}", e)))
        .collect();

    if ctx.is_template() {
        for var in &ctx.analysis.variables {
            if !ctx.target.variables.contains_key(var) {
                issues.push(Issue::error(format!("variable `{}` is used but not declared", var)));
            }
        }
        for var in ctx.target.variables.keys() {
            if !ctx.analysis.variables.contains(var) {
                issues.push(Issue::warning(format!("variable `{}` is declared but never used", var)));
            }
        }
    }

    let mut reserved: Vec<&str> = ctx
        .target
        .variables
        .keys()
        .chain(ctx.analysis.variables.iter())
        .map(String::as_str)
        .filter(|v| RESERVED_VARIABLES.contains(v))
        .collect();
    reserved.sort_unstable();
    reserved.dedup();
    for var in reserved {
        issues.push(Issue::error(format!("variable name `{}` is reserved", var)));
    }

    let complexity = crate::validator::complexity_score(ctx.analysis);
    if complexity > ctx.profile.complexity_warning {
        issues.push(Issue::warning(format!(
            "template complexity {:.1} exceeds {:.1}",
            complexity, ctx.profile.complexity_warning
        )));
    }

    if ctx.target.kind == TargetKind::Content {
        let leftovers = leftover_placeholders(&ctx.target.content);
        if leftovers > 0 {
            issues.push(Issue::error(format!("{} unrendered placeholder(s) left in content", leftovers)));
        }
    }

    if wants_heading(ctx.target.content_type) {
        let first_line = ctx.prose.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        if !text::is_heading(first_line) {
            let title = ctx
                .target
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| ctx.target.content_type.label().to_string());
            issues.push(
                Issue::warning("content does not open with a title heading")
                    .fixable(FixKind::AddHeading { text: title }),
            );
        }
    }

    issues
}

fn grammar_spelling(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();
    let lines: Vec<&str> = ctx.prose.lines().collect();

    let double_spaced = lines
        .iter()
        .filter(|l| l.trim_start().contains("  ") && !l.trim().starts_with('|'))
        .count();
    if double_spaced > 0 {
        issues.push(
            Issue::warning(format!("{} line(s) contain double spaces", double_spaced))
                .fixable(FixKind::CollapseDoubleSpaces),
        );
    }

    let trailing = lines.iter().filter(|l| l.ends_with(' ') || l.ends_with('\t')).count();
    if trailing > 0 {
        issues.push(
            Issue::warning(format!("{} line(s) have trailing whitespace", trailing))
                .fixable(FixKind::TrimTrailingWhitespace),
        );
    }

    for line in &lines {
        for word in text::repeated_words(line) {
            issues.push(Issue::error(format!("repeated word \"{} {}\"", word, word)).fixable(FixKind::RemoveRepeatedWord));
        }
    }

    let lowercase_starts = lines
        .iter()
        .filter(|l| text::is_paragraph_line(l))
        .flat_map(|l| {
            text::sentence_starts(l)
                .into_iter()
                .filter_map(move |i| l[i..].chars().next())
        })
        .filter(|c| c.is_ascii_lowercase())
        .count();
    if lowercase_starts > 0 {
        issues.push(
            Issue::warning(format!("{} sentence(s) start in lower case", lowercase_starts))
                .fixable(FixKind::CapitalizeSentenceStart),
        );
    }

    let mut seen = std::collections::BTreeSet::new();
    for word in ctx.prose.split_whitespace() {
        let bare = text::bare_word(word);
        if let Some(fix) = ctx.profile.misspellings.get(&bare) {
            if seen.insert(bare.clone()) {
                issues.push(
                    Issue::error(format!("misspelling \"{}\" (should be \"{}\")", bare, fix)).fixable(
                        FixKind::FixMisspelling {
                            from: bare.clone(),
                            to: fix.clone(),
                        },
                    ),
                );
            }
        }
    }

    issues
}

fn fact_accuracy(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();
    let sentences = text::sentences(ctx.prose);

    for sentence in &sentences {
        if STATISTIC.is_match(sentence) && !CITATION.is_match(sentence) {
            issues.push(Issue::error(format!("uncited statistic: \"{}\"", truncate(sentence, 80))));
        }
    }

    for m in SUPERLATIVE.find_iter(ctx.prose) {
        issues.push(Issue::warning(format!("unsupported superlative \"{}\"", m.as_str())));
    }

    if ctx.tags.has_tag("high_impact") && !CITATION.is_match(ctx.prose) {
        issues.push(Issue::warning("impact claims without any attributed source"));
    }

    issues
}

fn brand_consistency(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();

    for term in &ctx.profile.brand_terms {
        for variant in &term.variants {
            if variant != &term.canonical && contains_word(ctx.prose, variant) {
                issues.push(
                    Issue::error(format!("brand written as \"{}\" instead of \"{}\"", variant, term.canonical))
                        .fixable(FixKind::NormalizeBrand {
                            variant: variant.clone(),
                            canonical: term.canonical.clone(),
                        }),
                );
            }
        }
    }

    if ctx.tags.has_tag("negative_sentiment") {
        issues.push(Issue::warning("negative sentiment in published content"));
    }

    if ctx.target.content_type != TemplateType::BattleCard {
        for name in &ctx.profile.competitor_names {
            if contains_phrase_ci(ctx.prose, name) {
                issues.push(Issue::error(format!(
                    "competitor \"{}\" named in {} content",
                    name, ctx.target.content_type
                )));
            }
        }
        if ctx.tags.has_tag("competitor_mention") {
            issues.push(Issue::warning("competitive framing outside a battle card"));
        }
    }

    let exclamations = exclamation_count(ctx.prose);
    if exclamations > ctx.profile.max_exclamations {
        issues.push(
            Issue::warning(format!(
                "{} exclamation marks (at most {})",
                exclamations, ctx.profile.max_exclamations
            ))
            .fixable(FixKind::ReduceExclamations {
                keep: ctx.profile.max_exclamations,
            }),
        );
    }

    let shouting: Vec<&str> = SHOUTING
        .find_iter(ctx.prose)
        .map(|m| m.as_str())
        .filter(|w| w.len() >= ctx.profile.shouting_min_len)
        .filter(|w| !ctx.profile.allowed_acronyms.iter().any(|a| a == w))
        .collect();
    if !shouting.is_empty() {
        issues.push(Issue::warning(format!("all-caps words: {}", shouting.join(", "))));
    }

    for phrase in &ctx.profile.forbidden_phrases {
        if contains_phrase_ci(ctx.prose, phrase) {
            issues.push(Issue::error(format!("forbidden phrase \"{}\"", phrase)));
        }
    }

    issues
}

fn accessibility(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();

    let missing_alt = images_missing_alt(&ctx.target.content);
    if missing_alt > 0 {
        issues.push(
            Issue::warning(format!("{} image(s) without alt text", missing_alt)).fixable(FixKind::AddAltText),
        );
    }

    for m in VAGUE_LINK.find_iter(ctx.prose) {
        issues.push(Issue::warning(format!("non-descriptive link text \"{}\"", m.as_str())));
    }

    let headings = text::headings(ctx.prose);
    for pair in headings.windows(2) {
        if pair[1].level > pair[0].level + 1 {
            issues.push(Issue::warning(format!(
                "heading level jumps from {} to {} at \"{}\"",
                pair[0].level, pair[1].level, pair[1].text
            )));
        }
    }

    for sentence in text::sentences(ctx.prose) {
        let words = text::word_count(&sentence);
        if words > ctx.profile.max_sentence_words {
            issues.push(Issue::warning(format!(
                "sentence of {} words: \"{}\"",
                words,
                truncate(&sentence, 60)
            )));
        }
    }

    issues
}

fn seo_optimization(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();
    if ctx.is_template() {
        return issues;
    }

    match ctx.target.title.as_deref().map(str::trim) {
        None | Some("") => issues.push(Issue::warning("content has no title")),
        Some(title) if title.chars().count() > ctx.profile.max_title_chars => issues.push(Issue::warning(
            format!("title is {} characters (max {})", title.chars().count(), ctx.profile.max_title_chars),
        )),
        _ => {}
    }

    let words = text::word_count(ctx.prose);
    let (min, max) = ctx.target.content_type.word_range();
    if words < min {
        issues.push(Issue::warning(format!(
            "{} words, below the {} minimum of {}",
            words, ctx.target.content_type, min
        )));
    } else if words > max {
        issues.push(Issue::warning(format!(
            "{} words, above the {} maximum of {}",
            words, ctx.target.content_type, max
        )));
    }

    if words >= 100 {
        let mut counts = std::collections::BTreeMap::new();
        for word in ctx.prose.split_whitespace().map(text::bare_word) {
            if word.chars().count() >= 4 && !STOPWORDS.contains(&word.as_str()) {
                *counts.entry(word).or_insert(0usize) += 1;
            }
        }
        for (word, count) in counts {
            let density = count as f64 / words as f64;
            if density > ctx.profile.keyword_density_limit {
                issues.push(Issue::warning(format!(
                    "keyword \"{}\" makes up {:.0}% of the text",
                    word,
                    density * 100.0
                )));
            }
        }
    }

    if words >= ctx.profile.subheading_min_words && !text::headings(ctx.prose).iter().any(|h| h.level >= 2) {
        issues.push(Issue::warning("long content without subheadings"));
    }

    issues
}

const STOPWORDS: [&str; 24] = [
    "that", "this", "with", "from", "have", "your", "will", "they", "their", "about", "more", "into",
    "what", "when", "were", "been", "than", "then", "them", "also", "which", "each", "over", "after",
];

fn legal_compliance(ctx: &RuleContext<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();
    let raw = &ctx.target.content;

    if SCRIPT_TAG.is_match(raw) {
        issues.push(Issue::error("embedded <script> tag"));
    }
    if JS_URL.is_match(raw) {
        issues.push(Issue::error("javascript: URL"));
    }
    if EVENT_HANDLER.is_match(raw) {
        issues.push(Issue::error("inline event handler attribute"));
    }

    let mut names: Vec<&String> = ctx.target.variables.keys().chain(ctx.analysis.variables.iter()).collect();
    names.sort_unstable();
    names.dedup();
    for name in names {
        let lowered = name.to_lowercase();
        if SECRET_MARKERS.iter().any(|m| lowered.contains(m)) {
            issues.push(Issue::error(format!("variable `{}` looks like a secret", name)));
        }
    }

    let lowered = ctx.prose.to_lowercase();
    if ctx.target.content_type == TemplateType::PressRelease && !lowered.contains("forward-looking statements") {
        issues.push(Issue::error("press release lacks a forward-looking statements disclaimer").fixable(FixKind::InsertDisclaimer));
    }
    if ctx.target.content_type == TemplateType::EmailCampaign && !lowered.contains("unsubscribe") {
        issues.push(Issue::error("email lacks an unsubscribe notice").fixable(FixKind::InsertUnsubscribe));
    }

    for m in GUARANTEE.find_iter(ctx.prose) {
        issues.push(Issue::warning(format!("promissory language \"{}\"", m.as_str())));
    }

    if SSN.is_match(ctx.prose) {
        issues.push(Issue::error("content contains what looks like a social security number"));
    }
    let contacts = EMAIL_ADDRESS.find_iter(ctx.prose).count() + PHONE.find_iter(ctx.prose).count();
    if contacts > 0 {
        issues.push(Issue::warning(format!("{} personal contact detail(s) in content", contacts)));
    }

    issues
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}
