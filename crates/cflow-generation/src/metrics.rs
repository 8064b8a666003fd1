//! Content quality metrics and the rolling quality aggregator
//!
//! All scores land in [0, 1]:
//! - readability: sentence length, plus credit for headings on long text
//! - quality: `0.4·structure + 0.4·length + 0.2·(1 − duplication)`
//! - engagement: base 0.2, plus quotes, concrete metrics and a call to action

use cflow_core::{QualityMetrics, TemplateType};
use cflow_template::leftover_placeholders;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"(?m)^\s*#{1,6}\s+\S|(?i)<h[1-6]\b").unwrap();
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]+(?:\s+|$)").unwrap();
    static ref QUOTE: Regex = Regex::new(r#"(?m)^\s*>\s*\S|"[^"\n]{12,}"|“[^”\n]{12,}”"#).unwrap();
    static ref METRIC: Regex = Regex::new(
        r"(?i)\d+(\.\d+)?\s?%|\b\d+(\.\d+)?x\b|\$\s?\d|\b\d+\s+(minutes|hours|days|weeks|months)\b"
    )
    .unwrap();
    static ref CALL_TO_ACTION: Regex = Regex::new(
        r"(?i)\b(get started|sign up|book a demo|request a demo|contact us|learn more|try it|download|register|upgrade|join us|reply to this)\b"
    )
    .unwrap();
    static ref EMPTY_ITEM: Regex = Regex::new(r"(?m)^\s*[-*+]\s*$").unwrap();
}

/// Sentence length at which readability starts to drop
const COMFORTABLE_SENTENCE_WORDS: f64 = 15.0;
/// Extra words past comfortable at which readability reaches zero
const SENTENCE_WORDS_SPAN: f64 = 25.0;

pub fn compute_metrics(body: &str, content_type: TemplateType) -> QualityMetrics {
    QualityMetrics {
        quality_score: quality(body, content_type),
        readability_score: readability(body),
        engagement_prediction: engagement(body),
    }
}

pub fn readability(body: &str) -> f64 {
    let sentences = sentence_lengths(body);
    if sentences.is_empty() {
        return 0.0;
    }
    let average = sentences.iter().sum::<usize>() as f64 / sentences.len() as f64;
    let sentence_score =
        (1.0 - (average - COMFORTABLE_SENTENCE_WORDS).max(0.0) / SENTENCE_WORDS_SPAN).clamp(0.0, 1.0);

    let words = cflow_core::word_count(body);
    let heading_score = if HEADING.is_match(body) || words < 150 { 1.0 } else { 0.6 };

    0.8 * sentence_score + 0.2 * heading_score
}

pub fn quality(body: &str, content_type: TemplateType) -> f64 {
    0.4 * structure_score(body, content_type) + 0.4 * length_score(body, content_type) + 0.2 * (1.0 - duplication(body))
}

pub fn engagement(body: &str) -> f64 {
    let mut score = 0.2;
    if QUOTE.is_match(body) {
        score += 0.25;
    }
    if METRIC.is_match(body) {
        score += 0.25;
    }
    if CALL_TO_ACTION.is_match(body) {
        score += 0.3;
    }
    f64::min(score, 1.0)
}

fn sentence_lengths(body: &str) -> Vec<usize> {
    body.lines()
        .map(|l| l.trim().trim_start_matches(['#', '>', '-', '*']).trim())
        .filter(|l| !l.is_empty())
        .flat_map(|line| {
            let mut lengths = Vec::new();
            let mut start = 0;
            for m in SENTENCE_END.find_iter(line) {
                lengths.push(cflow_core::word_count(&line[start..m.end()]));
                start = m.end();
            }
            if start < line.len() {
                lengths.push(cflow_core::word_count(&line[start..]));
            }
            lengths
        })
        .filter(|&n| n > 0)
        .collect()
}

/// Fraction of satisfied structural checks
fn structure_score(body: &str, content_type: TemplateType) -> f64 {
    let blocks = body.split("\n\n").filter(|b| !b.trim().is_empty()).count();
    let checks = [
        HEADING.is_match(body) || matches!(content_type, TemplateType::EmailCampaign | TemplateType::SocialPost),
        blocks >= 2 || content_type == TemplateType::SocialPost,
        leftover_placeholders(body) == 0,
        !EMPTY_ITEM.is_match(body),
    ];
    checks.iter().filter(|ok| **ok).count() as f64 / checks.len() as f64
}

/// 1 inside the type's word range, proportionally less outside it
fn length_score(body: &str, content_type: TemplateType) -> f64 {
    let words = cflow_core::word_count(body) as f64;
    let (min, max) = content_type.word_range();
    let (min, max) = (min as f64, max as f64);
    if words < min {
        words / min
    } else if words > max {
        max / words
    } else {
        1.0
    }
}

/// Share of non-empty lines that repeat an earlier line
pub fn duplication(body: &str) -> f64 {
    let lines: Vec<String> = body
        .lines()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return 0.0;
    }
    let mut seen = HashSet::new();
    let repeats = lines.iter().filter(|l| !seen.insert(l.as_str())).count();
    repeats as f64 / lines.len() as f64
}

// ============================================================================
// AGGREGATOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTrend {
    Improving,
    Stable,
    Declining,
}

impl QualityTrend {
    /// Gauge encoding: 1, 0, -1
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Improving => 1.0,
            Self::Stable => 0.0,
            Self::Declining => -1.0,
        }
    }
}

/// Rolling window over recent quality scores
#[derive(Debug)]
pub struct MetricsAggregator {
    window: usize,
    trend_delta: f64,
    scores: Mutex<VecDeque<f64>>,
}

impl MetricsAggregator {
    pub fn new(window: usize, trend_delta: f64) -> Self {
        Self {
            window: window.max(2),
            trend_delta,
            scores: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, score: f64) {
        let mut scores = self.scores.lock().unwrap_or_else(|e| e.into_inner());
        if scores.len() == self.window {
            scores.pop_front();
        }
        scores.push_back(score.clamp(0.0, 1.0));
    }

    pub fn len(&self) -> usize {
        self.scores.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn average(&self) -> Option<f64> {
        let scores = self.scores.lock().unwrap_or_else(|e| e.into_inner());
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Newer half against older half; fewer than four samples is stable
    pub fn trend(&self) -> QualityTrend {
        let scores = self.scores.lock().unwrap_or_else(|e| e.into_inner());
        if scores.len() < 4 {
            return QualityTrend::Stable;
        }
        let half = scores.len() / 2;
        let older = scores.iter().take(half).sum::<f64>() / half as f64;
        let newer = scores.iter().skip(scores.len() - half).sum::<f64>() / half as f64;
        if newer - older > self.trend_delta {
            QualityTrend::Improving
        } else if older - newer > self.trend_delta {
            QualityTrend::Declining
        } else {
            QualityTrend::Stable
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(50, 0.05)
    }
}
