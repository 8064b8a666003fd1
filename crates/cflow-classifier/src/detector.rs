//! Tag detection: rule, pattern and AI passes merged by max confidence
use async_trait::async_trait;
use cflow_core::config;
use cflow_core::{AiProvider, CompletionOptions, HealthProbe, ProbeReport, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::normalizer::normalize;
use crate::taxonomy::{PatternBank, TAXONOMY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Rule,
    Pattern,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTag {
    pub tag: String,
    pub category: String,
    pub confidence: f64,
    pub source: TagSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDetection {
    pub detected_tags: Vec<DetectedTag>,
    pub categories: Vec<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
}

impl TagDetection {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.confidence_scores.contains_key(tag)
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.detected_tags.iter().map(|t| t.tag.as_str())
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub confidence_threshold: f64,
    /// Floor added to keyword hit density for any rule match, so a single
    /// keyword can clear the insight threshold. Set to zero for confidence
    /// equal to the density alone.
    pub rule_base_confidence: f64,
    pub urgency_weight: f64,
    pub impact_weight: f64,
    pub positive_weight: f64,
    pub negative_weight: f64,
    pub ai_timeout_ms: u64,
    pub ai_max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            rule_base_confidence: 0.4,
            urgency_weight: 0.3,
            impact_weight: 0.25,
            positive_weight: 0.2,
            negative_weight: 0.25,
            ai_timeout_ms: 5_000,
            ai_max_tokens: 300,
        }
    }
}

impl ClassifierConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }

    fn weight(&self, bank: PatternBank) -> f64 {
        match bank {
            PatternBank::Urgency => self.urgency_weight,
            PatternBank::Impact => self.impact_weight,
            PatternBank::PositiveSentiment => self.positive_weight,
            PatternBank::NegativeSentiment => self.negative_weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
    pub use_ai: bool,
    pub confidence_threshold: f64,
}

impl DetectOptions {
    pub fn local(confidence_threshold: f64) -> Self {
        Self {
            use_ai: false,
            confidence_threshold,
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct TagDetector {
    config: ClassifierConfig,
    ai: AiProvider,
    detections: AtomicU64,
    ai_failures: AtomicU64,
}

impl TagDetector {
    pub fn new(config: ClassifierConfig, ai: AiProvider) -> Self {
        Self {
            config,
            ai,
            detections: AtomicU64::new(0),
            ai_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn default_options(&self) -> DetectOptions {
        DetectOptions {
            use_ai: self.ai.is_available(),
            confidence_threshold: self.config.confidence_threshold,
        }
    }

    /// All three passes. The AI pass never fails the call.
    pub async fn detect_tags(&self, text: &str, options: &DetectOptions) -> TagDetection {
        let mut merged = BTreeMap::new();
        merge_into(&mut merged, self.rule_pass(text));
        merge_into(&mut merged, self.pattern_pass(text));

        if options.use_ai && self.ai.is_available() {
            match self.ai_pass(text).await {
                Ok(tags) => merge_into(&mut merged, tags),
                Err(reason) => {
                    self.ai_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(provider = self.ai.name(), %reason, "AI tag pass dropped");
                }
            }
        }

        self.detections.fetch_add(1, Ordering::Relaxed);
        finalize(merged, options.confidence_threshold)
    }

    /// Rule and pattern passes only
    pub fn detect_local(&self, text: &str, confidence_threshold: f64) -> TagDetection {
        let mut merged = BTreeMap::new();
        merge_into(&mut merged, self.rule_pass(text));
        merge_into(&mut merged, self.pattern_pass(text));
        self.detections.fetch_add(1, Ordering::Relaxed);
        finalize(merged, confidence_threshold)
    }

    fn rule_pass(&self, text: &str) -> Vec<DetectedTag> {
        let padded = format!(" {} ", normalize(text));
        TAXONOMY
            .iter()
            .filter_map(|entry| {
                let hits = entry
                    .keywords
                    .iter()
                    .filter(|kw| padded.contains(&format!(" {} ", kw)))
                    .count();
                (hits > 0).then(|| DetectedTag {
                    tag: entry.tag.to_string(),
                    category: entry.category.to_string(),
                    confidence: (self.config.rule_base_confidence
                        + hits as f64 / entry.keywords.len() as f64)
                        .min(1.0),
                    source: TagSource::Rule,
                })
            })
            .collect()
    }

    fn pattern_pass(&self, text: &str) -> Vec<DetectedTag> {
        let lowered = text.to_lowercase();
        PatternBank::ALL
            .iter()
            .filter_map(|bank| {
                let hits = bank.hits(&lowered);
                (hits > 0).then(|| DetectedTag {
                    tag: bank.tag().to_string(),
                    category: bank.category().to_string(),
                    confidence: (self.config.weight(*bank) * hits as f64).min(1.0),
                    source: TagSource::Pattern,
                })
            })
            .collect()
    }

    async fn ai_pass(&self, text: &str) -> std::result::Result<Vec<DetectedTag>, String> {
        let prompt = format!(
            "Classify the following business text. Reply with a JSON array of objects \
             with fields \"tag\", \"category\" and \"confidence\" (0-1). \
             Use snake_case tag names.\n\nText:\n{}",
            text
        );
        let options = CompletionOptions {
            max_tokens: self.config.ai_max_tokens,
            temperature: 0.0,
        };
        let reply = self
            .ai
            .complete_with_timeout(&prompt, &options, Duration::from_millis(self.config.ai_timeout_ms))
            .await
            .map_err(|e| e.to_string())?;
        parse_ai_tags(&reply)
    }
}

#[derive(Deserialize)]
struct AiTag {
    tag: String,
    #[serde(default)]
    category: Option<String>,
    confidence: f64,
}

/// Extract the JSON array from a completion, tolerating prose around it
pub fn parse_ai_tags(reply: &str) -> std::result::Result<Vec<DetectedTag>, String> {
    let start = reply.find('[').ok_or("no JSON array in reply")?;
    let end = reply.rfind(']').ok_or("no JSON array in reply")?;
    if end < start {
        return Err("no JSON array in reply".into());
    }

    let raw: Vec<AiTag> = serde_json::from_str(&reply[start..=end]).map_err(|e| e.to_string())?;
    Ok(raw
        .into_iter()
        .filter(|t| !t.tag.trim().is_empty() && t.confidence.is_finite())
        .map(|t| DetectedTag {
            tag: t.tag.trim().to_lowercase().replace(' ', "_"),
            category: t.category.unwrap_or_else(|| "ai".to_string()),
            confidence: t.confidence.clamp(0.0, 1.0),
            source: TagSource::Ai,
        })
        .collect())
}

/// Union by tag name; the higher confidence wins, earlier passes win ties
fn merge_into(merged: &mut BTreeMap<String, DetectedTag>, tags: Vec<DetectedTag>) {
    for tag in tags {
        match merged.get(&tag.tag) {
            Some(existing) if existing.confidence >= tag.confidence => {}
            _ => {
                merged.insert(tag.tag.clone(), tag);
            }
        }
    }
}

fn finalize(merged: BTreeMap<String, DetectedTag>, threshold: f64) -> TagDetection {
    let mut detected_tags: Vec<DetectedTag> = merged
        .into_values()
        .filter(|t| t.confidence >= threshold)
        .collect();
    detected_tags.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.tag.cmp(&b.tag))
    });

    let categories: BTreeSet<String> = detected_tags.iter().map(|t| t.category.clone()).collect();
    let confidence_scores: BTreeMap<String, f64> = detected_tags
        .iter()
        .map(|t| (t.tag.clone(), t.confidence))
        .collect();
    let overall_score = if detected_tags.is_empty() {
        0.0
    } else {
        detected_tags.iter().map(|t| t.confidence).sum::<f64>() / detected_tags.len() as f64
    };

    TagDetection {
        detected_tags,
        categories: categories.into_iter().collect(),
        confidence_scores,
        overall_score,
    }
}

// ============================================================================
// HEALTH
// ============================================================================

const CANARY_TEXT: &str = "Customer reported a crash; the fix shipped in the latest patch.";

#[async_trait]
impl HealthProbe for TagDetector {
    fn component(&self) -> &str {
        "tag_classifier"
    }

    async fn probe(&self) -> Result<ProbeReport> {
        let detection = self.detect_local(CANARY_TEXT, self.config.confidence_threshold);
        if !detection.has_tag("bug_fix") {
            return Ok(ProbeReport::unhealthy("canary text produced no bug_fix tag"));
        }
        if !self.ai.is_available() {
            return Ok(ProbeReport::warning("AI pass unavailable; local passes only"));
        }
        Ok(ProbeReport::healthy())
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("detections_total".into(), self.detections.load(Ordering::Relaxed) as f64);
        m.insert("ai_failures_total".into(), self.ai_failures.load(Ordering::Relaxed) as f64);
        m
    }
}
