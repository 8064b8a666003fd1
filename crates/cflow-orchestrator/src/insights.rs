//! Insight derivation: what the gathered records are about and which
//! content types they support
use cflow_classifier::{DetectOptions, TagDetection, TagDetector};
use cflow_core::{ContentRequest, RecordKind, SourceRecord, SourceType, TemplateType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Content types a detected tag argues for
const TAG_OPPORTUNITIES: &[(&str, &[TemplateType])] = &[
    ("competitor_mention", &[TemplateType::BattleCard]),
    ("pricing_change", &[TemplateType::BattleCard]),
    ("product_launch", &[TemplateType::BattleCard, TemplateType::PressRelease]),
    ("partnership", &[TemplateType::PressRelease]),
    ("customer_success", &[TemplateType::CaseStudy, TemplateType::SocialPost]),
    ("expansion", &[TemplateType::CaseStudy]),
    ("churn_risk", &[TemplateType::EmailCampaign]),
    ("feedback", &[TemplateType::BlogPost]),
    (
        "feature",
        &[TemplateType::ProductAnnouncement, TemplateType::ChangelogEntry, TemplateType::EmailCampaign],
    ),
    ("bug_fix", &[TemplateType::ChangelogEntry]),
    ("performance", &[TemplateType::ChangelogEntry, TemplateType::ProductAnnouncement]),
    ("security", &[TemplateType::ChangelogEntry]),
    ("industry_trend", &[TemplateType::BlogPost]),
    ("regulation", &[TemplateType::BlogPost]),
];

/// Confidence credited to a content type for each matching source type
const SOURCE_HINT_CONFIDENCE: f64 = 0.5;

fn source_hints(source_type: SourceType) -> &'static [TemplateType] {
    match source_type {
        SourceType::Meeting => &[TemplateType::CaseStudy],
        SourceType::CompetitiveSignal => &[TemplateType::BattleCard],
        SourceType::ProductUpdate => &[TemplateType::ChangelogEntry, TemplateType::ProductAnnouncement],
        SourceType::CustomerInsight => &[TemplateType::BlogPost],
    }
}

fn audience_note(tag: &str) -> Option<&'static str> {
    match tag {
        "positive_sentiment" => Some("customers describe positive outcomes"),
        "negative_sentiment" => Some("customers report friction"),
        "churn_risk" => Some("some accounts show churn risk"),
        "expansion" => Some("accounts are expanding usage"),
        "urgent" => Some("the signal is time-sensitive"),
        "competitor_mention" => Some("buyers are comparing alternatives"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentOpportunity {
    pub content_type: TemplateType,
    pub confidence: f64,
    /// Tags and source types that support this opportunity
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentInsights {
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub content_opportunities: Vec<ContentOpportunity>,
    pub audience_insights: Vec<String>,
    /// Best-supported content types first
    pub recommended_templates: Vec<TemplateType>,
    pub overall_confidence: f64,
}

impl ContentInsights {
    /// Position of `content_type` in the recommendations, if recommended
    pub fn rank_of(&self, content_type: TemplateType) -> Option<usize> {
        self.recommended_templates.iter().position(|t| *t == content_type)
    }
}

/// Text the classifier sees for a run: record bodies, their structured
/// fields and any string custom variables
pub fn insight_text(records: &[SourceRecord], request: &ContentRequest) -> String {
    let mut parts: Vec<String> = Vec::new();
    for record in records {
        match &record.kind {
            RecordKind::Meeting(m) => {
                parts.push(m.title.clone());
                parts.extend(m.outcome.clone());
                parts.extend(m.key_quotes.iter().cloned());
            }
            RecordKind::CompetitiveSignal(s) => {
                parts.push(s.competitor.clone());
                parts.extend(s.signal_type.as_ref().map(|t| t.replace('_', " ")));
            }
            RecordKind::ProductUpdate(p) => {
                parts.push(p.title.clone());
                parts.extend(p.features.iter().cloned());
            }
            RecordKind::CustomerInsight(i) => {
                parts.extend(i.theme.clone());
                parts.extend(i.sentiment.clone());
            }
        }
        parts.push(record.body.clone());
    }
    let mut custom: Vec<(&String, &Value)> = request.custom_variables.iter().collect();
    custom.sort_by(|a, b| a.0.cmp(b.0));
    for (_, value) in custom {
        if let Value::String(s) = value {
            parts.push(s.clone());
        }
    }
    parts.retain(|p| !p.trim().is_empty());
    parts.join("\n")
}

/// Fold a tag detection and the gathered source types into insights
pub fn build_insights(detection: &TagDetection, records: &[SourceRecord]) -> ContentInsights {
    let mut scores: BTreeMap<TemplateType, (f64, Vec<String>)> = BTreeMap::new();

    for (tag, types) in TAG_OPPORTUNITIES {
        if let Some(&confidence) = detection.confidence_scores.get(*tag) {
            for content_type in *types {
                let entry = scores.entry(*content_type).or_insert((0.0, Vec::new()));
                entry.0 = entry.0.max(confidence);
                entry.1.push(format!("tag:{}", tag));
            }
        }
    }

    let mut source_types: Vec<SourceType> = records.iter().map(SourceRecord::source_type).collect();
    source_types.sort_by_key(|s| s.as_str());
    source_types.dedup();
    for source_type in &source_types {
        for content_type in source_hints(*source_type) {
            let entry = scores.entry(*content_type).or_insert((0.0, Vec::new()));
            entry.0 = (entry.0 + SOURCE_HINT_CONFIDENCE).min(1.0);
            entry.1.push(format!("source:{}", source_type.as_str()));
        }
    }

    let mut content_opportunities: Vec<ContentOpportunity> = scores
        .into_iter()
        .map(|(content_type, (confidence, reasons))| ContentOpportunity {
            content_type,
            confidence,
            reasons,
        })
        .collect();
    // stable sort keeps type order among equal confidences
    content_opportunities.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut audience_insights: Vec<String> = detection
        .tag_names()
        .filter_map(audience_note)
        .map(str::to_string)
        .collect();
    let mut companies: Vec<String> = records.iter().filter_map(|r| r.field("company")).collect();
    companies.sort();
    companies.dedup();
    if !companies.is_empty() {
        audience_insights.push(format!("accounts involved: {}", companies.join(", ")));
    }

    ContentInsights {
        tags: detection.tag_names().map(str::to_string).collect(),
        categories: detection.categories.clone(),
        recommended_templates: content_opportunities.iter().map(|o| o.content_type).collect(),
        content_opportunities,
        audience_insights,
        overall_confidence: detection.overall_score,
    }
}

/// Classify the run's text and derive insights. Classification never fails
/// the run; without any text the insights are empty.
pub async fn derive_insights(
    detector: &TagDetector,
    records: &[SourceRecord],
    request: &ContentRequest,
    threshold: f64,
) -> ContentInsights {
    let text = insight_text(records, request);
    if text.is_empty() {
        return ContentInsights::default();
    }
    let options = DetectOptions {
        confidence_threshold: threshold,
        ..detector.default_options()
    };
    let detection = detector.detect_tags(&text, &options).await;
    build_insights(&detection, records)
}
