//! Data Model: source records, content requests, templates and generated content
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{CflowError, Result};

// ============================================================================
// SOURCE RECORDS
// ============================================================================

/// Kinds of records the record store can hand us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Meeting,
    CompetitiveSignal,
    ProductUpdate,
    CustomerInsight,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Meeting,
        SourceType::CompetitiveSignal,
        SourceType::ProductUpdate,
        SourceType::CustomerInsight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meeting => "meeting",
            Self::CompetitiveSignal => "competitive_signal",
            Self::ProductUpdate => "product_update",
            Self::CustomerInsight => "customer_insight",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record fetched from the record store. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    /// Free-text body (transcript excerpt, signal text, release notes, ...)
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: RecordKind,
}

/// Source-specific structured fields, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    Meeting(MeetingFields),
    CompetitiveSignal(SignalFields),
    ProductUpdate(ProductUpdateFields),
    CustomerInsight(InsightFields),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingFields {
    pub title: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub key_quotes: Vec<String>,
    /// Named business outcomes, e.g. "onboarding_time" -> "2 weeks"
    #[serde(default)]
    pub metrics: BTreeMap<String, String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalFields {
    pub competitor: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub signal_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdateFields {
    pub title: String,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub issue_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightFields {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, body: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            created_at: Utc::now(),
            updated_at: None,
            kind,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match &self.kind {
            RecordKind::Meeting(_) => SourceType::Meeting,
            RecordKind::CompetitiveSignal(_) => SourceType::CompetitiveSignal,
            RecordKind::ProductUpdate(_) => SourceType::ProductUpdate,
            RecordKind::CustomerInsight(_) => SourceType::CustomerInsight,
        }
    }

    /// Look up a scalar field by name. Used by stores to apply filters.
    pub fn field(&self, name: &str) -> Option<String> {
        if name == "id" {
            return Some(self.id.clone());
        }
        match &self.kind {
            RecordKind::Meeting(m) => match name {
                "title" => Some(m.title.clone()),
                "customer_name" => m.customer_name.clone(),
                "company" => m.company.clone(),
                "outcome" => m.outcome.clone(),
                _ => None,
            },
            RecordKind::CompetitiveSignal(s) => match name {
                "competitor" => Some(s.competitor.clone()),
                "channel" => s.channel.clone(),
                "signal_type" => s.signal_type.clone(),
                "url" => s.url.clone(),
                _ => None,
            },
            RecordKind::ProductUpdate(p) => match name {
                "title" => Some(p.title.clone()),
                "product" => p.product.clone(),
                "version" => p.version.clone(),
                "issue_key" => p.issue_key.clone(),
                _ => None,
            },
            RecordKind::CustomerInsight(i) => match name {
                "customer_name" => i.customer_name.clone(),
                "company" => i.company.clone(),
                "theme" => i.theme.clone(),
                "sentiment" => i.sentiment.clone(),
                _ => None,
            },
        }
    }
}

// ============================================================================
// CONTENT REQUEST
// ============================================================================

/// Which records to pull for one source type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceFilter {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub ids: Vec<String>,
    /// Exact-match field filters, e.g. `company = "Acme"`
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl DataSourceFilter {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            ids: Vec::new(),
            filters: BTreeMap::new(),
            limit: None,
        }
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Does a record satisfy the id and field filters?
    pub fn matches(&self, record: &SourceRecord) -> bool {
        if record.source_type() != self.source_type {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.iter().any(|id| id == &record.id) {
            return false;
        }
        self.filters.iter().all(|(field, expected)| {
            record
                .field(field)
                .map(|actual| actual.eq_ignore_ascii_case(expected))
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Markdown,
    Html,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// One invocation of the content pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub content_type: Option<TemplateType>,
    #[serde(default)]
    pub data_sources: Vec<DataSourceFilter>,
    /// Highest-precedence variable values
    #[serde(default)]
    pub custom_variables: HashMap<String, Value>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub content_format: ContentFormat,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default)]
    pub priority: Priority,
}

impl ContentRequest {
    pub fn for_template(template_id: impl Into<String>) -> Self {
        Self {
            template_id: Some(template_id.into()),
            ..Default::default()
        }
    }

    pub fn for_type(content_type: TemplateType) -> Self {
        Self {
            content_type: Some(content_type),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, filter: DataSourceFilter) -> Self {
        self.data_sources.push(filter);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_variables.insert(name.into(), value.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.approval_required = true;
        self
    }

    /// Decode a request from loosely-typed JSON, reporting shape problems
    /// as input validation errors instead of serde messages.
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CflowError::InputValidation("request must be a JSON object".into()))?;

        if let Some(sources) = obj.get("data_sources") {
            let list = sources.as_array().ok_or_else(|| {
                CflowError::InputValidation("data_sources must be an array".into())
            })?;
            for (idx, source) in list.iter().enumerate() {
                let entry = source.as_object().ok_or_else(|| {
                    CflowError::InputValidation(format!("data_sources[{}] must be an object", idx))
                })?;
                if !entry.get("type").map(Value::is_string).unwrap_or(false) {
                    return Err(CflowError::InputValidation(format!(
                        "data_sources[{}].type must be a string",
                        idx
                    )));
                }
                if let Some(ids) = entry.get("ids") {
                    if !ids.is_array() {
                        return Err(CflowError::InputValidation(format!(
                            "data_sources[{}].ids must be an array",
                            idx
                        )));
                    }
                }
            }
        }

        serde_json::from_value(value).map_err(|e| CflowError::InputValidation(e.to_string()))
    }
}

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    CaseStudy,
    BattleCard,
    EmailCampaign,
    ChangelogEntry,
    PressRelease,
    ProductAnnouncement,
    BlogPost,
    SocialPost,
}

impl TemplateType {
    pub const ALL: [TemplateType; 8] = [
        TemplateType::CaseStudy,
        TemplateType::BattleCard,
        TemplateType::EmailCampaign,
        TemplateType::ChangelogEntry,
        TemplateType::PressRelease,
        TemplateType::ProductAnnouncement,
        TemplateType::BlogPost,
        TemplateType::SocialPost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseStudy => "case_study",
            Self::BattleCard => "battle_card",
            Self::EmailCampaign => "email_campaign",
            Self::ChangelogEntry => "changelog_entry",
            Self::PressRelease => "press_release",
            Self::ProductAnnouncement => "product_announcement",
            Self::BlogPost => "blog_post",
            Self::SocialPost => "social_post",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CaseStudy => "Case Study",
            Self::BattleCard => "Battle Card",
            Self::EmailCampaign => "Email Campaign",
            Self::ChangelogEntry => "Changelog Entry",
            Self::PressRelease => "Press Release",
            Self::ProductAnnouncement => "Product Announcement",
            Self::BlogPost => "Blog Post",
            Self::SocialPost => "Social Post",
        }
    }

    /// Target word-count range for finished content of this type
    pub fn word_range(&self) -> (usize, usize) {
        match self {
            Self::CaseStudy => (150, 1200),
            Self::BattleCard => (80, 600),
            Self::EmailCampaign => (50, 300),
            Self::ChangelogEntry => (15, 250),
            Self::PressRelease => (200, 800),
            Self::ProductAnnouncement => (80, 500),
            Self::BlogPost => (400, 2000),
            Self::SocialPost => (5, 60),
        }
    }

    /// Whether the content is intended for readers outside the company
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::BattleCard)
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
    List,
    Object,
}

/// A parametrized content skeleton written in the template micro-language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub template_type: TemplateType,
    pub template_content: String,
    #[serde(default)]
    pub template_variables: BTreeMap<String, VariableType>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub built_in: bool,
}

impl Template {
    pub fn new(
        id: impl Into<String>,
        template_type: TemplateType,
        content: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            template_type,
            template_content: content.into(),
            template_variables: BTreeMap::new(),
            target_audience: None,
            description: String::new(),
            built_in: false,
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, var_type: VariableType) -> Self {
        self.template_variables.insert(name.into(), var_type);
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ============================================================================
// GENERATED CONTENT
// ============================================================================

/// Content-level quality metrics, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub quality_score: f64,
    pub readability_score: f64,
    pub engagement_prediction: f64,
}

/// Output of one successful generation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: String,
    pub template_id: String,
    pub content_title: String,
    pub body: String,
    pub content_type: TemplateType,
    #[serde(default)]
    pub target_audience: Option<String>,
    pub quality_metrics: QualityMetrics,
    pub word_count: usize,
    pub variables_used: Vec<String>,
    pub ai_generated: bool,
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedContent {
    /// Copy with a replacement body. Produces a new artifact rather than
    /// mutating the original.
    pub fn with_body(&self, body: String, quality_metrics: QualityMetrics) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            word_count: word_count(&body),
            content_hash: content_hash(&body),
            body,
            quality_metrics,
            generated_at: Utc::now(),
            ..self.clone()
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Stable content hash in the `blake3:<hex>` form
pub fn content_hash(text: &str) -> String {
    format!("blake3:{}", blake3::hash(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_roundtrips_with_type_tag() {
        let value = json!({
            "id": "mtg-1",
            "body": "Kickoff with Acme",
            "created_at": "2024-05-01T10:00:00Z",
            "type": "meeting",
            "title": "Kickoff",
            "company": "Acme"
        });

        let record: SourceRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.source_type(), SourceType::Meeting);
        assert_eq!(record.field("company"), Some("Acme".to_string()));
        assert_eq!(record.field("title"), Some("Kickoff".to_string()));
    }

    #[test]
    fn test_filter_matches_ids_and_fields() {
        let record = SourceRecord::new(
            "sig-1",
            "Rival cut prices",
            RecordKind::CompetitiveSignal(SignalFields {
                competitor: "Globex".into(),
                ..Default::default()
            }),
        );

        let filter = DataSourceFilter::new(SourceType::CompetitiveSignal)
            .with_filter("competitor", "globex");
        assert!(filter.matches(&record));

        let filter = DataSourceFilter::new(SourceType::CompetitiveSignal).with_ids(["sig-2"]);
        assert!(!filter.matches(&record));

        let filter = DataSourceFilter::new(SourceType::Meeting);
        assert!(!filter.matches(&record));
    }

    #[test]
    fn test_request_from_value_rejects_bad_sources() {
        let err = ContentRequest::from_value(json!({
            "content_type": "case_study",
            "data_sources": { "type": "meeting" }
        }))
        .unwrap_err();
        assert!(matches!(err, CflowError::InputValidation(_)));

        let err = ContentRequest::from_value(json!({
            "content_type": "case_study",
            "data_sources": [{ "type": "meeting", "ids": "mtg-1" }]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("ids must be an array"));
    }

    #[test]
    fn test_request_from_value_accepts_valid_shape() {
        let request = ContentRequest::from_value(json!({
            "content_type": "changelog_entry",
            "data_sources": [{ "type": "product_update", "ids": ["pu-1"] }],
            "priority": "high"
        }))
        .unwrap();

        assert_eq!(request.content_type, Some(TemplateType::ChangelogEntry));
        assert_eq!(request.data_sources[0].ids, vec!["pu-1".to_string()]);
        assert_eq!(request.priority, Priority::High);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert!(content_hash("abc").starts_with("blake3:"));
    }
}
