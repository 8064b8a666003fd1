//! Validation profile: every tunable constant of the rule battery
//!
//! Loadable from YAML; keys left out keep their defaults.

use cflow_core::{config, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::rules::RuleId;

/// A brand name and the spellings that should be normalized to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandTerm {
    pub canonical: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationProfile {
    pub name: String,

    // === Verdict ===
    /// Minimum weighted score for an overall pass
    pub required_passing_score: f64,
    /// Minimum per-rule score for that rule to pass
    pub rule_pass_score: f64,
    /// Score lost per error-level issue
    pub error_penalty: f64,
    /// Score lost per warning-level issue
    pub warning_penalty: f64,
    /// Replaces the built-in weight of a rule
    pub weight_overrides: BTreeMap<RuleId, f64>,

    // === Structure ===
    pub complexity_warning: f64,

    // === Brand ===
    pub brand_terms: Vec<BrandTerm>,
    pub competitor_names: Vec<String>,
    pub forbidden_phrases: Vec<String>,
    pub max_exclamations: usize,
    /// Upper-case words of this length or longer are shouting
    pub shouting_min_len: usize,
    pub allowed_acronyms: Vec<String>,

    // === Grammar ===
    /// Misspelling → correction
    pub misspellings: BTreeMap<String, String>,

    // === Accessibility / SEO ===
    pub max_sentence_words: usize,
    pub max_title_chars: usize,
    pub keyword_density_limit: f64,
    pub subheading_min_words: usize,

    /// Confidence threshold for the classifier tags the rules consult
    pub tag_threshold: f64,
}

fn default_misspellings() -> BTreeMap<String, String> {
    [
        ("teh", "the"),
        ("recieve", "receive"),
        ("seperate", "separate"),
        ("occured", "occurred"),
        ("definately", "definitely"),
        ("accross", "across"),
        ("untill", "until"),
        ("wich", "which"),
        ("thier", "their"),
        ("acheive", "achieve"),
        ("succesful", "successful"),
        ("enviroment", "environment"),
        ("managment", "management"),
        ("publically", "publicly"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self {
            name: "standard@1.0".to_string(),
            required_passing_score: 0.8,
            rule_pass_score: 0.7,
            error_penalty: 0.3,
            warning_penalty: 0.1,
            weight_overrides: BTreeMap::new(),
            complexity_warning: 10.0,
            brand_terms: vec![BrandTerm {
                canonical: "Contentflow".to_string(),
                variants: vec![
                    "ContentFlow".to_string(),
                    "Content Flow".to_string(),
                    "Content-Flow".to_string(),
                ],
            }],
            competitor_names: Vec::new(),
            forbidden_phrases: vec![
                "guaranteed results".to_string(),
                "no-brainer".to_string(),
                "act now".to_string(),
                "best in the world".to_string(),
            ],
            max_exclamations: 1,
            shouting_min_len: 5,
            allowed_acronyms: vec!["HIPAA".to_string(), "OAUTH".to_string()],
            misspellings: default_misspellings(),
            max_sentence_words: 35,
            max_title_chars: 70,
            keyword_density_limit: 0.05,
            subheading_min_words: 300,
            tag_threshold: 0.5,
        }
    }
}

impl ValidationProfile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }

    /// Effective weight of a rule
    pub fn weight(&self, rule: RuleId) -> f64 {
        self.weight_overrides
            .get(&rule)
            .copied()
            .unwrap_or_else(|| rule.spec().weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let profile = ValidationProfile::from_yaml(
            r#"
name: strict@1.0
required_passing_score: 0.9
weight_overrides:
  legal_compliance: 0.2
competitor_names: [Globex]
"#,
        )
        .unwrap();

        assert_eq!(profile.required_passing_score, 0.9);
        assert_eq!(profile.rule_pass_score, 0.7);
        assert_eq!(profile.weight(RuleId::LegalCompliance), 0.2);
        assert_eq!(profile.weight(RuleId::FactAccuracy), 0.25);
        assert_eq!(profile.competitor_names, vec!["Globex".to_string()]);
        assert!(profile.misspellings.contains_key("recieve"));
    }
}
