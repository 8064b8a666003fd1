//! Integration tests for tag detection, including the AI pass.
//!
//! Stub completion providers stand in for a model vendor:
//! - `JsonProvider` answers with a fixed tag list
//! - `BrokenProvider` always fails
//! - `SlowProvider` never answers inside the timeout

use async_trait::async_trait;
use cflow_classifier::{ClassifierConfig, DetectOptions, TagDetector, TagSource};
use cflow_core::{AiProvider, CompletionOptions, CompletionProvider, ProviderError};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

struct JsonProvider(&'static str);

#[async_trait]
impl CompletionProvider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        Ok(self.0.to_string())
    }
}

struct BrokenProvider;

#[async_trait]
impl CompletionProvider for BrokenProvider {
    fn name(&self) -> &str {
        "broken"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        Err(ProviderError::Failed("503 from upstream".into()))
    }
}

struct SlowProvider;

#[async_trait]
impl CompletionProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _prompt: &str, _options: &CompletionOptions) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok("[]".into())
    }
}

const TEXT: &str = "Acme's rollout went great: onboarding time reduced by 40% after the SSO feature shipped, a significant ROI.";

fn detector_with(provider: Arc<dyn CompletionProvider>) -> TagDetector {
    let config = ClassifierConfig {
        ai_timeout_ms: 50,
        ..Default::default()
    };
    TagDetector::new(config, AiProvider::new(provider))
}

fn ai_options() -> DetectOptions {
    DetectOptions {
        use_ai: true,
        confidence_threshold: 0.5,
    }
}

// =============================================================================
// AI pass
// =============================================================================

#[tokio::test]
async fn test_ai_tags_are_merged() {
    let detector = detector_with(Arc::new(JsonProvider(
        r#"[{"tag": "expansion", "category": "customer", "confidence": 0.95},
            {"tag": "case_study_candidate", "confidence": 0.8}]"#,
    )));

    let detection = detector.detect_tags(TEXT, &ai_options()).await;

    let expansion = detection.detected_tags.iter().find(|t| t.tag == "expansion").unwrap();
    assert_eq!(expansion.source, TagSource::Ai);
    assert_eq!(expansion.confidence, 0.95);
    assert!(detection.has_tag("case_study_candidate"));
    assert!(detection.categories.contains(&"ai".to_string()));
}

#[tokio::test]
async fn test_ai_failure_falls_back_to_local_passes() {
    let local = TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable)
        .detect_local(TEXT, 0.5);

    let broken = detector_with(Arc::new(BrokenProvider));
    assert_eq!(broken.detect_tags(TEXT, &ai_options()).await, local);

    let slow = detector_with(Arc::new(SlowProvider));
    assert_eq!(slow.detect_tags(TEXT, &ai_options()).await, local);
}

#[tokio::test]
async fn test_ai_skipped_when_disabled() {
    let detector = detector_with(Arc::new(JsonProvider(
        r#"[{"tag": "should_not_appear", "confidence": 1.0}]"#,
    )));
    let detection = detector
        .detect_tags(TEXT, &DetectOptions::local(0.5))
        .await;
    assert!(!detection.has_tag("should_not_appear"));
}

#[tokio::test]
async fn test_detection_is_idempotent() {
    let detector = TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable);
    let first = detector.detect_tags(TEXT, &DetectOptions::local(0.5)).await;
    let second = detector.detect_tags(TEXT, &DetectOptions::local(0.5)).await;
    assert_eq!(first, second);
    assert!(first.has_tag("customer_success"));
    assert!(first.has_tag("high_impact"));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_detect_local_is_deterministic(text in ".{0,200}") {
        let detector = TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable);
        prop_assert_eq!(detector.detect_local(&text, 0.5), detector.detect_local(&text, 0.5));
    }

    #[test]
    fn prop_confidences_within_bounds(text in "[a-z %!,.]{0,200}", threshold in 0.0f64..1.0) {
        let detector = TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable);
        let detection = detector.detect_local(&text, threshold);
        for tag in &detection.detected_tags {
            prop_assert!(tag.confidence >= threshold && tag.confidence <= 1.0);
        }
        prop_assert!(detection.overall_score >= 0.0 && detection.overall_score <= 1.0);
    }

    #[test]
    fn prop_normalize_is_idempotent(text in ".{0,200}") {
        let once = cflow_classifier::normalize(&text);
        prop_assert_eq!(cflow_classifier::normalize(&once), once);
    }
}
