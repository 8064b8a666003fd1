//! Validator engine: runs the rule table and folds rule results into a verdict
use async_trait::async_trait;
use cflow_classifier::{ClassifierConfig, TagDetector};
use cflow_core::{AiProvider, HealthProbe, ProbeReport, Result, Template, TemplateType, VariableType};
use cflow_template::{analyze, strip_tags, SyntaxError, TemplateAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::profile::ValidationProfile;
use crate::rules::{FixKind, Issue, RuleContext, RuleId, RULES};
use crate::target::{TargetKind, ValidationTarget};

/// Outcome of one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: RuleId,
    pub score: f64,
    pub passed: bool,
    pub critical: bool,
    pub issues: Vec<Issue>,
    pub fixable_issues: Vec<Issue>,
    pub weight: f64,
}

impl RuleResult {
    /// Score from issue counts; a rule with any error never passes
    pub fn from_issues(rule_id: RuleId, issues: Vec<Issue>, profile: &ValidationProfile) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        let warnings = issues.len() - errors;
        let score = (1.0 - errors as f64 * profile.error_penalty - warnings as f64 * profile.warning_penalty)
            .clamp(0.0, 1.0);
        let fixable_issues = issues.iter().filter(|i| i.fix.is_some()).cloned().collect();

        Self {
            rule_id,
            score,
            passed: errors == 0 && score >= profile.rule_pass_score,
            critical: rule_id.spec().critical,
            issues,
            fixable_issues,
            weight: profile.weight(rule_id),
        }
    }
}

/// Composite verdict. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_results: Vec<RuleResult>,
    pub overall_score: f64,
    /// Critical rules that failed
    pub critical_issues: Vec<RuleId>,
    pub syntax_errors: Vec<SyntaxError>,
    pub complexity_score: f64,
    pub passed: bool,
    pub summary: String,
}

impl ValidationResult {
    pub fn from_rule_results(
        rule_results: Vec<RuleResult>,
        syntax_errors: Vec<SyntaxError>,
        complexity_score: f64,
        required_passing_score: f64,
    ) -> Self {
        let total_weight: f64 = rule_results.iter().map(|r| r.weight).sum();
        let overall_score = if total_weight > 0.0 {
            rule_results.iter().map(|r| r.score * r.weight).sum::<f64>() / total_weight
        } else {
            0.0
        };

        let critical_issues: Vec<RuleId> = rule_results
            .iter()
            .filter(|r| r.critical && !r.passed)
            .map(|r| r.rule_id)
            .collect();

        let passed = overall_score >= required_passing_score && critical_issues.is_empty() && syntax_errors.is_empty();

        let fixable = rule_results.iter().map(|r| r.fixable_issues.len()).sum::<usize>();
        let summary = if passed {
            format!("passed with {:.2} overall; {} fixable issue(s)", overall_score, fixable)
        } else {
            let failing: Vec<&str> = rule_results.iter().filter(|r| !r.passed).map(|r| r.rule_id.as_str()).collect();
            format!(
                "failed with {:.2} overall (needs {:.2}); failing rules: {}; {} syntax error(s)",
                overall_score,
                required_passing_score,
                if failing.is_empty() { "none".to_string() } else { failing.join(", ") },
                syntax_errors.len()
            )
        };

        Self {
            rule_results,
            overall_score,
            critical_issues,
            syntax_errors,
            complexity_score,
            passed,
            summary,
        }
    }

    pub fn rule(&self, id: RuleId) -> Option<&RuleResult> {
        self.rule_results.iter().find(|r| r.rule_id == id)
    }

    /// `rule: message` for every issue without a deterministic fix on a
    /// failed critical rule. These need a human reviewer.
    pub fn unfixable_critical_issues(&self) -> Vec<String> {
        self.rule_results
            .iter()
            .filter(|r| r.critical && !r.passed)
            .flat_map(|r| {
                r.issues
                    .iter()
                    .filter(|i| i.fix.is_none())
                    .map(move |i| format!("{}: {}", r.rule_id.as_str(), i.message))
            })
            .collect()
    }

    /// Unfixable issues on rules that are not critical; the only ones an
    /// automated revision may address
    pub fn revisable_issues(&self) -> Vec<String> {
        self.rule_results
            .iter()
            .filter(|r| !r.critical)
            .flat_map(|r| {
                r.issues
                    .iter()
                    .filter(|i| i.fix.is_none())
                    .map(move |i| format!("{}: {}", r.rule_id.as_str(), i.message))
            })
            .collect()
    }

    /// Distinct remedies in application order
    pub fn fixes(&self) -> Vec<FixKind> {
        let set: BTreeSet<FixKind> = self
            .rule_results
            .iter()
            .flat_map(|r| r.fixable_issues.iter())
            .filter_map(|i| i.fix.clone())
            .collect();
        set.into_iter().collect()
    }

    pub fn issue_count(&self) -> usize {
        self.rule_results.iter().map(|r| r.issues.len()).sum()
    }
}

/// depth·2 + conditionals + loops·2 + variables/5
pub fn complexity_score(analysis: &TemplateAnalysis) -> f64 {
    analysis.max_depth as f64 * 2.0
        + analysis.conditionals as f64
        + analysis.loops as f64 * 2.0
        + analysis.variables.len() as f64 / 5.0
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct TemplateValidator {
    profile: ValidationProfile,
    detector: TagDetector,
    validations: AtomicU64,
    passes: AtomicU64,
    /// Sum of overall scores in thousandths
    score_milli_sum: AtomicU64,
}

impl TemplateValidator {
    pub fn new(profile: ValidationProfile) -> Self {
        Self::with_detector(profile, TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable))
    }

    pub fn with_detector(profile: ValidationProfile, detector: TagDetector) -> Self {
        Self {
            profile,
            detector,
            validations: AtomicU64::new(0),
            passes: AtomicU64::new(0),
            score_milli_sum: AtomicU64::new(0),
        }
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    /// Run every rule against the target. Only a blank target is an error.
    pub fn validate(&self, target: &ValidationTarget) -> Result<ValidationResult> {
        target.ensure_not_blank()?;

        let analysis = analyze(&target.content);
        let prose = match target.kind {
            TargetKind::Template => strip_tags(&target.content),
            TargetKind::Content => target.content.clone(),
        };
        let tags = self.detector.detect_local(&prose, self.profile.tag_threshold);

        let ctx = RuleContext {
            target,
            analysis: &analysis,
            prose: &prose,
            tags: &tags,
            profile: &self.profile,
        };

        let rule_results: Vec<RuleResult> = RULES
            .iter()
            .map(|spec| RuleResult::from_issues(spec.id, (spec.check)(&ctx), &self.profile))
            .collect();

        let result = ValidationResult::from_rule_results(
            rule_results,
            analysis.errors.clone(),
            complexity_score(&analysis),
            self.profile.required_passing_score,
        );

        self.record(&result);
        tracing::debug!(
            kind = ?target.kind,
            content_type = %target.content_type,
            score = result.overall_score,
            passed = result.passed,
            "validation complete"
        );
        Ok(result)
    }

    pub fn validate_template(&self, template: &Template) -> Result<ValidationResult> {
        self.validate(&ValidationTarget::from_template(template))
    }

    fn record(&self, result: &ValidationResult) {
        self.validations.fetch_add(1, Ordering::Relaxed);
        if result.passed {
            self.passes.fetch_add(1, Ordering::Relaxed);
        }
        self.score_milli_sum
            .fetch_add((result.overall_score * 1000.0).round() as u64, Ordering::Relaxed);
    }
}

impl Default for TemplateValidator {
    fn default() -> Self {
        Self::new(ValidationProfile::default())
    }
}

fn canary() -> Template {
    Template::new(
        "health-canary",
        TemplateType::ChangelogEntry,
        "## {{title}}\n\n{{summary}}\n",
    )
    .with_variable("title", VariableType::String)
    .with_variable("summary", VariableType::String)
}

#[async_trait]
impl HealthProbe for TemplateValidator {
    fn component(&self) -> &str {
        "template_validator"
    }

    async fn probe(&self) -> Result<ProbeReport> {
        let result = self.validate_template(&canary())?;
        if result.passed {
            Ok(ProbeReport::healthy())
        } else {
            Ok(ProbeReport::unhealthy(format!("canary template rejected: {}", result.summary)))
        }
    }

    fn metrics(&self) -> BTreeMap<String, f64> {
        let total = self.validations.load(Ordering::Relaxed);
        let mut m = BTreeMap::new();
        m.insert("validations_total".into(), total as f64);
        if total > 0 {
            m.insert(
                "pass_rate".into(),
                self.passes.load(Ordering::Relaxed) as f64 / total as f64,
            );
            m.insert(
                "average_score".into(),
                self.score_milli_sum.load(Ordering::Relaxed) as f64 / 1000.0 / total as f64,
            );
        }
        m
    }
}
