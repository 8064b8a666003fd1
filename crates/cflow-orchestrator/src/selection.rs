//! Template selection: validate every candidate, keep the best passing one
use cflow_core::{CflowError, ContentRequest, Result, Template};
use cflow_generation::GenerationEngine;
use cflow_validator::{TemplateValidator, ValidationCache, ValidationResult, ValidationTarget};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::insights::ContentInsights;

/// Scores closer than this are treated as a tie
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub template_id: String,
    pub overall_score: f64,
    pub passed: bool,
    pub audience_match: bool,
    /// Position of the template's type in the recommendations
    pub recommendation_rank: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TemplateSelection {
    pub template: Template,
    pub validation: Arc<ValidationResult>,
    /// Every candidate considered, best first
    pub candidates: Vec<CandidateScore>,
}

/// Templates the request allows: the named one, or every template of the
/// requested type
pub fn candidate_templates(engine: &GenerationEngine, request: &ContentRequest) -> Result<Vec<Template>> {
    match (&request.template_id, request.content_type) {
        (Some(id), _) => Ok(vec![engine.template(id)?]),
        (None, Some(content_type)) => {
            let templates = engine.templates_for(content_type);
            if templates.is_empty() {
                return Err(CflowError::TemplateNotFound(format!("no template for {}", content_type)));
            }
            Ok(templates)
        }
        (None, None) => Err(CflowError::InputValidation(
            "request names neither a template_id nor a content_type".into(),
        )),
    }
}

/// Validate a target through the TTL cache
pub async fn validate_cached(
    validator: &TemplateValidator,
    cache: &ValidationCache,
    target: &ValidationTarget,
) -> Result<Arc<ValidationResult>> {
    if let Some(hit) = cache.get_target(target).await {
        return Ok(hit);
    }
    let result = Arc::new(validator.validate(target)?);
    cache.insert_target(target, Arc::clone(&result)).await;
    Ok(result)
}

/// Best first: score, then audience match, then recommendation rank
/// (unranked last), then template id
pub fn compare_candidates(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    if (a.overall_score - b.overall_score).abs() > SCORE_EPSILON {
        return b.overall_score.total_cmp(&a.overall_score);
    }
    b.audience_match
        .cmp(&a.audience_match)
        .then_with(|| {
            let rank = |c: &CandidateScore| c.recommendation_rank.unwrap_or(usize::MAX);
            rank(a).cmp(&rank(b))
        })
        .then_with(|| a.template_id.cmp(&b.template_id))
}

fn audience_matches(template: &Template, request: &ContentRequest) -> bool {
    match (&template.target_audience, &request.target_audience) {
        (Some(t), Some(r)) => t.eq_ignore_ascii_case(r),
        _ => false,
    }
}

pub async fn select_template(
    engine: &GenerationEngine,
    validator: &TemplateValidator,
    cache: &ValidationCache,
    request: &ContentRequest,
    insights: &ContentInsights,
) -> Result<TemplateSelection> {
    let templates = candidate_templates(engine, request)?;

    let mut scored: Vec<(CandidateScore, Template, Arc<ValidationResult>)> = Vec::with_capacity(templates.len());
    for template in templates {
        let validation = validate_cached(validator, cache, &ValidationTarget::from_template(&template)).await?;
        let score = CandidateScore {
            template_id: template.id.clone(),
            overall_score: validation.overall_score,
            passed: validation.passed,
            audience_match: audience_matches(&template, request),
            recommendation_rank: insights.rank_of(template.template_type),
        };
        scored.push((score, template, validation));
    }
    scored.sort_by(|a, b| compare_candidates(&a.0, &b.0));
    let candidates: Vec<CandidateScore> = scored.iter().map(|(score, _, _)| score.clone()).collect();

    match scored.into_iter().find(|(score, _, _)| score.passed) {
        Some((_, template, validation)) => Ok(TemplateSelection {
            template,
            validation,
            candidates,
        }),
        None => {
            let best = candidates.first().map(|c| c.overall_score).unwrap_or(0.0);
            Err(CflowError::NoViableTemplate(format!(
                "{} candidate(s) validated, none passed (best {:.2})",
                candidates.len(),
                best
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f64, audience: bool, rank: Option<usize>) -> CandidateScore {
        CandidateScore {
            template_id: id.into(),
            overall_score: score,
            passed: true,
            audience_match: audience,
            recommendation_rank: rank,
        }
    }

    #[test]
    fn test_tie_breaks() {
        let mut list = vec![
            candidate("d", 0.90, false, None),
            candidate("c", 0.95, false, Some(3)),
            candidate("b", 0.95, false, Some(1)),
            candidate("a", 0.95, true, None),
            candidate("e", 0.97, false, None),
        ];
        list.sort_by(compare_candidates);
        let order: Vec<&str> = list.iter().map(|c| c.template_id.as_str()).collect();
        assert_eq!(order, vec!["e", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_id_breaks_full_ties() {
        let mut list = vec![candidate("zeta", 0.9, true, Some(0)), candidate("alpha", 0.9, true, Some(0))];
        list.sort_by(compare_candidates);
        assert_eq!(list[0].template_id, "alpha");
    }
}
