//! Approval workflow shape per content type
use cflow_core::{ApprovalStep, GeneratedContent, Priority, TemplateType, WorkflowRequest};

use crate::config::SlaTable;

/// `(step name, reviewer role)` in review order
fn step_table(content_type: TemplateType) -> &'static [(&'static str, &'static str)] {
    match content_type {
        TemplateType::PressRelease => &[
            ("content_review", "editor"),
            ("legal_review", "legal"),
            ("executive_approval", "executive"),
        ],
        TemplateType::CaseStudy => &[("content_review", "editor"), ("customer_approval", "customer_success")],
        _ => &[("content_review", "editor")],
    }
}

/// Sequential steps, each carrying the SLA for the request's priority
pub fn approval_steps(content_type: TemplateType, priority: Priority, sla: &SlaTable) -> Vec<ApprovalStep> {
    step_table(content_type)
        .iter()
        .enumerate()
        .map(|(i, (name, role))| ApprovalStep {
            order: i as u32 + 1,
            name: name.to_string(),
            reviewer_role: role.to_string(),
            sla_hours: sla.hours(priority),
        })
        .collect()
}

/// Workflow for a piece of content; reviewers are the step roles in order
pub fn workflow_request(content: &GeneratedContent, priority: Priority, sla: &SlaTable) -> WorkflowRequest {
    let steps = approval_steps(content.content_type, priority, sla);
    let mut reviewers: Vec<String> = Vec::with_capacity(steps.len());
    for step in &steps {
        if !reviewers.contains(&step.reviewer_role) {
            reviewers.push(step.reviewer_role.clone());
        }
    }
    WorkflowRequest {
        content_id: content.id.clone(),
        steps,
        reviewers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_counts() {
        let sla = SlaTable::default();
        assert_eq!(approval_steps(TemplateType::PressRelease, Priority::Normal, &sla).len(), 3);
        assert_eq!(approval_steps(TemplateType::CaseStudy, Priority::Normal, &sla).len(), 2);
        for other in [TemplateType::ChangelogEntry, TemplateType::BattleCard, TemplateType::SocialPost] {
            assert_eq!(approval_steps(other, Priority::Normal, &sla).len(), 1);
        }
    }

    #[test]
    fn test_press_release_order_and_sla() {
        let steps = approval_steps(TemplateType::PressRelease, Priority::Urgent, &SlaTable::default());
        let names: Vec<&str> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["content_review", "legal_review", "executive_approval"]);
        assert_eq!(steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(steps.iter().all(|s| s.sla_hours == 4));
    }
}
