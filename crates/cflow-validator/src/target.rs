//! What gets validated: a template or a piece of generated content
use cflow_core::{CflowError, GeneratedContent, Result, Template, TemplateType, VariableType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Template,
    Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationTarget {
    pub kind: TargetKind,
    pub content: String,
    /// Declared variables (templates) or variables that were filled (content)
    pub variables: BTreeMap<String, VariableType>,
    pub content_type: TemplateType,
    pub audience: Option<String>,
    pub title: Option<String>,
}

impl ValidationTarget {
    pub fn from_template(template: &Template) -> Self {
        Self {
            kind: TargetKind::Template,
            content: template.template_content.clone(),
            variables: template.template_variables.clone(),
            content_type: template.template_type,
            audience: template.target_audience.clone(),
            title: None,
        }
    }

    pub fn from_content(content: &GeneratedContent) -> Self {
        Self {
            kind: TargetKind::Content,
            content: content.body.clone(),
            variables: content
                .variables_used
                .iter()
                .map(|v| (v.clone(), VariableType::String))
                .collect(),
            content_type: content.content_type,
            audience: content.target_audience.clone(),
            title: Some(content.content_title.clone()),
        }
    }

    /// Ad-hoc content target, mostly for tests and previews
    pub fn content(content_type: TemplateType, body: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Content,
            content: body.into(),
            variables: BTreeMap::new(),
            content_type,
            audience: None,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn ensure_not_blank(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(CflowError::InputValidation(format!(
                "{} target for {} is blank",
                match self.kind {
                    TargetKind::Template => "template",
                    TargetKind::Content => "content",
                },
                self.content_type
            )));
        }
        Ok(())
    }

    /// Stable cache key over everything that influences the result
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("{:?}|{}|", self.kind, self.content_type).as_bytes());
        hasher.update(self.audience.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(self.title.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        for (name, var_type) in &self.variables {
            hasher.update(format!("{}:{:?};", name, var_type).as_bytes());
        }
        hasher.update(b"|");
        hasher.update(self.content.as_bytes());
        format!("blake3:{}", hasher.finalize())
    }
}
