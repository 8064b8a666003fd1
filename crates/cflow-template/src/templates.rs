//! Template sets: the built-in YAML set and a runtime registry.
//!
//! File format:
//!
//! ```yaml
//! version: "1.0"
//! templates:
//!   - id: changelog-standard
//!     name: Standard changelog entry
//!     template_type: changelog_entry
//!     template_variables: { title: string, features: list }
//!     template_content: |
//!       ## {{title}}
//! ```

use cflow_core::{CflowError, Result, Template, TemplateType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_YAML: &str = include_str!("../templates/builtin.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesFile {
    pub version: String,
    pub templates: Vec<Template>,
}

impl TemplatesFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CflowError::Config(format!("templates file: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CflowError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }
}

/// The templates shipped with the engine, flagged `built_in`
pub fn builtin_templates() -> Result<Vec<Template>> {
    let file = TemplatesFile::from_yaml(BUILTIN_YAML)?;
    Ok(file
        .templates
        .into_iter()
        .map(|mut t| {
            t.built_in = true;
            t
        })
        .collect())
}

/// Id-keyed template lookup. Built-ins cannot be overwritten.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in set
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for template in builtin_templates()? {
            registry.templates.insert(template.id.clone(), template);
        }
        Ok(registry)
    }

    /// Add or replace a custom template
    pub fn register(&mut self, mut template: Template) -> Result<()> {
        if template.id.trim().is_empty() {
            return Err(CflowError::InputValidation("template id is empty".into()));
        }
        if template.template_content.trim().is_empty() {
            return Err(CflowError::InputValidation(format!(
                "template {} has no content",
                template.id
            )));
        }
        if self.templates.get(&template.id).is_some_and(|t| t.built_in) {
            return Err(CflowError::InputValidation(format!(
                "template {} is built in and cannot be replaced",
                template.id
            )));
        }

        template.built_in = false;
        tracing::debug!(template_id = %template.id, kind = %template.template_type, "template registered");
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    /// Register every template of a YAML file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let file = TemplatesFile::load(path)?;
        let count = file.templates.len();
        for template in file.templates {
            self.register(template)?;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Like [`get`](Self::get) but with the pipeline's not-found error
    pub fn resolve(&self, id: &str) -> Result<&Template> {
        self.get(id)
            .ok_or_else(|| CflowError::TemplateNotFound(id.to_string()))
    }

    /// All templates of one type, custom templates first, then by id
    pub fn by_type(&self, template_type: TemplateType) -> Vec<&Template> {
        let mut found: Vec<&Template> = self
            .templates
            .values()
            .filter(|t| t.template_type == template_type)
            .collect();
        found.sort_by(|a, b| a.built_in.cmp(&b.built_in).then_with(|| a.id.cmp(&b.id)));
        found
    }

    pub fn list(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::analyze;

    #[test]
    fn test_builtins_cover_every_type() {
        let registry = TemplateRegistry::with_builtins().unwrap();
        for kind in TemplateType::ALL {
            assert!(
                !registry.by_type(kind).is_empty(),
                "no built-in template for {}",
                kind
            );
        }
    }

    #[test]
    fn test_builtins_are_well_formed() {
        for template in builtin_templates().unwrap() {
            let analysis = analyze(&template.template_content);
            assert!(analysis.is_valid(), "{}: {:?}", template.id, analysis.errors);
            for var in &analysis.variables {
                assert!(
                    template.template_variables.contains_key(var),
                    "{} uses undeclared {}",
                    template.id,
                    var
                );
            }
            assert!(template.built_in);
        }
    }

    #[test]
    fn test_builtin_cannot_be_replaced() {
        let mut registry = TemplateRegistry::with_builtins().unwrap();
        let id = registry.list()[0].to_string();
        let err = registry
            .register(Template::new(id, TemplateType::BlogPost, "# {{title}}"))
            .unwrap_err();
        assert!(matches!(err, CflowError::InputValidation(_)));
    }

    #[test]
    fn test_custom_templates_sort_first() {
        let mut registry = TemplateRegistry::with_builtins().unwrap();
        registry
            .register(Template::new("zz-custom", TemplateType::SocialPost, "{{headline}}"))
            .unwrap();
        let social = registry.by_type(TemplateType::SocialPost);
        assert_eq!(social[0].id, "zz-custom");
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = TemplateRegistry::new();
        assert!(matches!(
            registry.resolve("nope"),
            Err(CflowError::TemplateNotFound(_))
        ));
    }
}
