//! Template rendering.
//!
//! Uses Handlebars with HTML escaping off (output is markdown or plain text)
//! and strict mode off (a missing variable renders as nothing). Every source
//! goes through [`analyze`](crate::syntax::analyze) first so unbalanced
//! blocks are rejected before Handlebars sees them.

use cflow_core::{CflowError, Result, Template};
use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde_json::Value;

use crate::syntax::analyze;

// ============================================================================
// Helpers
// ============================================================================

// 0.85 -> "85%"
handlebars_helper!(percent: |value: f64| format!("{}%", (value * 100.0).round() as i64));

handlebars_helper!(join: |list: array, separator: str| {
    list.iter()
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
});

handlebars_helper!(with_default: |value: Json, fallback: str| {
    match value {
        Value::Null => fallback.to_string(),
        Value::String(s) if s.is_empty() => fallback.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
});

/// Renderer with the helper set registered
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(no_escape);

        handlebars.register_helper("percent", Box::new(percent));
        handlebars.register_helper("join", Box::new(join));
        handlebars.register_helper("default", Box::new(with_default));

        Self { handlebars }
    }

    /// Render a micro-language source string against a JSON context
    pub fn render_str(&self, source: &str, data: &Value) -> Result<String> {
        let analysis = analyze(source);
        if let Some(first) = analysis.errors.first() {
            return Err(CflowError::Render(format!(
                "{} syntax error(s), first: {}",
                analysis.errors.len(),
                first
            )));
        }

        self.handlebars
            .render_template(source, data)
            .map_err(|e| CflowError::Render(e.to_string()))
    }

    /// Render a stored template
    pub fn render(&self, template: &Template, data: &Value) -> Result<String> {
        self.render_str(&template.template_content, data)
            .map_err(|e| match e {
                CflowError::Render(msg) => CflowError::Render(format!("{}: {}", template.id, msg)),
                other => other,
            })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot render with a fresh renderer
pub fn render_string(source: &str, data: &Value) -> Result<String> {
    TemplateRenderer::new().render_str(source, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_render() {
        let out = render_string(
            "Hello {{name}}, welcome to {{company}}!",
            &json!({ "name": "Ada", "company": "Acme" }),
        )
        .unwrap();
        assert_eq!(out, "Hello Ada, welcome to Acme!");
    }

    #[test]
    fn test_each_over_strings() {
        let out = render_string("{{#each items}}{{this}}, {{/each}}", &json!({ "items": ["a", "b", "c"] }))
            .unwrap();
        assert_eq!(out, "a, b, c, ");
    }

    #[test]
    fn test_if_else() {
        let source = "{{#if quote}}\"{{quote}}\"{{else}}no quote{{/if}}";
        assert_eq!(render_string(source, &json!({ "quote": "Fast" })).unwrap(), "\"Fast\"");
        assert_eq!(render_string(source, &json!({ "quote": "" })).unwrap(), "no quote");
    }

    #[test]
    fn test_no_html_escaping() {
        let out = render_string("{{v}}", &json!({ "v": "a & <b>" })).unwrap();
        assert_eq!(out, "a & <b>");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let out = render_string("[{{missing}}]", &json!({})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_helpers() {
        let data = json!({ "score": 0.85, "tags": ["x", "y"], "name": null });
        assert_eq!(render_string("{{percent score}}", &data).unwrap(), "85%");
        assert_eq!(render_string(r#"{{join tags " / "}}"#, &data).unwrap(), "x / y");
        assert_eq!(render_string(r#"{{default name "there"}}"#, &data).unwrap(), "there");
    }

    #[test]
    fn test_syntax_errors_are_render_errors() {
        let err = render_string("{{#if a}}never closed", &json!({})).unwrap_err();
        assert!(matches!(err, CflowError::Render(_)));
        assert!(err.to_string().contains("never closed"));
    }
}
