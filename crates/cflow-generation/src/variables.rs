//! Variable extraction: request overrides over record-derived values
use cflow_core::{RecordKind, SourceRecord, Template, VariableType};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Variables derived from a second name when their own is missing
const ALIASES: [(&str, &str); 2] = [("headline", "title"), ("first_name", "customer_name")];

/// Variables handed to the renderer, plus what was and wasn't found
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableSet {
    pub values: Map<String, Value>,
    /// Declared variables that received a non-empty value
    pub used: Vec<String>,
    /// Declared variables that fell back to `""`
    pub unresolved: Vec<String>,
}

impl VariableSet {
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }
}

/// Flatten records into one name → value map.
///
/// Scalars keep the first non-empty value in record order; list fields are
/// concatenated across records without duplicates.
pub fn record_variables(records: &[SourceRecord]) -> Map<String, Value> {
    let mut scalars: Vec<(&str, String)> = Vec::new();
    let mut lists: Vec<(&str, Vec<String>)> = Vec::new();

    for record in records {
        scalars.push(("summary", record.body.trim().to_string()));
        match &record.kind {
            RecordKind::Meeting(m) => {
                scalars.push(("title", m.title.clone()));
                push_opt(&mut scalars, "customer_name", &m.customer_name);
                push_opt(&mut scalars, "company", &m.company);
                push_opt(&mut scalars, "outcome", &m.outcome);
                lists.push(("participants", m.participants.clone()));
                lists.push(("key_quotes", m.key_quotes.clone()));
                lists.push((
                    "metrics",
                    m.metrics.iter().map(|(k, v)| format!("{}: {}", metric_label(k), v)).collect(),
                ));
            }
            RecordKind::CompetitiveSignal(s) => {
                let title = match &s.signal_type {
                    Some(kind) => format!("{}: {}", s.competitor, metric_label(kind)),
                    None => format!("{} update", s.competitor),
                };
                scalars.push(("title", title));
                scalars.push(("competitor", s.competitor.clone()));
                push_opt(&mut scalars, "channel", &s.channel);
                push_opt(&mut scalars, "signal_type", &s.signal_type);
                push_opt(&mut scalars, "url", &s.url);
            }
            RecordKind::ProductUpdate(p) => {
                scalars.push(("title", p.title.clone()));
                push_opt(&mut scalars, "product", &p.product);
                push_opt(&mut scalars, "version", &p.version);
                push_opt(&mut scalars, "issue_key", &p.issue_key);
                lists.push(("features", p.features.clone()));
            }
            RecordKind::CustomerInsight(i) => {
                push_opt(&mut scalars, "title", &i.theme);
                push_opt(&mut scalars, "customer_name", &i.customer_name);
                push_opt(&mut scalars, "company", &i.company);
                push_opt(&mut scalars, "theme", &i.theme);
                push_opt(&mut scalars, "sentiment", &i.sentiment);
            }
        }
    }

    let mut out = Map::new();
    for (name, value) in scalars {
        if !value.trim().is_empty() && !out.contains_key(name) {
            out.insert(name.to_string(), Value::String(value));
        }
    }
    for (name, items) in lists {
        let entry = out
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(existing) = entry {
            for item in items {
                let item = Value::String(item);
                if !existing.contains(&item) {
                    existing.push(item);
                }
            }
        }
    }
    out.retain(|_, v| !matches!(v, Value::Array(a) if a.is_empty()));
    out
}

fn push_opt<'a>(scalars: &mut Vec<(&'a str, String)>, name: &'a str, value: &Option<String>) {
    if let Some(value) = value {
        scalars.push((name, value.clone()));
    }
}

/// "onboarding_time" → "Onboarding time"
pub fn metric_label(key: &str) -> String {
    let spaced = key.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve every declared variable of `template`.
///
/// Precedence: custom variables, then record-derived values, then aliases.
/// Anything still missing becomes `""`. Custom variables the template does
/// not declare are passed through so ad-hoc templates can use them.
pub fn extract_variables(
    template: &Template,
    records: &[SourceRecord],
    custom: &HashMap<String, Value>,
    audience: Option<&str>,
) -> VariableSet {
    let derived = record_variables(records);
    let mut set = VariableSet::default();

    let lookup = |name: &str| -> Option<Value> {
        custom
            .get(name)
            .cloned()
            .filter(has_content)
            .or_else(|| derived.get(name).cloned())
            .or_else(|| match (name, audience) {
                ("audience", Some(a)) => Some(Value::String(a.to_string())),
                _ => None,
            })
    };

    for (name, var_type) in &template.template_variables {
        let value = lookup(name).or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias == name)
                .and_then(|(_, source)| lookup(source))
        });
        match value {
            Some(value) => {
                set.values.insert(name.clone(), coerce(value, *var_type));
                set.used.push(name.clone());
            }
            None => {
                set.values.insert(name.clone(), Value::String(String::new()));
                set.unresolved.push(name.clone());
            }
        }
    }

    for (name, value) in custom {
        set.values.entry(name.clone()).or_insert_with(|| value.clone());
    }

    set
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Shape a value toward its declared type where the conversion is obvious
fn coerce(value: Value, var_type: VariableType) -> Value {
    match (var_type, value) {
        (VariableType::List, Value::String(s)) => Value::Array(
            s.split(['\n', ';'])
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        (VariableType::String, Value::Array(items)) => Value::String(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (VariableType::String, Value::Number(n)) => Value::String(n.to_string()),
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cflow_core::{MeetingFields, ProductUpdateFields, TemplateType};
    use std::collections::BTreeMap;

    fn meeting() -> SourceRecord {
        let mut metrics = BTreeMap::new();
        metrics.insert("onboarding_time".to_string(), "2 weeks".to_string());
        SourceRecord::new(
            "mtg-1",
            "Acme rolled out to every region.",
            RecordKind::Meeting(MeetingFields {
                title: "Acme rollout".into(),
                customer_name: Some("Dana Wu".into()),
                company: Some("Acme".into()),
                key_quotes: vec!["It just works.".into()],
                metrics,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_record_fields_flatten() {
        let vars = record_variables(&[meeting()]);
        assert_eq!(vars["company"], "Acme");
        assert_eq!(vars["summary"], "Acme rolled out to every region.");
        assert_eq!(vars["metrics"], serde_json::json!(["Onboarding time: 2 weeks"]));
        assert!(!vars.contains_key("participants"));
    }

    #[test]
    fn test_lists_merge_across_records() {
        let update = |id: &str, features: &[&str]| {
            SourceRecord::new(
                id,
                "",
                RecordKind::ProductUpdate(ProductUpdateFields {
                    title: id.into(),
                    features: features.iter().map(|f| f.to_string()).collect(),
                    ..Default::default()
                }),
            )
        };
        let vars = record_variables(&[update("a", &["x", "y"]), update("b", &["y", "z"])]);
        assert_eq!(vars["features"], serde_json::json!(["x", "y", "z"]));
        assert_eq!(vars["title"], "a");
    }

    #[test]
    fn test_custom_overrides_and_unresolved() {
        let template = Template::new("t", TemplateType::CaseStudy, "")
            .with_variable("company", VariableType::String)
            .with_variable("headline", VariableType::String)
            .with_variable("missing", VariableType::String);
        let mut custom = HashMap::new();
        custom.insert("company".to_string(), Value::String("Initech".into()));
        custom.insert("extra".to_string(), Value::Bool(true));

        let set = extract_variables(&template, &[meeting()], &custom, None);
        assert_eq!(set.values["company"], "Initech");
        assert_eq!(set.values["headline"], "Acme rollout");
        assert_eq!(set.values["missing"], "");
        assert_eq!(set.values["extra"], true);
        assert_eq!(set.unresolved, vec!["missing".to_string()]);
        assert_eq!(set.used, vec!["company".to_string(), "headline".to_string()]);
    }

    #[test]
    fn test_list_coercion() {
        let template = Template::new("t", TemplateType::ChangelogEntry, "")
            .with_variable("features", VariableType::List);
        let mut custom = HashMap::new();
        custom.insert("features".to_string(), Value::String("Export; Import\nSync".into()));
        let set = extract_variables(&template, &[], &custom, None);
        assert_eq!(set.values["features"], serde_json::json!(["Export", "Import", "Sync"]));
    }
}
