use handlebars::{Handlebars, RenderError};
use serde_json::Value;
use thiserror::Error;

use crate::spec::{ArrayInputSpec, CollapsedContent};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to render collapsed content: {0}")]
    Render(#[from] RenderError),
}

/// Short display text for a collapsed array element.
///
/// Falls back to the form spec's `collapsed_placeholder` when the summary is empty.
pub fn collapsed_summary(
    spec: &ArrayInputSpec,
    element: &Value,
) -> Result<Option<String>, TemplateError> {
    let summary = match &spec.collapsed_content {
        Some(CollapsedContent::Path(path)) => path.get(element).map(display_value),
        Some(CollapsedContent::Template(template)) => {
            let mut registry = Handlebars::new();
            registry.register_escape_fn(handlebars::no_escape);
            Some(registry.render_template(template, element)?)
        }
        None => None,
    };

    Ok(summary
        .filter(|text| !text.trim().is_empty())
        .or_else(|| spec.collapsed_placeholder.clone()))
}

/// Human-friendly rendering of a document value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}={}", display_value(value)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use serde_json::json;

    #[test]
    fn summary_from_path_or_placeholder() {
        let mut spec = ArrayInputSpec::new("hooks");
        spec.collapsed_content = Some(CollapsedContent::Path(Path::parse("name").unwrap()));
        spec.collapsed_placeholder = Some("Expand to enter the job".into());

        assert_eq!(
            collapsed_summary(&spec, &json!({ "name": "pre-inst-1" })).unwrap(),
            Some("pre-inst-1".into())
        );
        assert_eq!(
            collapsed_summary(&spec, &json!({ "name": "" })).unwrap(),
            Some("Expand to enter the job".into())
        );
    }

    #[test]
    fn summary_from_template_is_not_html_escaped() {
        let mut spec = ArrayInputSpec::new("rules");
        spec.collapsed_content = Some(CollapsedContent::Template(
            "{{key}} {{operator}} {{values}}".into(),
        ));
        let rendered = collapsed_summary(
            &spec,
            &json!({ "key": "region", "operator": "In", "values": "us-east<1>" }),
        )
        .unwrap();
        assert_eq!(rendered.as_deref(), Some("region In us-east<1>"));
    }

    #[test]
    fn display_of_key_values() {
        assert_eq!(display_value(&json!({ "abc": "123", "n": 1 })), "abc=123, n=1");
        assert_eq!(display_value(&json!(["a", "b"])), "a, b");
    }
}
