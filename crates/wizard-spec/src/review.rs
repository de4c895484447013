use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::path::Path;
use crate::spec::{ArrayInputSpec, FormSpec, InputSpec, NodeSpec};
use crate::summary::{TemplateError, collapsed_summary, display_value};
use crate::visibility::{VisibilityMode, VisibilityTree, element_key, resolve_tree, scoped_key};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to encode document as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// The document as it should be handed to the submit callback.
///
/// Values are kept even when their input is hidden, except inside sections
/// that set `exclude_hidden`, where the paths of hidden inputs are removed.
pub fn to_submission(spec: &FormSpec, item: &Value) -> Value {
    let tree = resolve_tree(spec, item, VisibilityMode::Edit);
    let mut excluded = Vec::new();
    for step in &spec.steps {
        for section in &step.sections {
            collect_excluded(
                &section.children,
                item,
                &Path::root(),
                None,
                &tree,
                section.exclude_hidden,
                &mut excluded,
            );
        }
    }

    let mut submission = item.clone();
    for path in excluded.iter().rev() {
        if let Err(error) = path.unset(&mut submission) {
            warn!(%path, %error, "hidden value left in submission");
        }
    }
    submission
}

fn collect_excluded(
    children: &[NodeSpec],
    item: &Value,
    base: &Path,
    prefix: Option<&str>,
    tree: &VisibilityTree,
    exclude: bool,
    excluded: &mut Vec<Path>,
) {
    for child in children {
        let key = scoped_key(prefix, child.id());
        match child {
            NodeSpec::Input(input) => {
                let path = base.join(&input.bound_path());
                if exclude && !tree.is_rendered(&key) && path.get(item).is_some() {
                    excluded.push(path);
                }
            }
            NodeSpec::Section(section) => collect_excluded(
                &section.children,
                item,
                base,
                prefix,
                tree,
                exclude || section.exclude_hidden,
                excluded,
            ),
            NodeSpec::Array(array) => {
                let array_path = base.join(&array.bound_path());
                let Some(Value::Array(elements)) = array_path.get(item) else {
                    continue;
                };
                let matching = elements
                    .iter()
                    .enumerate()
                    .filter(|(_, element)| array.matches(element));
                for (position, (index, _)) in matching.enumerate() {
                    let element_key = element_key(&key, position);
                    collect_excluded(
                        &array.children,
                        item,
                        &array_path.index(index),
                        Some(&element_key),
                        tree,
                        exclude,
                        excluded,
                    );
                }
            }
        }
    }
}

/// Serializes a document as YAML.
///
/// A list becomes one YAML document per element, separated by `---`.
pub fn to_display_text(item: &Value) -> Result<String, ReviewError> {
    match item {
        Value::Array(resources) => {
            let blocks = resources
                .iter()
                .map(serde_yaml::to_string)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(blocks.join("---\n"))
        }
        other => Ok(serde_yaml::to_string(other)?),
    }
}

/// One entry of the review step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewItem {
    Field {
        key: String,
        label: String,
        value: String,
    },
    Section {
        key: String,
        label: String,
        items: Vec<ReviewItem>,
    },
    Array {
        key: String,
        label: String,
        items: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStep {
    pub id: String,
    pub label: String,
    pub items: Vec<ReviewItem>,
}

/// Read-only summary shown before submitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPayload {
    pub form_id: String,
    pub form_title: String,
    pub form_version: String,
    pub submit_label: String,
    pub steps: Vec<ReviewStep>,
}

/// Collects the visible, non-empty parts of the document for review.
pub fn build_review(spec: &FormSpec, item: &Value) -> Result<ReviewPayload, ReviewError> {
    let tree = resolve_tree(spec, item, VisibilityMode::Review);
    let mut steps = Vec::new();
    for step in &spec.steps {
        if !tree.is_rendered(&step.id) {
            continue;
        }
        let mut items = Vec::new();
        for section in &step.sections {
            if !tree.is_rendered(&section.id) {
                continue;
            }
            items.push(ReviewItem::Section {
                key: section.id.clone(),
                label: section.label.clone(),
                items: review_items(&section.children, item, &tree, None)?,
            });
        }
        steps.push(ReviewStep {
            id: step.id.clone(),
            label: step.label.clone(),
            items,
        });
    }

    Ok(ReviewPayload {
        form_id: spec.id.clone(),
        form_title: spec.title.clone(),
        form_version: spec.version.clone(),
        submit_label: spec
            .submit_label
            .clone()
            .unwrap_or_else(|| "Submit".to_string()),
        steps,
    })
}

fn review_items(
    children: &[NodeSpec],
    item: &Value,
    tree: &VisibilityTree,
    prefix: Option<&str>,
) -> Result<Vec<ReviewItem>, ReviewError> {
    let mut items = Vec::new();
    for child in children {
        let key = scoped_key(prefix, child.id());
        if !tree.is_rendered(&key) {
            continue;
        }
        match child {
            NodeSpec::Input(input) => {
                let value = input
                    .bound_path()
                    .get(item)
                    .map(|value| input_display(input, value))
                    .unwrap_or_default();
                items.push(ReviewItem::Field {
                    key,
                    label: input.display_label().to_string(),
                    value,
                });
            }
            NodeSpec::Section(section) => items.push(ReviewItem::Section {
                key,
                label: section.label.clone(),
                items: review_items(&section.children, item, tree, prefix)?,
            }),
            NodeSpec::Array(array) => items.push(ReviewItem::Array {
                label: array_label(array),
                items: array_summaries(array, item)?,
                key,
            }),
        }
    }
    Ok(items)
}

fn array_label(array: &ArrayInputSpec) -> String {
    if array.label.is_empty() {
        array.id.clone()
    } else {
        array.label.clone()
    }
}

fn array_summaries(array: &ArrayInputSpec, item: &Value) -> Result<Vec<String>, ReviewError> {
    crate::visibility::array_elements(array, item)
        .into_iter()
        .map(|element| {
            Ok(collapsed_summary(array, element)?.unwrap_or_else(|| display_value(element)))
        })
        .collect()
}

/// Shows the option label for choice inputs, the raw value otherwise.
fn input_display(input: &InputSpec, value: &Value) -> String {
    input
        .options
        .iter()
        .find(|option| option.value() == *value)
        .map(|option| option.label().to_string())
        .unwrap_or_else(|| display_value(value))
}

/// Render the review payload as a structured JSON value.
pub fn render_review_json(payload: &ReviewPayload) -> Value {
    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "form_version": payload.form_version,
        "submit_label": payload.submit_label,
        "steps": payload.steps,
    })
}

/// Render the review payload as human-friendly text.
pub fn render_review_text(payload: &ReviewPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Review: {} ({})",
        payload.form_title, payload.form_id
    ));
    for step in &payload.steps {
        lines.push(format!("{}:", step_title(step)));
        push_items(&step.items, 1, &mut lines);
    }
    if payload.steps.is_empty() {
        lines.push("Nothing to review.".to_string());
    }
    lines.join("\n")
}

fn step_title(step: &ReviewStep) -> &str {
    if step.label.is_empty() {
        &step.id
    } else {
        &step.label
    }
}

fn push_items(items: &[ReviewItem], depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for item in items {
        match item {
            ReviewItem::Field { label, value, .. } => {
                lines.push(format!("{indent}{label}: {value}"));
            }
            ReviewItem::Section { label, items, .. } => {
                if label.is_empty() {
                    push_items(items, depth, lines);
                } else {
                    lines.push(format!("{indent}{label}"));
                    push_items(items, depth + 1, lines);
                }
            }
            ReviewItem::Array { label, items, .. } => {
                lines.push(format!("{indent}{label}:"));
                for summary in items {
                    lines.push(format!("{indent}  - {summary}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlapping_hidden_paths_are_all_stripped() {
        let spec: FormSpec = serde_json::from_value(json!({
            "id": "chart",
            "title": "Chart",
            "version": "1",
            "steps": [{
                "id": "helm",
                "sections": [{
                    "id": "helm",
                    "exclude_hidden": true,
                    "children": [
                        {
                            "node": "input",
                            "id": "chart",
                            "path": "spec.helm.chart",
                            "hidden": { "op": "falsy", "path": "spec.enabled" }
                        },
                        {
                            "node": "input",
                            "id": "helm",
                            "path": "spec.helm",
                            "hidden": { "op": "falsy", "path": "spec.enabled" }
                        },
                        { "node": "input", "id": "enabled", "path": "spec.enabled" }
                    ]
                }]
            }]
        }))
        .unwrap();
        let document = json!({ "spec": { "helm": { "chart": "nginx" }, "enabled": false } });
        assert_eq!(to_submission(&spec, &document), json!({ "spec": { "enabled": false } }));
    }

    #[test]
    fn single_resource_is_one_block() {
        let text = to_display_text(&json!({ "kind": "Policy", "metadata": { "name": "a" } }))
            .unwrap();
        assert_eq!(text, "kind: Policy\nmetadata:\n  name: a\n");
    }

    #[test]
    fn resource_list_is_separated_by_document_markers() {
        let first = json!({ "kind": "Policy" });
        let second = json!({ "kind": "PlacementBinding" });
        let text = to_display_text(&json!([first.clone(), second.clone()])).unwrap();
        let expected = format!(
            "{}---\n{}",
            serde_yaml::to_string(&first).unwrap(),
            serde_yaml::to_string(&second).unwrap()
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn display_text_keeps_key_order() {
        let text = to_display_text(&json!({ "z": 1, "a": 2 })).unwrap();
        assert_eq!(text, "z: 1\na: 2\n");
    }
}
