use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::empty::is_missing_or_empty;
use crate::spec::{Constraint, FormSpec, InputKind, InputSpec, NodeSpec};
use crate::validators;
use crate::visibility::{
    VisibilityMode, VisibilityTree, array_elements, element_key, resolve_tree, scoped_key,
};

/// A problem with one input's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Scoped key of the input (`hooks-2.name` inside arrays).
    pub key: String,
    pub path: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    /// Step id to "has a validation problem".
    pub steps: BTreeMap<String, bool>,
}

impl ValidationResult {
    pub fn can_submit(&self) -> bool {
        self.valid
    }

    pub fn step_has_error(&self, step_id: &str) -> bool {
        self.steps.get(step_id).copied().unwrap_or(false)
    }

    /// Inline message for an input, if any.
    pub fn message_for(&self, key: &str) -> Option<&str> {
        if let Some(error) = self.errors.iter().find(|error| error.key == key) {
            return Some(&error.message);
        }
        self.missing_required
            .iter()
            .any(|missing| missing == key)
            .then_some("This is a required field.")
    }
}

#[derive(Default)]
struct Findings {
    errors: Vec<ValidationError>,
    missing_required: Vec<String>,
}

impl Findings {
    fn count(&self) -> usize {
        self.errors.len() + self.missing_required.len()
    }
}

/// Validates the rendered inputs of every visible step.
///
/// Hidden inputs (or inputs under a hidden section or step) are neither
/// required nor checked.
pub fn validate(spec: &FormSpec, item: &Value) -> ValidationResult {
    let tree = resolve_tree(spec, item, VisibilityMode::Edit);
    let mut findings = Findings::default();
    let mut steps = BTreeMap::new();

    for step in &spec.steps {
        let before = findings.count();
        for section in &step.sections {
            if tree.is_rendered(&section.id) {
                validate_nodes(&section.children, item, &tree, None, &mut findings);
            }
        }
        steps.insert(step.id.clone(), findings.count() > before);
    }

    ValidationResult {
        valid: findings.count() == 0,
        errors: findings.errors,
        missing_required: findings.missing_required,
        steps,
    }
}

fn validate_nodes(
    children: &[NodeSpec],
    item: &Value,
    tree: &VisibilityTree,
    prefix: Option<&str>,
    findings: &mut Findings,
) {
    for child in children {
        let key = scoped_key(prefix, child.id());
        if !tree.is_rendered(&key) {
            continue;
        }
        match child {
            NodeSpec::Input(input) => {
                let path = input.bound_path();
                match path.get(item) {
                    value if is_missing_or_empty(value) => {
                        if input.required {
                            findings.missing_required.push(key);
                        }
                    }
                    Some(value) => {
                        if let Some(error) = validate_value(input, value, &key) {
                            findings.errors.push(error);
                        }
                    }
                    None => {}
                }
            }
            NodeSpec::Section(section) => {
                validate_nodes(&section.children, item, tree, prefix, findings);
            }
            NodeSpec::Array(array) => {
                let elements = array_elements(array, item);
                if array.required && elements.is_empty() {
                    findings.missing_required.push(key.clone());
                }
                for (position, element) in elements.into_iter().enumerate() {
                    let element_key = element_key(&key, position);
                    validate_nodes(&array.children, element, tree, Some(&element_key), findings);
                }
            }
        }
    }
}

/// Checks a non-empty value against the input's kind, options and rules.
pub fn validate_value(input: &InputSpec, value: &Value, key: &str) -> Option<ValidationError> {
    if !matches_kind(input.kind, value) {
        return Some(base_error(input, key, "type mismatch", "type_mismatch"));
    }

    if !input.options.is_empty() && !matches_options(input, value) {
        return Some(base_error(input, key, "invalid option", "option_mismatch"));
    }

    if let Some(constraint) = &input.constraint
        && let Some(error) = enforce_constraint(input, key, value, constraint)
    {
        return Some(error);
    }

    if let Some(text) = value.as_str() {
        for validator in &input.validators {
            if let Some(message) = validators::check(*validator, text) {
                return Some(base_error(input, key, message, "invalid_value"));
            }
        }
    }

    None
}

fn matches_kind(kind: InputKind, value: &Value) -> bool {
    match kind {
        InputKind::Text | InputKind::TextArea => value.is_string(),
        InputKind::Number => value.is_number(),
        InputKind::Checkbox => {
            value.is_boolean() || matches!(value.as_str(), Some("true") | Some("false"))
        }
        InputKind::Select | InputKind::Radio | InputKind::Tiles => {
            !value.is_array() && !value.is_object()
        }
        InputKind::MultiSelect | InputKind::Strings => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        InputKind::KeyValue => value
            .as_object()
            .is_some_and(|map| map.values().all(Value::is_string)),
    }
}

fn matches_options(input: &InputSpec, value: &Value) -> bool {
    let allowed: Vec<Value> = input.options.iter().map(|option| option.value()).collect();
    match value {
        Value::Array(items) => items.iter().all(|item| allowed.contains(item)),
        other => allowed.contains(other),
    }
}

fn enforce_constraint(
    input: &InputSpec,
    key: &str,
    value: &Value,
    constraint: &Constraint,
) -> Option<ValidationError> {
    if let Some(pattern) = &constraint.pattern
        && let Some(text) = value.as_str()
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return Some(base_error(
            input,
            key,
            "value does not match pattern",
            "pattern_mismatch",
        ));
    }

    if let Some(min_len) = constraint.min_len
        && let Some(text) = value.as_str()
        && text.chars().count() < min_len
    {
        return Some(base_error(
            input,
            key,
            "string shorter than min length",
            "min_length",
        ));
    }

    if let Some(max_len) = constraint.max_len
        && let Some(text) = value.as_str()
        && text.chars().count() > max_len
    {
        return Some(base_error(
            input,
            key,
            "string longer than max length",
            "max_length",
        ));
    }

    if let Some(min) = constraint.min
        && let Some(value) = value.as_f64()
        && value < min
    {
        return Some(base_error(input, key, "value below minimum", "min"));
    }

    if let Some(max) = constraint.max
        && let Some(value) = value.as_f64()
        && value > max
    {
        return Some(base_error(input, key, "value above maximum", "max"));
    }

    None
}

fn base_error(input: &InputSpec, key: &str, message: &str, code: &str) -> ValidationError {
    ValidationError {
        key: key.to_string(),
        path: input.bound_path().to_string(),
        message: message.into(),
        code: code.into(),
    }
}
