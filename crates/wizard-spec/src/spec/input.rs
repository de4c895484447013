use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;
use crate::path::Path;

/// Widget families; only the shape of the stored value matters to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Text,
    TextArea,
    Number,
    Checkbox,
    Select,
    Radio,
    Tiles,
    MultiSelect,
    KeyValue,
    Strings,
}

/// A select/radio/tile option, either a bare string or a label/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OptionSpec {
    Labeled { label: String, value: Value },
    Plain(String),
}

impl OptionSpec {
    pub fn label(&self) -> &str {
        match self {
            OptionSpec::Labeled { label, .. } => label,
            OptionSpec::Plain(value) => value,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            OptionSpec::Labeled { value, .. } => value.clone(),
            OptionSpec::Plain(value) => Value::String(value.clone()),
        }
    }
}

/// Simple value constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Named validation rules for resource-style values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    KubernetesName,
    Rfc1123Label,
    Rfc1035Label,
    WebUrl,
}

/// Assignment applied when the owning input's value changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeEffect {
    #[schemars(with = "String")]
    pub path: Path,
    /// `None` removes the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,
}

/// Leaf input bound to a path in the current item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InputSpec {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub path: Option<Path>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSpec>,
    /// Key of an asynchronous options provider supplying the choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_change: Vec<ChangeEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl InputSpec {
    pub fn new(id: impl Into<String>, kind: InputKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: String::new(),
            description: None,
            path: None,
            required: false,
            hidden: None,
            options: Vec::new(),
            options_provider: None,
            constraint: None,
            validators: Vec::new(),
            on_change: Vec::new(),
            placeholder: None,
        }
    }

    /// The bound path; without an explicit path the id is used as a single key.
    pub fn bound_path(&self) -> Path {
        self.path
            .clone()
            .unwrap_or_else(|| Path::root().key(self.id.clone()))
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}
