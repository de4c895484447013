use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expr::Expr;
use crate::path::Path;
use crate::spec::form::collect_inputs;
use crate::spec::input::InputSpec;
use crate::spec::node::NodeSpec;

/// How a collapsed array element is summarised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CollapsedContent {
    /// Show the value at a path inside the element.
    Path(#[schemars(with = "String")] Path),
    /// Render a handlebars template with the element as context.
    Template(String),
}

/// An "add" menu entry producing one or more new elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DropdownItem {
    pub label: String,
    pub values: Vec<Value>,
}

/// Editable collection of sub-items; `children` are bound relative to each element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArrayInputSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Location of the array; `""` means the current item is the array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub path: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Expr>,
    /// Restricts the view to matching elements of a mixed array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropdown_items: Vec<DropdownItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed_content: Option<CollapsedContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed_placeholder: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub default_collapsed: bool,
    #[serde(default)]
    pub disallow_empty: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl ArrayInputSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            path: None,
            hidden: None,
            filter: None,
            new_value: None,
            dropdown_items: Vec::new(),
            placeholder: None,
            collapsed_content: None,
            collapsed_placeholder: None,
            sortable: false,
            default_collapsed: false,
            disallow_empty: false,
            required: false,
            children: Vec::new(),
        }
    }

    pub fn bound_path(&self) -> Path {
        self.path
            .clone()
            .unwrap_or_else(|| Path::root().key(self.id.clone()))
    }

    /// Template for newly added elements; an empty record when unset.
    pub fn template(&self) -> Value {
        self.new_value
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Inputs bound relative to each element.
    pub fn inputs(&self) -> Vec<&InputSpec> {
        let mut inputs = Vec::new();
        collect_inputs(&self.children, &mut inputs);
        inputs
    }

    pub fn dropdown_item(&self, label: &str) -> Option<&DropdownItem> {
        self.dropdown_items.iter().find(|item| item.label == label)
    }

    pub fn matches(&self, element: &Value) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|filter| filter.evaluate(element))
    }
}
