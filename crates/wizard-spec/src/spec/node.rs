use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::spec::array::ArrayInputSpec;
use crate::spec::input::InputSpec;

/// Group of inputs inside a step; sections may nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Expr>,
    /// Drop the values of hidden inputs from the submitted document.
    #[serde(default)]
    pub exclude_hidden: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeSpec {
    Input(InputSpec),
    Section(SectionSpec),
    Array(ArrayInputSpec),
}

impl NodeSpec {
    pub fn id(&self) -> &str {
        match self {
            NodeSpec::Input(input) => &input.id,
            NodeSpec::Section(section) => &section.id,
            NodeSpec::Array(array) => &array.id,
        }
    }
}
