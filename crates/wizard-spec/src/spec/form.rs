use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;
use crate::spec::array::ArrayInputSpec;
use crate::spec::input::InputSpec;
use crate::spec::node::{NodeSpec, SectionSpec};

/// One page of the wizard. Steps only hold sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Expr>,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl StepSpec {
    /// Inputs of this step bound to the root item, in declaration order.
    pub fn inputs(&self) -> Vec<&InputSpec> {
        let mut inputs = Vec::new();
        for section in &self.sections {
            collect_inputs(&section.children, &mut inputs);
        }
        inputs
    }

    /// Array inputs of this step bound to the root item.
    pub fn arrays(&self) -> Vec<&ArrayInputSpec> {
        let mut arrays = Vec::new();
        for section in &self.sections {
            collect_arrays(&section.children, &mut arrays);
        }
        arrays
    }
}

/// Top-level wizard definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template the document is seeded from when the wizard opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
    pub steps: Vec<StepSpec>,
}

impl FormSpec {
    pub fn step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Inputs bound directly to the root item, in declaration order.
    ///
    /// Inputs nested inside array inputs are excluded since their paths are
    /// relative to an element.
    pub fn root_inputs(&self) -> Vec<&InputSpec> {
        self.steps.iter().flat_map(StepSpec::inputs).collect()
    }

    /// Array inputs bound to the root item.
    pub fn root_arrays(&self) -> Vec<&ArrayInputSpec> {
        self.steps.iter().flat_map(StepSpec::arrays).collect()
    }

    pub fn array(&self, id: &str) -> Option<&ArrayInputSpec> {
        self.root_arrays().into_iter().find(|array| array.id == id)
    }
}

pub(crate) fn collect_inputs<'a>(children: &'a [NodeSpec], inputs: &mut Vec<&'a InputSpec>) {
    for child in children {
        match child {
            NodeSpec::Input(input) => inputs.push(input),
            NodeSpec::Section(section) => collect_inputs(&section.children, inputs),
            NodeSpec::Array(_) => {}
        }
    }
}

fn collect_arrays<'a>(children: &'a [NodeSpec], arrays: &mut Vec<&'a ArrayInputSpec>) {
    for child in children {
        match child {
            NodeSpec::Array(array) => arrays.push(array),
            NodeSpec::Section(section) => collect_arrays(&section.children, arrays),
            NodeSpec::Input(_) => {}
        }
    }
}
