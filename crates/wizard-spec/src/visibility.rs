use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::empty::is_missing_or_empty;
use crate::expr::Expr;
use crate::spec::{ArrayInputSpec, FormSpec, InputSpec, NodeSpec, SectionSpec, StepSpec};

pub type VisibilityMap = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    /// Inputs are shown unless their predicate hides them.
    Edit,
    /// Read-only summary: empty inputs and empty arrays are hidden as well.
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Step,
    Section,
    Input,
    Array,
    Element,
}

/// Visibility of one node of the tree.
///
/// `visible` is the bottom-up result (own predicate plus children);
/// `rendered` additionally requires every ancestor to be visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeVisibility {
    pub id: String,
    pub key: String,
    pub kind: NodeKind,
    pub visible: bool,
    pub rendered: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeVisibility>,
}

impl NodeVisibility {
    fn mask(&mut self, parent_rendered: bool) {
        self.rendered = parent_rendered && self.visible;
        let rendered = self.rendered;
        for child in &mut self.children {
            child.mask(rendered);
        }
    }

    fn flatten(&self, map: &mut VisibilityMap) {
        map.insert(self.key.clone(), self.rendered);
        for child in &self.children {
            child.flatten(map);
        }
    }

    fn find(&self, key: &str) -> Option<&NodeVisibility> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityTree {
    pub steps: Vec<NodeVisibility>,
}

impl VisibilityTree {
    pub fn to_map(&self) -> VisibilityMap {
        let mut map = VisibilityMap::new();
        for step in &self.steps {
            step.flatten(&mut map);
        }
        map
    }

    pub fn node(&self, key: &str) -> Option<&NodeVisibility> {
        self.steps.iter().find_map(|step| step.find(key))
    }

    pub fn is_rendered(&self, key: &str) -> bool {
        self.node(key).is_some_and(|node| node.rendered)
    }

    pub fn visible_steps(&self) -> impl Iterator<Item = &NodeVisibility> {
        self.steps.iter().filter(|step| step.visible)
    }
}

/// Key of a node nested under `prefix` (an array element key) or the bare id.
pub fn scoped_key(prefix: Option<&str>, id: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{id}"),
        None => id.to_string(),
    }
}

/// Key of the `position`-th (0-based, filtered view) element of an array.
pub fn element_key(array_key: &str, position: usize) -> String {
    format!("{array_key}-{}", position + 1)
}

fn hidden_by(predicate: Option<&Expr>, item: &Value) -> bool {
    predicate.is_some_and(|expr| expr.evaluate(item))
}

pub fn input_visible(input: &InputSpec, item: &Value, mode: VisibilityMode) -> bool {
    if hidden_by(input.hidden.as_ref(), item) {
        return false;
    }
    match mode {
        VisibilityMode::Edit => true,
        VisibilityMode::Review => !is_missing_or_empty(input.bound_path().get(item)),
    }
}

pub fn section_visible(section: &SectionSpec, item: &Value, mode: VisibilityMode) -> bool {
    section_node(section, item, mode, None).visible
}

pub fn step_visible(step: &StepSpec, item: &Value, mode: VisibilityMode) -> bool {
    step_node(step, item, mode).visible
}

/// Elements of the array bound by `array`, restricted to its filter.
pub fn array_elements<'a>(array: &ArrayInputSpec, item: &'a Value) -> Vec<&'a Value> {
    match array.bound_path().get(item) {
        Some(Value::Array(elements)) => elements
            .iter()
            .filter(|element| array.matches(element))
            .collect(),
        _ => Vec::new(),
    }
}

fn input_node(
    input: &InputSpec,
    item: &Value,
    mode: VisibilityMode,
    prefix: Option<&str>,
) -> NodeVisibility {
    NodeVisibility {
        id: input.id.clone(),
        key: scoped_key(prefix, &input.id),
        kind: NodeKind::Input,
        visible: input_visible(input, item, mode),
        rendered: false,
        children: Vec::new(),
    }
}

fn array_node(
    array: &ArrayInputSpec,
    item: &Value,
    mode: VisibilityMode,
    prefix: Option<&str>,
) -> NodeVisibility {
    let key = scoped_key(prefix, &array.id);
    let elements = array_elements(array, item);
    let own = !hidden_by(array.hidden.as_ref(), item);
    let visible = own
        && match mode {
            VisibilityMode::Edit => true,
            VisibilityMode::Review => !elements.is_empty(),
        };

    let children = elements
        .iter()
        .enumerate()
        .map(|(position, element)| {
            let element_key = element_key(&key, position);
            let children = nodes(&array.children, element, mode, Some(&element_key));
            NodeVisibility {
                id: position.to_string(),
                key: element_key,
                kind: NodeKind::Element,
                visible,
                rendered: false,
                children,
            }
        })
        .collect();

    NodeVisibility {
        id: array.id.clone(),
        key,
        kind: NodeKind::Array,
        visible,
        rendered: false,
        children,
    }
}

fn section_node(
    section: &SectionSpec,
    item: &Value,
    mode: VisibilityMode,
    prefix: Option<&str>,
) -> NodeVisibility {
    let children = nodes(&section.children, item, mode, prefix);
    let visible =
        !hidden_by(section.hidden.as_ref(), item) && children.iter().any(|child| child.visible);
    NodeVisibility {
        id: section.id.clone(),
        key: scoped_key(prefix, &section.id),
        kind: NodeKind::Section,
        visible,
        rendered: false,
        children,
    }
}

fn nodes(
    children: &[NodeSpec],
    item: &Value,
    mode: VisibilityMode,
    prefix: Option<&str>,
) -> Vec<NodeVisibility> {
    children
        .iter()
        .map(|child| match child {
            NodeSpec::Input(input) => input_node(input, item, mode, prefix),
            NodeSpec::Section(section) => section_node(section, item, mode, prefix),
            NodeSpec::Array(array) => array_node(array, item, mode, prefix),
        })
        .collect()
}

fn step_node(step: &StepSpec, item: &Value, mode: VisibilityMode) -> NodeVisibility {
    let sections: Vec<_> = step
        .sections
        .iter()
        .map(|section| section_node(section, item, mode, None))
        .collect();
    let visible =
        !hidden_by(step.hidden.as_ref(), item) && sections.iter().any(|section| section.visible);
    NodeVisibility {
        id: step.id.clone(),
        key: step.id.clone(),
        kind: NodeKind::Step,
        visible,
        rendered: false,
        children: sections,
    }
}

/// Computes the visibility of every node against the current document.
pub fn resolve_tree(spec: &FormSpec, item: &Value, mode: VisibilityMode) -> VisibilityTree {
    let mut steps: Vec<_> = spec
        .steps
        .iter()
        .map(|step| step_node(step, item, mode))
        .collect();
    for step in &mut steps {
        step.mask(true);
    }
    VisibilityTree { steps }
}

/// Flattened form of [`resolve_tree`]: scoped key to rendered flag.
pub fn resolve_visibility(spec: &FormSpec, item: &Value, mode: VisibilityMode) -> VisibilityMap {
    resolve_tree(spec, item, mode).to_map()
}
