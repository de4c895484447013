use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::path::{PathError, value_kind};
use crate::spec::ArrayInputSpec;
use crate::summary::{TemplateError, collapsed_summary};

#[derive(Debug, Error)]
pub enum ArrayError {
    #[error("index {index} out of range for '{id}' ({len} items)")]
    OutOfRange { id: String, index: usize, len: usize },
    #[error("array input '{id}' is not sortable")]
    NotSortable { id: String },
    #[error("'{path}' holds {found}, not an array")]
    NotAnArray { path: String, found: &'static str },
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Synthetic identity of a collection element, stable across reorders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemKey(u64);

/// What happens to expansion when the expanded element is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapsePolicy {
    #[default]
    CollapseAll,
    ExpandNeighbor,
}

/// UI state of one array input, kept apart from the document.
///
/// `keys` runs parallel to the filtered view of the array.
#[derive(Debug, Clone, Default)]
pub struct ArrayState {
    keys: Vec<ItemKey>,
    next_key: u64,
    expanded: Option<ItemKey>,
    policy: CollapsePolicy,
}

impl ArrayState {
    pub fn with_policy(policy: CollapsePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> &[ItemKey] {
        &self.keys
    }

    pub fn expanded_index(&self) -> Option<usize> {
        let expanded = self.expanded?;
        self.keys.iter().position(|key| *key == expanded)
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.is_some() && self.keys.get(index).copied() == self.expanded
    }

    /// Expands `index`, or collapses it when it already is expanded.
    pub fn toggle(&mut self, index: usize) {
        let key = self.keys.get(index).copied();
        self.expanded = if self.expanded == key { None } else { key };
    }

    pub fn collapse(&mut self) {
        self.expanded = None;
    }

    fn fresh_key(&mut self) -> ItemKey {
        let key = ItemKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Reconciles with the current element count after external edits.
    fn sync(&mut self, len: usize) {
        while self.keys.len() < len {
            let key = self.fresh_key();
            self.keys.push(key);
        }
        self.keys.truncate(len);
        if let Some(expanded) = self.expanded
            && !self.keys.contains(&expanded)
        {
            self.expanded = None;
        }
    }
}

/// Editing operations over the array an [`ArrayInputSpec`] is bound to.
///
/// Indices are positions in the filtered view. Every mutation is translated
/// to the underlying array so non-matching elements keep their positions.
pub struct ArrayEditor<'a> {
    spec: &'a ArrayInputSpec,
    item: &'a mut Value,
    state: &'a mut ArrayState,
}

impl<'a> ArrayEditor<'a> {
    /// `item` is the current item the array path is relative to.
    pub fn new(spec: &'a ArrayInputSpec, item: &'a mut Value, state: &'a mut ArrayState) -> Self {
        let mut editor = Self { spec, item, state };
        let len = editor.len();
        editor.state.sync(len);
        editor
    }

    fn source(&self) -> &[Value] {
        match self.spec.bound_path().get(self.item) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    fn source_mut(&mut self) -> Result<&mut Vec<Value>, ArrayError> {
        let path = self.spec.bound_path();
        let needs_init = match path.get(self.item) {
            None | Some(Value::Null) => true,
            Some(Value::Array(_)) => false,
            Some(other) => {
                return Err(ArrayError::NotAnArray {
                    path: path.to_string(),
                    found: value_kind(other),
                });
            }
        };
        if needs_init {
            path.set(self.item, Value::Array(Vec::new()))?;
        }
        match path.get_mut(self.item) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ArrayError::NotAnArray {
                path: path.to_string(),
                found: "null",
            }),
        }
    }

    /// Positions in the underlying array of the elements in the filtered view.
    pub fn true_indices(&self) -> Vec<usize> {
        self.source()
            .iter()
            .enumerate()
            .filter(|(_, element)| self.spec.matches(element))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn true_index(&self, index: usize) -> Result<usize, ArrayError> {
        let indices = self.true_indices();
        indices
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(index, indices.len()))
    }

    pub fn items(&self) -> Vec<&Value> {
        self.source()
            .iter()
            .filter(|element| self.spec.matches(element))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> &ArrayState {
        self.state
    }

    pub fn toggle(&mut self, index: usize) {
        self.state.toggle(index);
    }

    /// Appends a copy of `template`; returns its filtered index when it matches the filter.
    pub fn add(&mut self, template: &Value) -> Result<Option<usize>, ArrayError> {
        self.add_all(std::slice::from_ref(template))
    }

    /// Appends a copy of the form spec's `new_value`.
    pub fn add_new(&mut self) -> Result<Option<usize>, ArrayError> {
        let template = self.spec.template();
        self.add(&template)
    }

    /// Appends several elements; the last matching one becomes expanded.
    pub fn add_all(&mut self, values: &[Value]) -> Result<Option<usize>, ArrayError> {
        let spec = self.spec;
        let source = self.source_mut()?;
        let mut matching = 0;
        for value in values {
            if spec.matches(value) {
                matching += 1;
            }
            source.push(value.clone());
        }

        let mut last = None;
        for _ in 0..matching {
            let key = self.state.fresh_key();
            self.state.keys.push(key);
            last = Some(key);
        }
        if let Some(key) = last
            && !spec.default_collapsed
        {
            self.state.expanded = Some(key);
        }
        debug!(array = %spec.id, count = values.len(), "added array items");
        Ok(last.and_then(|key| self.state.keys.iter().position(|k| *k == key)))
    }

    /// Removes the element at filtered `index`.
    pub fn remove(&mut self, index: usize) -> Result<Value, ArrayError> {
        let true_index = self.true_index(index)?;
        let removed = self.source_mut()?.remove(true_index);
        let key = self.state.keys.remove(index);
        if self.state.expanded == Some(key) {
            self.state.expanded = match self.state.policy {
                CollapsePolicy::CollapseAll => None,
                CollapsePolicy::ExpandNeighbor => self
                    .state
                    .keys
                    .get(index)
                    .or_else(|| index.checked_sub(1).and_then(|prev| self.state.keys.get(prev)))
                    .copied(),
            };
        }
        debug!(array = %self.spec.id, index, true_index, "removed array item");
        Ok(removed)
    }

    /// Moves the element at filtered `from` to filtered `to`.
    ///
    /// Only the slots holding matching elements are permuted.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), ArrayError> {
        self.ensure_sortable()?;
        let indices = self.true_indices();
        for index in [from, to] {
            if index >= indices.len() {
                return Err(self.out_of_range(index, indices.len()));
            }
        }
        if from == to {
            return Ok(());
        }

        let source = self.source_mut()?;
        let mut matched: Vec<Value> = indices
            .iter()
            .map(|slot| std::mem::take(&mut source[*slot]))
            .collect();
        let moved = matched.remove(from);
        matched.insert(to, moved);
        for (slot, value) in indices.iter().zip(matched) {
            source[*slot] = value;
        }

        let key = self.state.keys.remove(from);
        self.state.keys.insert(to, key);
        debug!(array = %self.spec.id, from, to, "moved array item");
        Ok(())
    }

    pub fn move_up(&mut self, index: usize) -> Result<(), ArrayError> {
        self.ensure_sortable()?;
        match index.checked_sub(1) {
            Some(previous) => self.move_item(index, previous),
            None => Ok(()),
        }
    }

    pub fn move_down(&mut self, index: usize) -> Result<(), ArrayError> {
        self.ensure_sortable()?;
        if index + 1 >= self.len() {
            return Ok(());
        }
        self.move_item(index, index + 1)
    }

    /// Adds the template element when the array must not be empty.
    pub fn ensure_not_empty(&mut self) -> Result<bool, ArrayError> {
        if self.spec.disallow_empty && self.is_empty() {
            self.add_new()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn collapsed_summary(&self, index: usize) -> Result<Option<String>, ArrayError> {
        let items = self.items();
        let element = items
            .get(index)
            .ok_or_else(|| self.out_of_range(index, items.len()))?;
        Ok(collapsed_summary(self.spec, element)?)
    }

    fn ensure_sortable(&self) -> Result<(), ArrayError> {
        if self.spec.sortable {
            Ok(())
        } else {
            Err(ArrayError::NotSortable {
                id: self.spec.id.clone(),
            })
        }
    }

    fn out_of_range(&self, index: usize, len: usize) -> ArrayError {
        ArrayError::OutOfRange {
            id: self.spec.id.clone(),
            index,
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::path::Path;
    use serde_json::json;

    fn subscriptions() -> ArrayInputSpec {
        let mut spec = ArrayInputSpec::new("subscriptions");
        spec.path = Some(Path::root());
        spec.filter = Some(Expr::equals(Path::parse("kind").unwrap(), "X"));
        spec.new_value = Some(json!({ "kind": "X", "name": "" }));
        spec.sortable = true;
        spec
    }

    #[test]
    fn add_creates_missing_array_and_expands() {
        let mut spec = ArrayInputSpec::new("hooks");
        spec.path = Some(Path::parse("spec.hooks").unwrap());
        spec.new_value = Some(json!({ "name": "" }));
        let mut item = json!({ "spec": {} });
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);

        assert_eq!(editor.add_new().unwrap(), Some(0));
        assert_eq!(editor.state().expanded_index(), Some(0));
        assert_eq!(editor.add_new().unwrap(), Some(1));
        assert_eq!(editor.state().expanded_index(), Some(1));
        assert_eq!(item, json!({ "spec": { "hooks": [{ "name": "" }, { "name": "" }] } }));
    }

    #[test]
    fn added_template_is_a_copy() {
        let spec = ArrayInputSpec::new("items");
        let template = json!({ "name": "a" });
        let mut item = json!({});
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        editor.add(&template).unwrap();
        editor.add(&template).unwrap();
        drop(editor);
        Path::parse("items[0].name")
            .unwrap()
            .set(&mut item, json!("changed"))
            .unwrap();
        assert_eq!(item["items"][1]["name"], "a");
        assert_eq!(template, json!({ "name": "a" }));
    }

    #[test]
    fn remove_through_filter_leaves_other_kinds_untouched() {
        let spec = subscriptions();
        let mut item = json!([
            { "kind": "X", "name": "A" },
            { "kind": "Y", "name": "B" },
            { "kind": "X", "name": "C" }
        ]);
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        let removed = editor.remove(0).unwrap();
        assert_eq!(removed["name"], "A");
        assert_eq!(
            item,
            json!([{ "kind": "Y", "name": "B" }, { "kind": "X", "name": "C" }])
        );
    }

    #[test]
    fn remove_second_match_translates_index() {
        let spec = subscriptions();
        let mut item = json!([
            { "kind": "X", "name": "A" },
            { "kind": "Y", "name": "B" },
            { "kind": "X", "name": "C" }
        ]);
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        assert_eq!(editor.true_index(1).unwrap(), 2);
        editor.remove(1).unwrap();
        assert_eq!(
            item,
            json!([{ "kind": "X", "name": "A" }, { "kind": "Y", "name": "B" }])
        );
    }

    #[test]
    fn move_permutes_only_matching_slots() {
        let spec = subscriptions();
        let mut item = json!([
            { "kind": "X", "name": "A" },
            { "kind": "Y", "name": "B" },
            { "kind": "X", "name": "C" },
            { "kind": "X", "name": "D" }
        ]);
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        editor.move_item(2, 0).unwrap();
        let names: Vec<_> = item
            .as_array()
            .unwrap()
            .iter()
            .map(|element| element["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["D", "B", "A", "C"]);
    }

    #[test]
    fn expansion_follows_moved_item_and_collapses_on_remove() {
        let mut spec = ArrayInputSpec::new("items");
        spec.sortable = true;
        let mut item = json!({ "items": [] });
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        editor.add(&json!({ "n": 1 })).unwrap();
        editor.add(&json!({ "n": 2 })).unwrap();
        editor.add(&json!({ "n": 3 })).unwrap();
        editor.toggle(0);
        assert_eq!(editor.state().expanded_index(), Some(0));

        editor.move_down(0).unwrap();
        assert_eq!(editor.state().expanded_index(), Some(1));

        editor.remove(0).unwrap();
        assert_eq!(editor.state().expanded_index(), Some(0));

        editor.remove(0).unwrap();
        assert_eq!(editor.state().expanded_index(), None);
        assert_eq!(item, json!({ "items": [{ "n": 3 }] }));
    }

    #[test]
    fn moves_require_a_sortable_array() {
        let spec = ArrayInputSpec::new("items");
        let mut item = json!({ "items": [{ "n": 1 }, { "n": 2 }] });
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        assert!(matches!(
            editor.move_item(1, 0),
            Err(ArrayError::NotSortable { ref id }) if id.as_str() == "items"
        ));
        assert!(matches!(editor.move_up(1), Err(ArrayError::NotSortable { .. })));
        assert!(matches!(editor.move_down(0), Err(ArrayError::NotSortable { .. })));
        assert_eq!(item, json!({ "items": [{ "n": 1 }, { "n": 2 }] }));
    }

    #[test]
    fn neighbor_policy_expands_next_item() {
        let spec = ArrayInputSpec::new("items");
        let mut item = json!({ "items": [{ "n": 1 }, { "n": 2 }] });
        let mut state = ArrayState::with_policy(CollapsePolicy::ExpandNeighbor);
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        editor.toggle(1);
        editor.remove(1).unwrap();
        assert_eq!(editor.state().expanded_index(), Some(0));
    }

    #[test]
    fn default_collapsed_does_not_expand_new_items() {
        let mut spec = ArrayInputSpec::new("items");
        spec.default_collapsed = true;
        let mut item = json!({});
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        editor.add_new().unwrap();
        assert_eq!(editor.state().expanded_index(), None);
    }

    #[test]
    fn disallow_empty_seeds_one_item() {
        let mut spec = ArrayInputSpec::new("items");
        spec.disallow_empty = true;
        spec.new_value = Some(json!({ "key": "" }));
        let mut item = json!({});
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        assert!(editor.ensure_not_empty().unwrap());
        assert!(!editor.ensure_not_empty().unwrap());
        assert_eq!(item, json!({ "items": [{ "key": "" }] }));
    }

    #[test]
    fn out_of_range_and_scalar_targets_fail() {
        let spec = ArrayInputSpec::new("items");
        let mut item = json!({ "items": "oops" });
        let mut state = ArrayState::default();
        let mut editor = ArrayEditor::new(&spec, &mut item, &mut state);
        assert!(matches!(editor.remove(0), Err(ArrayError::OutOfRange { .. })));
        assert!(matches!(
            editor.add_new(),
            Err(ArrayError::NotAnArray { found: "string", .. })
        ));
    }
}
