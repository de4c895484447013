use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::array::{ArrayEditor, ArrayError, ArrayState, CollapsePolicy};
use crate::context::ItemContext;
use crate::path::{Path, PathError, Segment};
use crate::review::{ReviewError, ReviewPayload, build_review, to_display_text, to_submission};
use crate::spec::{ChangeEffect, FormSpec, StepSpec};
use crate::validate::{ValidationResult, validate};
use crate::visibility::{VisibilityMap, VisibilityMode, VisibilityTree, resolve_tree};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("unknown array input '{0}'")]
    UnknownArray(String),
    #[error("array input '{array}' has no add option '{label}'")]
    UnknownDropdownItem { array: String, label: String },
    #[error("step '{0}' has validation errors")]
    StepInvalid(String),
    #[error("form has {0} validation problem(s)")]
    Invalid(usize),
    #[error("a submission is already in progress")]
    Submitting,
    #[error("the wizard was cancelled")]
    Cancelled,
    #[error("{0}")]
    Rejected(String),
}

/// Load state of an asynchronous options provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OptionsState {
    Loading,
    Ready { options: Vec<String> },
    Failed { message: String },
}

/// Where the wizard currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "at", content = "step", rename_all = "snake_case")]
pub enum Cursor {
    Step(String),
    Review,
}

/// A wizard being filled in: the document plus navigation, array and
/// submission state.
#[derive(Debug)]
pub struct WizardSession {
    spec: FormSpec,
    context: ItemContext,
    visibility: VisibilityTree,
    arrays: BTreeMap<String, ArrayState>,
    options: BTreeMap<String, OptionsState>,
    cursor: Cursor,
    show_validation: BTreeSet<String>,
    submit_error: Option<String>,
    submitting: bool,
    cancelled: bool,
}

impl WizardSession {
    /// Opens the wizard on a copy of the form spec's default data.
    pub fn new(spec: FormSpec) -> Self {
        let document = spec
            .default_data
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Self::with_document(spec, document)
    }

    /// Opens the wizard on an existing document, e.g. for editing.
    pub fn with_document(spec: FormSpec, document: Value) -> Self {
        let visibility = resolve_tree(&spec, &document, VisibilityMode::Edit);
        let cursor = visibility
            .visible_steps()
            .next()
            .map(|step| Cursor::Step(step.id.clone()))
            .unwrap_or(Cursor::Review);
        let mut session = Self {
            spec,
            context: ItemContext::new(document),
            visibility,
            arrays: BTreeMap::new(),
            options: BTreeMap::new(),
            cursor,
            show_validation: BTreeSet::new(),
            submit_error: None,
            submitting: false,
            cancelled: false,
        };
        session.seed_arrays();
        session
    }

    fn seed_arrays(&mut self) {
        let mut seeded = false;
        for array in self.spec.root_arrays() {
            let state = self.arrays.entry(array.id.clone()).or_default();
            let mut editor = ArrayEditor::new(array, self.context.item_mut(), state);
            match editor.ensure_not_empty() {
                Ok(added) => seeded |= added,
                Err(error) => warn!(array = %array.id, %error, "could not seed array input"),
            }
        }
        if seeded {
            self.context.update();
            self.recompute();
        }
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn item(&self) -> &Value {
        self.context.item()
    }

    pub fn into_item(self) -> Value {
        self.context.into_item()
    }

    pub fn revision(&self) -> u64 {
        self.context.revision()
    }

    /// Registers a callback run after every completed change.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Value, u64) + 'static) {
        self.context.subscribe(subscriber);
    }

    pub fn visibility(&self) -> &VisibilityTree {
        &self.visibility
    }

    pub fn visibility_map(&self) -> VisibilityMap {
        self.visibility.to_map()
    }

    pub fn is_rendered(&self, key: &str) -> bool {
        self.visibility.is_rendered(key)
    }

    fn recompute(&mut self) {
        self.visibility = resolve_tree(&self.spec, self.context.item(), VisibilityMode::Edit);
    }

    /// Writes `value` at `path`, then runs the change effects of the input
    /// bound there, then notifies subscribers and recomputes visibility.
    ///
    /// When the write or any effect fails the document is left as it was.
    pub fn set_value(&mut self, path: &Path, value: Value) -> Result<(), SessionError> {
        let previous = self.context.item().clone();
        let (base, effects) = self.effects_for(path);
        let applied = self.context.set(path, value).and_then(|()| {
            effects
                .iter()
                .try_for_each(|effect| apply_effect(&mut self.context, &base, effect))
        });
        if let Err(error) = applied {
            warn!(%path, %error, "value rejected, document restored");
            self.context.set_item(previous);
            return Err(error.into());
        }
        debug!(%path, effects = effects.len(), "value set");
        self.context.update();
        self.recompute();
        Ok(())
    }

    /// Removes the value at `path`.
    pub fn unset_value(&mut self, path: &Path) -> Result<Option<Value>, SessionError> {
        let removed = self.context.unset(path)?;
        self.context.update();
        self.recompute();
        Ok(removed)
    }

    /// Change effects of the input bound at `path`, with the item they apply to.
    fn effects_for(&self, path: &Path) -> (Path, Vec<ChangeEffect>) {
        if let Some(input) = self
            .spec
            .root_inputs()
            .into_iter()
            .find(|input| input.bound_path() == *path)
        {
            return (Path::root(), input.on_change.clone());
        }

        for array in self.spec.root_arrays() {
            let array_path = array.bound_path();
            let Some(rest) = path.segments().strip_prefix(array_path.segments()) else {
                continue;
            };
            let [Segment::Index(index), relative @ ..] = rest else {
                continue;
            };
            let relative = Path::from(relative.to_vec());
            if let Some(input) = array
                .inputs()
                .into_iter()
                .find(|input| input.bound_path() == relative)
            {
                return (array_path.index(*index), input.on_change.clone());
            }
        }
        (Path::root(), Vec::new())
    }

    pub fn array_state(&self, key: &str) -> Option<&ArrayState> {
        self.arrays.get(key)
    }

    pub fn set_collapse_policy(&mut self, key: &str, policy: CollapsePolicy) {
        self.arrays
            .insert(key.to_string(), ArrayState::with_policy(policy));
    }

    fn with_array<T>(
        &mut self,
        key: &str,
        op: impl FnOnce(&mut ArrayEditor<'_>) -> Result<T, ArrayError>,
    ) -> Result<T, SessionError> {
        let array = self
            .spec
            .array(key)
            .ok_or_else(|| SessionError::UnknownArray(key.to_string()))?;
        let state = self.arrays.entry(key.to_string()).or_default();
        let mut editor = ArrayEditor::new(array, self.context.item_mut(), state);
        let result = op(&mut editor)?;
        self.context.update();
        self.recompute();
        Ok(result)
    }

    /// Adds a copy of the array's template; returns its position in the filtered view.
    pub fn array_add(&mut self, key: &str) -> Result<Option<usize>, SessionError> {
        self.with_array(key, |editor| editor.add_new())
    }

    /// Adds the elements of the named "add" menu entry.
    pub fn array_add_dropdown(
        &mut self,
        key: &str,
        label: &str,
    ) -> Result<Option<usize>, SessionError> {
        let values = self
            .spec
            .array(key)
            .ok_or_else(|| SessionError::UnknownArray(key.to_string()))?
            .dropdown_item(label)
            .map(|item| item.values.clone())
            .ok_or_else(|| SessionError::UnknownDropdownItem {
                array: key.to_string(),
                label: label.to_string(),
            })?;
        self.with_array(key, |editor| editor.add_all(&values))
    }

    pub fn array_remove(&mut self, key: &str, index: usize) -> Result<Value, SessionError> {
        self.with_array(key, |editor| editor.remove(index))
    }

    pub fn array_move(&mut self, key: &str, from: usize, to: usize) -> Result<(), SessionError> {
        self.with_array(key, |editor| editor.move_item(from, to))
    }

    pub fn array_move_up(&mut self, key: &str, index: usize) -> Result<(), SessionError> {
        self.with_array(key, |editor| editor.move_up(index))
    }

    pub fn array_move_down(&mut self, key: &str, index: usize) -> Result<(), SessionError> {
        self.with_array(key, |editor| editor.move_down(index))
    }

    /// Expands or collapses one element; the document is not touched.
    pub fn array_toggle(&mut self, key: &str, index: usize) -> Result<(), SessionError> {
        let array = self
            .spec
            .array(key)
            .ok_or_else(|| SessionError::UnknownArray(key.to_string()))?;
        let state = self.arrays.entry(key.to_string()).or_default();
        ArrayEditor::new(array, self.context.item_mut(), state).toggle(index);
        Ok(())
    }

    pub fn array_summary(
        &mut self,
        key: &str,
        index: usize,
    ) -> Result<Option<String>, SessionError> {
        let array = self
            .spec
            .array(key)
            .ok_or_else(|| SessionError::UnknownArray(key.to_string()))?;
        let state = self.arrays.entry(key.to_string()).or_default();
        let editor = ArrayEditor::new(array, self.context.item_mut(), state);
        Ok(editor.collapsed_summary(index)?)
    }

    pub fn validate(&self) -> ValidationResult {
        validate(&self.spec, self.context.item())
    }

    pub fn visible_steps(&self) -> Vec<&StepSpec> {
        self.spec
            .steps
            .iter()
            .filter(|step| self.visibility.is_rendered(&step.id))
            .collect()
    }

    pub fn current_step(&self) -> &Cursor {
        &self.cursor
    }

    /// Whether inline validation messages are shown for a step.
    pub fn shows_validation(&self, step_id: &str) -> bool {
        self.show_validation.contains(step_id)
    }

    fn step_position(&self, step_id: &str) -> Option<usize> {
        self.spec.steps.iter().position(|step| step.id == step_id)
    }

    /// Moves to the next visible step, or to review after the last one.
    ///
    /// Refused while the current step has validation problems; the step then
    /// starts showing its messages.
    pub fn next_step(&mut self) -> Result<&Cursor, SessionError> {
        let Cursor::Step(current) = &self.cursor else {
            return Ok(&self.cursor);
        };
        let current = current.clone();
        if self.validate().step_has_error(&current) {
            self.show_validation.insert(current.clone());
            return Err(SessionError::StepInvalid(current));
        }

        let start = self.step_position(&current).map_or(0, |position| position + 1);
        self.cursor = self.spec.steps[start..]
            .iter()
            .find(|step| self.visibility.is_rendered(&step.id))
            .map(|step| Cursor::Step(step.id.clone()))
            .unwrap_or(Cursor::Review);
        debug!(cursor = ?self.cursor, "advanced wizard");
        Ok(&self.cursor)
    }

    /// Moves back to the previous visible step; stays put on the first one.
    pub fn previous_step(&mut self) -> &Cursor {
        let end = match &self.cursor {
            Cursor::Review => self.spec.steps.len(),
            Cursor::Step(current) => self.step_position(current).unwrap_or(0),
        };
        if let Some(step) = self.spec.steps[..end]
            .iter()
            .rev()
            .find(|step| self.visibility.is_rendered(&step.id))
        {
            self.cursor = Cursor::Step(step.id.clone());
        }
        &self.cursor
    }

    /// Jumps to a visible step, as from the review page's edit links.
    pub fn go_to_step(&mut self, step_id: &str) -> bool {
        if !self.visibility.is_rendered(step_id) {
            return false;
        }
        self.cursor = Cursor::Step(step_id.to_string());
        true
    }

    pub fn review(&self) -> Result<ReviewPayload, SessionError> {
        Ok(build_review(&self.spec, self.context.item())?)
    }

    pub fn display_text(&self) -> Result<String, SessionError> {
        Ok(to_display_text(self.context.item())?)
    }

    pub fn submission(&self) -> Value {
        to_submission(&self.spec, self.context.item())
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Message of the last rejected submission.
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Hands the submission document to `handler`.
    ///
    /// On rejection the message is kept as the submit error and the document
    /// stays as it was so the user can retry.
    pub fn submit<E: fmt::Display>(
        &mut self,
        handler: impl FnOnce(&Value) -> Result<(), E>,
    ) -> Result<(), SessionError> {
        if self.cancelled {
            return Err(SessionError::Cancelled);
        }
        if self.submitting {
            return Err(SessionError::Submitting);
        }
        let validation = self.validate();
        if !validation.valid {
            for (step, has_error) in &validation.steps {
                if *has_error {
                    self.show_validation.insert(step.clone());
                }
            }
            return Err(SessionError::Invalid(
                validation.errors.len() + validation.missing_required.len(),
            ));
        }

        self.submitting = true;
        self.submit_error = None;
        let submission = self.submission();
        let outcome = handler(&submission);
        self.submitting = false;

        match outcome {
            Ok(()) => {
                debug!(form = %self.spec.id, "submitted");
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                warn!(form = %self.spec.id, %message, "submission rejected");
                self.submit_error = Some(message.clone());
                Err(SessionError::Rejected(message))
            }
        }
    }

    /// Runs the cancel callback; later calls do nothing and return `false`.
    pub fn cancel(&mut self, handler: impl FnOnce()) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        debug!(form = %self.spec.id, "cancelled");
        handler();
        true
    }

    pub fn begin_options_load(&mut self, key: &str) {
        self.options.insert(key.to_string(), OptionsState::Loading);
    }

    /// Records the outcome of an options provider; failures keep their message verbatim.
    pub fn finish_options_load<E: fmt::Display>(
        &mut self,
        key: &str,
        result: Result<Vec<String>, E>,
    ) {
        let state = match result {
            Ok(options) => OptionsState::Ready { options },
            Err(error) => {
                let message = error.to_string();
                warn!(provider = key, %message, "options provider failed");
                OptionsState::Failed { message }
            }
        };
        self.options.insert(key.to_string(), state);
    }

    pub fn options_state(&self, key: &str) -> Option<&OptionsState> {
        self.options.get(key)
    }
}

fn apply_effect(
    context: &mut ItemContext,
    base: &Path,
    effect: &ChangeEffect,
) -> Result<(), PathError> {
    let mut scope = context.scope(base.clone());
    let applies = match (&effect.when, scope.item()) {
        (Some(when), Some(item)) => when.evaluate(item),
        (Some(_), None) => false,
        (None, _) => true,
    };
    if !applies {
        return Ok(());
    }
    match &effect.value {
        Some(value) => scope.set(&effect.path, value.clone()),
        None => scope.unset(&effect.path).map(|_| ()),
    }
}
