use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::path::{Path, PathError};

type Subscriber = Box<dyn FnMut(&Value, u64)>;

/// Owner of the document being edited.
///
/// Mutations do not notify on their own; callers invoke [`ItemContext::update`]
/// once a change is complete so subscribers recompute against a settled
/// document.
pub struct ItemContext {
    item: Value,
    revision: u64,
    subscribers: Vec<Subscriber>,
}

impl ItemContext {
    pub fn new(item: Value) -> Self {
        Self {
            item,
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn item(&self) -> &Value {
        &self.item
    }

    pub fn item_mut(&mut self) -> &mut Value {
        &mut self.item
    }

    pub fn set_item(&mut self, item: Value) {
        self.item = item;
    }

    pub fn into_item(self) -> Value {
        self.item
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        path.get(&self.item)
    }

    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), PathError> {
        path.set(&mut self.item, value)
    }

    pub fn unset(&mut self, path: &Path) -> Result<Option<Value>, PathError> {
        path.unset(&mut self.item)
    }

    /// Registers a callback run synchronously on every [`update`](Self::update).
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Value, u64) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Signals that the document changed.
    pub fn update(&mut self) {
        self.revision += 1;
        trace!(revision = self.revision, "document updated");
        for subscriber in &mut self.subscribers {
            subscriber(&self.item, self.revision);
        }
    }

    /// Relative view rooted at `base`, e.g. one array element.
    pub fn scope(&mut self, base: Path) -> ItemScope<'_> {
        ItemScope {
            context: self,
            base,
        }
    }
}

impl Default for ItemContext {
    fn default() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}

impl fmt::Debug for ItemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemContext")
            .field("item", &self.item)
            .field("revision", &self.revision)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Mutable view of a sub-document addressed relative to `base`.
pub struct ItemScope<'a> {
    context: &'a mut ItemContext,
    base: Path,
}

impl ItemScope<'_> {
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn item(&self) -> Option<&Value> {
        self.context.get(&self.base)
    }

    pub fn set_item(&mut self, item: Value) -> Result<(), PathError> {
        self.context.set(&self.base, item)
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.context.get(&self.base.join(path))
    }

    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), PathError> {
        let absolute = self.base.join(path);
        self.context.set(&absolute, value)
    }

    pub fn unset(&mut self, path: &Path) -> Result<Option<Value>, PathError> {
        let absolute = self.base.join(path);
        self.context.unset(&absolute)
    }

    pub fn scope(&mut self, path: &Path) -> ItemScope<'_> {
        let base = self.base.join(path);
        self.context.scope(base)
    }

    pub fn update(&mut self) {
        self.context.update();
    }
}
