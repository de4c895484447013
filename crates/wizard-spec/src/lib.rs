#![allow(missing_docs)]

pub mod array;
pub mod context;
pub mod empty;
pub mod expr;
pub mod path;
pub mod review;
pub mod session;
pub mod spec;
pub mod summary;
pub mod validate;
pub mod validators;
pub mod visibility;

pub use array::{ArrayEditor, ArrayError, ArrayState, CollapsePolicy, ItemKey};
pub use context::{ItemContext, ItemScope};
pub use empty::{is_empty_value, is_missing_or_empty};
pub use expr::{Expr, is_truthy};
pub use path::{Path, PathError, Segment};
pub use review::{
    ReviewError, ReviewItem, ReviewPayload, ReviewStep, build_review, render_review_json,
    render_review_text, to_display_text, to_submission,
};
pub use session::{Cursor, OptionsState, SessionError, WizardSession};
pub use spec::{
    ArrayInputSpec, ChangeEffect, CollapsedContent, Constraint, DropdownItem, FormSpec,
    InputKind, InputSpec, NodeSpec, OptionSpec, SectionSpec, StepSpec, Validator,
};
pub use summary::{TemplateError, collapsed_summary, display_value};
pub use validate::{ValidationError, ValidationResult, validate, validate_value};
pub use visibility::{
    NodeKind, NodeVisibility, VisibilityMap, VisibilityMode, VisibilityTree, resolve_tree,
    resolve_visibility,
};

/// JSON Schema describing [`FormSpec`] documents.
pub fn form_schema() -> serde_json::Value {
    schemars::schema_for!(FormSpec).to_value()
}
