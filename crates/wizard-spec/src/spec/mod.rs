pub mod array;
pub mod form;
pub mod input;
pub mod node;

pub use array::{ArrayInputSpec, CollapsedContent, DropdownItem};
pub use form::{FormSpec, StepSpec};
pub use input::{ChangeEffect, Constraint, InputKind, InputSpec, OptionSpec, Validator};
pub use node::{NodeSpec, SectionSpec};
