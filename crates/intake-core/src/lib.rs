//! Shared model for tax intake forms
//!
//! This crate holds the pieces both the wizard and the PDF pipeline
//! consume:
//! - field metadata (`field`): definitions, input kinds, sectioning
//! - answer-value coercions (`value`): loose JSON in, primitives out
//! - token normalization (`normalize`): label-vs-token drift tolerance
//! - the calculation engine (`calc`): derived line items
//!
//! Everything here is pure and synchronous; persistence and HTTP live
//! in `intake-api`.

pub mod calc;
pub mod field;
pub mod normalize;
pub mod value;

pub use calc::{apply_calculations, evaluate, recompute};
pub use field::{Audience, FieldDefinition, InputKind, Section};
pub use normalize::{is_truthy_yes, matches_option, normalize_token};
