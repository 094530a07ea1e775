//! AcroForm fill engine
//!
//! Takes a fillable PDF template, a bag of loosely-typed answers keyed
//! by logical field name, and a checkbox mapping table, and produces a
//! filled (still fillable) PDF plus a [`FillReport`] saying which
//! logical fields had no matching widget.
//!
//! Missing individual widgets are diagnostics, never errors: template
//! revisions drift out of sync with the mapping table, and a partially
//! mapped PDF is still useful. Only an unloadable or unsaveable
//! template fails the whole operation.

pub mod error;
pub mod fill;
pub mod inspect;
pub mod mapping;
pub mod report;

pub use error::FillError;
pub use fill::fill_document;
pub use inspect::{list_fields, PdfFieldInfo};
pub use mapping::MappingRow;
pub use report::FillReport;
