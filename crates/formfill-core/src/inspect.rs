//! Template introspection ("dump" mode)
//!
//! Lists every widget name in a template so the mapping table can be
//! reconciled against a new template revision. Read-only diagnostic
//! path.

use lopdf::Document;
use serde::Serialize;

use crate::error::FillError;
use crate::fill::collect_fields;

#[derive(Debug, Clone, Serialize)]
pub struct PdfFieldInfo {
    pub name: String,
    /// Raw AcroForm field type: "Tx", "Btn", "Ch", "Sig".
    pub field_type: Option<String>,
}

/// All terminal AcroForm fields of a template, in document order.
pub fn list_fields(template: &[u8]) -> Result<Vec<PdfFieldInfo>, FillError> {
    let doc = Document::load_mem(template).map_err(|e| FillError::ParseError(e.to_string()))?;

    Ok(collect_fields(&doc)
        .into_iter()
        .map(|f| PdfFieldInfo {
            name: f.name,
            field_type: f.field_type,
        })
        .collect())
}
