//! Checkbox mapping rows
//!
//! One row translates a logical field (and, for option fields, one
//! specific option value) to the exact name of a checkbox widget in
//! the PDF. Multiple rows may share a `field_key` — one per selectable
//! option — but each points at a distinct widget.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRow {
    pub field_key: String,
    pub pdf_field_name: String,
    /// "checkbox" marks rows needing option-matching; anything else
    /// (or absent) means a plain text fill under `field_key`.
    #[serde(default)]
    pub format: Option<String>,
    /// For checkbox rows: the option this widget represents. Empty or
    /// absent means a plain yes/no checkbox.
    #[serde(default)]
    pub constant_value: Option<String>,
}

impl MappingRow {
    pub fn is_checkbox(&self) -> bool {
        self.format
            .as_deref()
            .map(|f| f.trim().eq_ignore_ascii_case("checkbox"))
            .unwrap_or(false)
    }

    /// The option value for this row, empty when the row is a plain
    /// yes/no checkbox.
    pub fn option(&self) -> &str {
        self.constant_value.as_deref().unwrap_or("")
    }
}
