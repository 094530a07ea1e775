//! Form field metadata
//!
//! `FieldDefinition` mirrors one row of the form-field registry (owned
//! by the external sheet-sync pipeline). The helpers here resolve the
//! free-text `input_type`/`type` columns into a closed set of input
//! kinds, group fields into wizard sections, and answer the two
//! questions the wizard asks on every edit: how far along is this
//! filing, and which required fields are still blank.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value;

/// Who is answering questions in an intake session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Client,
    Lawyer,
}

/// One logical question / line item of a form template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field_key: String,
    pub label: String,
    #[serde(default)]
    pub help_text: Option<String>,
    /// Generic type column ("text", "number", "date", ...).
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
    /// More specific input type ("checkbox (multi)", "currency", ...).
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    /// "client" | "lawyer" | "both"; None means both.
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub is_calculated: bool,
    #[serde(default)]
    pub calculation: Option<String>,
    /// Valid choices for select / multi-select kinds.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub form_code: Option<String>,
}

/// Closed set of UI control kinds resolved from the raw type columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Number,
    Currency,
    Date,
    CheckboxSingle,
    MultiSelect,
    Select,
    Attachment,
}

impl FieldDefinition {
    /// Resolve the free-text `input_type` / `type` columns into an
    /// [`InputKind`]. Multi-select is checked before single checkbox
    /// because its raw value also contains "checkbox".
    pub fn input_kind(&self) -> InputKind {
        let raw_input = self
            .input_type
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let raw_type = self
            .field_type
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        if raw_input.contains("checkbox") && raw_input.contains("multi") {
            return InputKind::MultiSelect;
        }
        if raw_input.contains("checkbox") {
            return InputKind::CheckboxSingle;
        }
        if raw_input == "yes;no" {
            return InputKind::Select;
        }
        if raw_input.contains("date") {
            return InputKind::Date;
        }
        if raw_input.contains("currency") {
            return InputKind::Currency;
        }
        if raw_input.contains("number") {
            return InputKind::Number;
        }
        if raw_input.contains("attach") || raw_input.contains("signature") {
            return InputKind::Attachment;
        }

        match raw_type.as_str() {
            "date" => InputKind::Date,
            "number" | "currency" => InputKind::Number,
            _ => InputKind::Text,
        }
    }

    /// Whether this field is shown to the given audience. Lawyers see
    /// every field; clients only see "client" and "both" fields.
    pub fn visible_to(&self, audience: Audience) -> bool {
        match audience {
            Audience::Lawyer => true,
            Audience::Client => {
                let aud = self
                    .audience
                    .as_deref()
                    .unwrap_or("both")
                    .trim()
                    .to_lowercase();
                aud == "client" || aud == "both"
            }
        }
    }
}

/// A named group of fields rendered as one wizard step.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// Group fields into sections in order of first appearance, sorting
/// within each section by the `order` column. Fields without a section
/// fall into "Other".
pub fn group_by_section(fields: &[FieldDefinition]) -> Vec<Section> {
    let mut names: Vec<String> = Vec::new();
    let mut by_section: HashMap<String, Vec<FieldDefinition>> = HashMap::new();

    for f in fields {
        let name = f
            .section
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Other".to_string());
        if !by_section.contains_key(&name) {
            names.push(name.clone());
        }
        by_section.entry(name).or_default().push(f.clone());
    }

    names
        .into_iter()
        .map(|name| {
            let mut list = by_section.remove(&name).unwrap_or_default();
            list.sort_by_key(|f| f.order.unwrap_or(0));
            Section { name, fields: list }
        })
        .collect()
}

/// Count answered fields for the progress indicator. Calculated fields
/// are excluded; they are derived, not answered.
pub fn count_answered(fields: &[FieldDefinition], answers: &HashMap<String, Value>) -> usize {
    fields
        .iter()
        .filter(|f| !f.is_calculated)
        .filter(|f| {
            answers
                .get(&f.field_key)
                .map(value::is_answered)
                .unwrap_or(false)
        })
        .count()
}

/// Labels of required, editable fields that are still blank.
///
/// Single checkboxes may stay unchecked even when required; required
/// multi-selects need at least one selection.
pub fn missing_required(fields: &[FieldDefinition], answers: &HashMap<String, Value>) -> Vec<String> {
    let mut missing = Vec::new();

    for f in fields {
        if !f.required || f.is_calculated {
            continue;
        }

        let v = answers.get(&f.field_key);
        match f.input_kind() {
            InputKind::CheckboxSingle => continue,
            InputKind::MultiSelect => {
                let has_selection = matches!(v, Some(Value::Array(items)) if !items.is_empty());
                if !has_selection {
                    missing.push(f.label.clone());
                }
            }
            _ => {
                if !v.map(value::is_answered).unwrap_or(false) {
                    missing.push(f.label.clone());
                }
            }
        }
    }

    missing
}
