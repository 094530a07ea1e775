//! Data models for the intake API

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use intake_core::FieldDefinition;

/// Who saved an answer: the professional or the invited client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Lawyer,
    Client,
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerSource::Lawyer => write!(f, "lawyer"),
            AnswerSource::Client => write!(f, "client"),
        }
    }
}

impl Default for AnswerSource {
    fn default() -> Self {
        AnswerSource::Lawyer
    }
}

/// One filing: a form instance (type + year) for a client.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Filing {
    pub id: String,
    pub client_name: String,
    pub form_code: String,
    pub tax_year: i64,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new filing.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFilingRequest {
    pub client_name: String,
    pub form_code: String,
    pub tax_year: i64,
}

/// Full-replace save of a filing's answer set.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswersRequest {
    pub answers: HashMap<String, Value>,
    #[serde(default)]
    pub source: AnswerSource,
}

/// Response from a save, reporting what was persisted after the
/// calculation pass.
#[derive(Debug, Clone, Serialize)]
pub struct SaveAnswersResponse {
    pub success: bool,
    pub saved: usize,
    pub answers: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswersResponse {
    pub filing_id: String,
    pub answers: HashMap<String, Value>,
    /// Per-field save attribution ("lawyer" | "client").
    pub sources: HashMap<String, String>,
}

/// Field definition row as stored; `options` is a JSON array string.
#[derive(Debug, Clone, FromRow)]
pub struct DbFieldRow {
    pub field_key: String,
    pub label: String,
    pub help_text: Option<String>,
    pub field_type: Option<String>,
    pub input_type: Option<String>,
    pub required: bool,
    pub section: Option<String>,
    pub field_order: Option<i64>,
    pub audience: Option<String>,
    pub is_calculated: bool,
    pub calculation: Option<String>,
    pub options_json: Option<String>,
    pub form_code: String,
}

impl From<DbFieldRow> for FieldDefinition {
    fn from(row: DbFieldRow) -> Self {
        let options = row
            .options_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok());

        FieldDefinition {
            field_key: row.field_key,
            label: row.label,
            help_text: row.help_text,
            field_type: row.field_type,
            input_type: row.input_type,
            required: row.required,
            section: row.section,
            order: row.field_order,
            audience: row.audience,
            is_calculated: row.is_calculated,
            calculation: row.calculation,
            options,
            form_code: Some(row.form_code),
        }
    }
}

/// Checkbox mapping row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct DbMappingRow {
    pub field_key: String,
    pub pdf_field_name: String,
    pub format: Option<String>,
    pub constant_value: Option<String>,
}

impl From<DbMappingRow> for formfill_core::MappingRow {
    fn from(row: DbMappingRow) -> Self {
        formfill_core::MappingRow {
            field_key: row.field_key,
            pdf_field_name: row.pdf_field_name,
            format: row.format,
            constant_value: row.constant_value,
        }
    }
}

/// Dump-mode response: the template's widget inventory.
#[derive(Debug, Clone, Serialize)]
pub struct PdfDumpResponse {
    pub filing_id: String,
    pub form_code: String,
    pub tax_year: i64,
    pub pdf_field_count: usize,
    pub pdf_fields: Vec<formfill_core::PdfFieldInfo>,
    pub checkbox_mapping_rows: usize,
}
