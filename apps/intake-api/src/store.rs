//! Persistence layer
//!
//! All queries live here as free functions over the pool, so handlers
//! stay thin and tests can exercise storage directly. The filing
//! store, field registry, and mapping registry from the service
//! boundary all resolve to these functions.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use formfill_core::MappingRow;
use intake_core::FieldDefinition;

use crate::models::{AnswerSource, CreateFilingRequest, DbFieldRow, DbMappingRow, Filing};

pub async fn create_filing(pool: &SqlitePool, req: &CreateFilingRequest) -> sqlx::Result<Filing> {
    let filing = Filing {
        id: Uuid::new_v4().to_string(),
        client_name: req.client_name.clone(),
        form_code: req.form_code.clone(),
        tax_year: req.tax_year,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO filings (id, client_name, form_code, tax_year, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&filing.id)
    .bind(&filing.client_name)
    .bind(&filing.form_code)
    .bind(filing.tax_year)
    .bind(filing.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(filing)
}

pub async fn get_filing(pool: &SqlitePool, filing_id: &str) -> sqlx::Result<Option<Filing>> {
    sqlx::query_as(
        r#"
        SELECT id, client_name, form_code, tax_year, created_at
        FROM filings
        WHERE id = ?
        "#,
    )
    .bind(filing_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_answers(
    pool: &SqlitePool,
    filing_id: &str,
) -> sqlx::Result<HashMap<String, Value>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT field_key, value_json
        FROM form_answers
        WHERE filing_id = ?
        "#,
    )
    .bind(filing_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            (key, value)
        })
        .collect())
}

/// Who saved each answer, keyed by field.
pub async fn get_answer_sources(
    pool: &SqlitePool,
    filing_id: &str,
) -> sqlx::Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT field_key, source
        FROM form_answers
        WHERE filing_id = ?
        "#,
    )
    .bind(filing_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Atomic full replace of a filing's answer set: delete-then-reinsert
/// inside one transaction, so a crash mid-save can never leave a
/// partial answer set behind for PDF generation to read.
pub async fn save_answers(
    pool: &SqlitePool,
    filing_id: &str,
    answers: &HashMap<String, Value>,
    source: AnswerSource,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM form_answers WHERE filing_id = ?")
        .bind(filing_id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now().to_rfc3339();
    for (field_key, value) in answers {
        let raw = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        sqlx::query(
            r#"
            INSERT INTO form_answers (filing_id, field_key, value_json, source, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(filing_id)
        .bind(field_key)
        .bind(&raw)
        .bind(source.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn get_field_definitions(
    pool: &SqlitePool,
    form_code: &str,
) -> sqlx::Result<Vec<FieldDefinition>> {
    let rows: Vec<DbFieldRow> = sqlx::query_as(
        r#"
        SELECT field_key, label, help_text, field_type, input_type, required,
               section, field_order, audience, is_calculated, calculation,
               options_json, form_code
        FROM form_fields
        WHERE form_code = ?
        ORDER BY section, field_order
        "#,
    )
    .bind(form_code)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FieldDefinition::from).collect())
}

pub async fn get_checkbox_mappings(
    pool: &SqlitePool,
    form_code: &str,
    tax_year: i64,
) -> sqlx::Result<Vec<MappingRow>> {
    let rows: Vec<DbMappingRow> = sqlx::query_as(
        r#"
        SELECT field_key, pdf_field_name, format, constant_value
        FROM pdf_field_mappings
        WHERE form_code = ? AND tax_year = ?
        "#,
    )
    .bind(form_code)
    .bind(tax_year)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(MappingRow::from).collect())
}
