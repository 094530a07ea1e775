//! HTTP handlers for the intake API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use intake_core::{calc, Audience, FieldDefinition};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;
use crate::store;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Create a new filing
pub async fn create_filing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFilingRequest>,
) -> Result<Json<Filing>, ApiError> {
    if req.client_name.trim().is_empty() {
        return Err(ApiError::InvalidRequest("client_name is required".into()));
    }
    if req.form_code.trim().is_empty() {
        return Err(ApiError::InvalidRequest("form_code is required".into()));
    }

    let filing = store::create_filing(&state.db, &req).await?;
    tracing::info!("Created filing {} ({} {})", filing.id, filing.form_code, filing.tax_year);

    Ok(Json(filing))
}

/// Get filing metadata by ID
pub async fn get_filing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Filing>, ApiError> {
    let filing = store::get_filing(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::FilingNotFound(id.clone()))?;

    Ok(Json(filing))
}

#[derive(Debug, Deserialize)]
pub struct FieldsQuery {
    pub audience: Option<Audience>,
}

/// List field definitions for a form template, optionally filtered to
/// what one audience may see
pub async fn list_fields(
    State(state): State<Arc<AppState>>,
    Path(form_code): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Json<Vec<FieldDefinition>>, ApiError> {
    let mut fields = store::get_field_definitions(&state.db, &form_code).await?;

    if let Some(audience) = query.audience {
        fields.retain(|f| f.visible_to(audience));
    }

    Ok(Json(fields))
}

/// Get the stored answer map for a filing
pub async fn get_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnswersResponse>, ApiError> {
    let filing = store::get_filing(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::FilingNotFound(id.clone()))?;

    let answers = store::get_answers(&state.db, &filing.id).await?;
    let sources = store::get_answer_sources(&state.db, &filing.id).await?;

    Ok(Json(AnswersResponse {
        filing_id: filing.id,
        answers,
        sources,
    }))
}

/// Replace a filing's full answer set.
///
/// Calculated fields are recomputed before the write, so a stored
/// calculated value is never stale relative to its dependencies.
pub async fn save_answers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<Json<SaveAnswersResponse>, ApiError> {
    let filing = store::get_filing(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::FilingNotFound(id.clone()))?;

    let fields = store::get_field_definitions(&state.db, &filing.form_code).await?;

    let mut answers = req.answers;
    calc::apply_calculations(&fields, &mut answers);

    store::save_answers(&state.db, &filing.id, &answers, req.source).await?;

    tracing::info!(
        "Saved {} answers for filing {} (source: {})",
        answers.len(),
        filing.id,
        req.source
    );

    Ok(Json(SaveAnswersResponse {
        success: true,
        saved: answers.len(),
        answers,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PdfQuery {
    pub dump: Option<String>,
    pub inline: Option<String>,
}

fn flag(v: &Option<String>) -> bool {
    matches!(v.as_deref(), Some("1") | Some("true"))
}

/// Generate a filled PDF for a filing.
///
/// Best-effort: unmapped fields land in the diagnostic headers, never
/// in an error. `?dump=1` returns the template's widget inventory as
/// JSON instead of a document.
pub async fn generate_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PdfQuery>,
) -> Result<Response, ApiError> {
    let filing = store::get_filing(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::FilingNotFound(id.clone()))?;

    let mappings =
        store::get_checkbox_mappings(&state.db, &filing.form_code, filing.tax_year).await?;

    let template_path = state
        .template_dir
        .join(format!("{}_{}_fillable.pdf", filing.form_code, filing.tax_year));
    let template = tokio::fs::read(&template_path)
        .await
        .map_err(|_| ApiError::TemplateMissing(template_path.display().to_string()))?;

    if flag(&query.dump) {
        let pdf_fields = formfill_core::list_fields(&template)?;
        let checkbox_mapping_rows = mappings.iter().filter(|m| m.is_checkbox()).count();

        return Ok(Json(PdfDumpResponse {
            filing_id: filing.id,
            form_code: filing.form_code,
            tax_year: filing.tax_year,
            pdf_field_count: pdf_fields.len(),
            pdf_fields,
            checkbox_mapping_rows,
        })
        .into_response());
    }

    let answers = store::get_answers(&state.db, &filing.id).await?;
    let (bytes, report) = formfill_core::fill_document(&template, &answers, &mappings)?;

    tracing::info!(
        "Generated PDF for filing {}: {} text, {} checkbox, {} missing text, {} missing checkbox",
        filing.id,
        report.filled_text,
        report.filled_checkbox,
        report.missing_text_in_pdf.len(),
        report.missing_checkbox_in_pdf.len()
    );

    let disposition = if flag(&query.inline) {
        "inline"
    } else {
        "attachment"
    };
    let filename = format!("{}_{}_{}.pdf", filing.form_code, filing.tax_year, filing.id);

    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/pdf".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("{}; filename=\"{}\"", disposition, filename),
            ),
            ("X-Filled-Text".to_string(), report.filled_text.to_string()),
            (
                "X-Filled-Checkbox".to_string(),
                report.filled_checkbox.to_string(),
            ),
            (
                "X-Missing-Text-In-PDF-Count".to_string(),
                report.missing_text_in_pdf.len().to_string(),
            ),
            (
                "X-Missing-Checkbox-In-PDF-Count".to_string(),
                report.missing_checkbox_in_pdf.len().to_string(),
            ),
            (
                "X-Missing-Checkbox-In-PDF-Sample".to_string(),
                report.missing_checkbox_sample().join(","),
            ),
        ],
        bytes,
    )
        .into_response())
}
