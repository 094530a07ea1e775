//! Endpoint tests for the intake API
//!
//! Each test gets its own temp-file SQLite database and template
//! directory; requests go through the full router via `oneshot`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::router;
use crate::state::AppState;

async fn test_state() -> Arc<AppState> {
    let token = Uuid::new_v4().to_string();
    let dir: PathBuf = std::env::temp_dir().join(format!("intake-api-test-{token}"));
    std::fs::create_dir_all(&dir).unwrap();

    let db_url = format!("sqlite:{}?mode=rwc", dir.join("test.db").display());
    let state = AppState::with_options(&db_url, dir).await.unwrap();
    Arc::new(state)
}

async fn request(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body, headers)
}

async fn request_json(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body, _) = request(state, req).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_filing(state: &Arc<AppState>, form_code: &str, tax_year: i64) -> String {
    let (status, body) = request_json(
        state,
        json_request(
            "POST",
            "/api/filings",
            json!({
                "client_name": "Smith Estate",
                "form_code": form_code,
                "tax_year": tax_year,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

async fn seed_field(state: &Arc<AppState>, form_code: &str, key: &str, calculation: Option<&str>) {
    sqlx::query(
        r#"
        INSERT INTO form_fields (form_code, field_key, label, field_type, is_calculated, calculation)
        VALUES (?, ?, ?, 'number', ?, ?)
        "#,
    )
    .bind(form_code)
    .bind(key)
    .bind(key)
    .bind(calculation.is_some())
    .bind(calculation)
    .execute(&state.db)
    .await
    .unwrap();
}

async fn seed_mapping(
    state: &Arc<AppState>,
    form_code: &str,
    tax_year: i64,
    field_key: &str,
    pdf_field_name: &str,
    constant_value: Option<&str>,
) {
    sqlx::query(
        r#"
        INSERT INTO pdf_field_mappings (form_code, tax_year, field_key, pdf_field_name, format, constant_value)
        VALUES (?, ?, ?, ?, 'checkbox', ?)
        "#,
    )
    .bind(form_code)
    .bind(tax_year)
    .bind(field_key)
    .bind(pdf_field_name)
    .bind(constant_value)
    .execute(&state.db)
    .await
    .unwrap();
}

/// Minimal fillable template with one text field and one checkbox, in
/// the shape IRS templates take after field renaming.
fn build_template() -> Vec<u8> {
    use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let text_field = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Widget".to_vec())),
        ("FT", Object::Name(b"Tx".to_vec())),
        (
            "T",
            Object::String(b"ein".to_vec(), StringFormat::Literal),
        ),
        (
            "Rect",
            Object::Array(vec![
                Object::Integer(50),
                Object::Integer(700),
                Object::Integer(250),
                Object::Integer(720),
            ]),
        ),
    ]);
    let text_id = doc.add_object(text_field);

    let on_ap = doc.add_object(Stream::new(Dictionary::new(), vec![]));
    let off_ap = doc.add_object(Stream::new(Dictionary::new(), vec![]));
    let mut n = Dictionary::new();
    n.set("Yes", Object::Reference(on_ap));
    n.set("Off", Object::Reference(off_ap));
    let mut ap = Dictionary::new();
    ap.set("N", Object::Dictionary(n));

    let checkbox = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Widget".to_vec())),
        ("FT", Object::Name(b"Btn".to_vec())),
        (
            "T",
            Object::String(b"cb_amended".to_vec(), StringFormat::Literal),
        ),
        ("V", Object::Name(b"Off".to_vec())),
        ("AS", Object::Name(b"Off".to_vec())),
        ("AP", Object::Dictionary(ap)),
        (
            "Rect",
            Object::Array(vec![
                Object::Integer(50),
                Object::Integer(650),
                Object::Integer(65),
                Object::Integer(665),
            ]),
        ),
    ]);
    let cb_id = doc.add_object(checkbox);

    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        ),
        (
            "Annots",
            Object::Array(vec![Object::Reference(text_id), Object::Reference(cb_id)]),
        ),
    ]);
    let page_id = doc.add_object(page);

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(1)),
        ("Kids", Object::Array(vec![Object::Reference(page_id)])),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut acroform = Dictionary::new();
    acroform.set(
        "Fields",
        Object::Array(vec![Object::Reference(text_id), Object::Reference(cb_id)]),
    );
    let acroform_id = doc.add_object(acroform);

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
        ("AcroForm", Object::Reference(acroform_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

#[tokio::test]
async fn test_health() {
    let state = test_state().await;
    let (status, body, _) = request(&state, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_create_and_get_filing() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;

    let (status, body) = request_json(&state, get_request(&format!("/api/filings/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["form_code"], "1041");
    assert_eq!(body["tax_year"], 2024);
    assert_eq!(body["client_name"], "Smith Estate");
}

#[tokio::test]
async fn test_unknown_filing_is_404() {
    let state = test_state().await;
    let (status, body) = request_json(&state, get_request("/api/filings/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_create_filing_requires_form_code() {
    let state = test_state().await;
    let (status, _) = request_json(
        &state,
        json_request(
            "POST",
            "/api/filings",
            json!({"client_name": "X", "form_code": "", "tax_year": 2024}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_answers_round_trip() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;

    let answers = json!({
        "estate_or_trust_name": "Smith Estate",
        "total_income": 1500.5,
        "amended": true,
        "entity_type": ["Simple trust", "Decedent's estate"],
        "wrapped": {"value": "inner"},
    });

    let (status, _) = request_json(
        &state,
        json_request(
            "PUT",
            &format!("/api/filings/{id}/answers"),
            json!({"answers": answers, "source": "client"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        request_json(&state, get_request(&format!("/api/filings/{id}/answers"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answers"], answers);
    assert_eq!(body["sources"]["total_income"], "client");
}

#[tokio::test]
async fn test_save_replaces_not_merges() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;
    let uri = format!("/api/filings/{id}/answers");

    let first = json!({"a": 1, "b": 2});
    request_json(&state, json_request("PUT", &uri, json!({"answers": first}))).await;

    // Second save drops "b"; it must not survive.
    let second = json!({"a": 3});
    request_json(&state, json_request("PUT", &uri, json!({"answers": second}))).await;

    let (_, body) = request_json(&state, get_request(&uri)).await;
    assert_eq!(body["answers"], second);
}

#[tokio::test]
async fn test_save_recomputes_calculated_fields() {
    let state = test_state().await;
    seed_field(&state, "1041", "a", None).await;
    seed_field(&state, "1041", "b", None).await;
    seed_field(&state, "1041", "c", Some("a - b")).await;

    let id = create_filing(&state, "1041", 2024).await;
    let uri = format!("/api/filings/{id}/answers");

    let (status, body) = request_json(
        &state,
        json_request("PUT", &uri, json!({"answers": {"a": 10, "b": 5}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answers"]["c"], 5);

    // Changing a dependency updates the stored derived value.
    request_json(
        &state,
        json_request("PUT", &uri, json!({"answers": {"a": 20, "b": 5}})),
    )
    .await;
    let (_, body) = request_json(&state, get_request(&uri)).await;
    assert_eq!(body["answers"]["c"], 15);
}

#[tokio::test]
async fn test_broken_calculation_saves_zero_not_error() {
    let state = test_state().await;
    seed_field(&state, "1041", "bad", Some("foo +")).await;

    let id = create_filing(&state, "1041", 2024).await;
    let (status, body) = request_json(
        &state,
        json_request(
            "PUT",
            &format!("/api/filings/{id}/answers"),
            json!({"answers": {"foo": 3}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answers"]["bad"], 0);
}

#[tokio::test]
async fn test_list_fields_with_audience_filter() {
    let state = test_state().await;
    seed_field(&state, "1041", "shared", None).await;
    sqlx::query(
        r#"
        INSERT INTO form_fields (form_code, field_key, label, audience)
        VALUES ('1041', 'internal_notes', 'Internal notes', 'lawyer')
        "#,
    )
    .execute(&state.db)
    .await
    .unwrap();

    let (_, body) = request_json(&state, get_request("/api/forms/1041/fields")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) =
        request_json(&state, get_request("/api/forms/1041/fields?audience=client")).await;
    let keys: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field_key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["shared"]);
}

#[tokio::test]
async fn test_pdf_missing_template_is_500() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;

    let (status, body) = request_json(&state, get_request(&format!("/api/filings/{id}/pdf"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("template"));
}

#[tokio::test]
async fn test_pdf_generation_with_diagnostics() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;
    seed_mapping(&state, "1041", 2024, "amended", "cb_amended", None).await;

    std::fs::write(
        state.template_dir.join("1041_2024_fillable.pdf"),
        build_template(),
    )
    .unwrap();

    let answers: HashMap<String, Value> = [
        ("ein".to_string(), json!("12-3456789")),
        ("amended".to_string(), json!("yes")),
        ("unmapped_field".to_string(), json!("x")),
    ]
    .into_iter()
    .collect();
    crate::store::save_answers(&state.db, &id, &answers, crate::models::AnswerSource::Lawyer)
        .await
        .unwrap();

    let (status, body, headers) =
        request(&state, get_request(&format!("/api/filings/{id}/pdf"))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"%PDF"));
    assert_eq!(headers["content-type"], "application/pdf");
    assert_eq!(
        headers["content-disposition"],
        format!("attachment; filename=\"1041_2024_{id}.pdf\"")
    );
    assert_eq!(headers["x-filled-text"], "1");
    assert_eq!(headers["x-filled-checkbox"], "1");
    assert_eq!(headers["x-missing-text-in-pdf-count"], "1");
    assert_eq!(headers["x-missing-checkbox-in-pdf-count"], "0");
}

#[tokio::test]
async fn test_pdf_inline_disposition() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;
    std::fs::write(
        state.template_dir.join("1041_2024_fillable.pdf"),
        build_template(),
    )
    .unwrap();

    let (status, _, headers) = request(
        &state,
        get_request(&format!("/api/filings/{id}/pdf?inline=1")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("inline;"));
}

#[tokio::test]
async fn test_pdf_dump_mode() {
    let state = test_state().await;
    let id = create_filing(&state, "1041", 2024).await;
    seed_mapping(&state, "1041", 2024, "amended", "cb_amended", None).await;
    std::fs::write(
        state.template_dir.join("1041_2024_fillable.pdf"),
        build_template(),
    )
    .unwrap();

    let (status, body) =
        request_json(&state, get_request(&format!("/api/filings/{id}/pdf?dump=1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pdf_field_count"], 2);
    assert_eq!(body["checkbox_mapping_rows"], 1);
    let names: Vec<&str> = body["pdf_fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"ein"));
    assert!(names.contains(&"cb_amended"));
}
