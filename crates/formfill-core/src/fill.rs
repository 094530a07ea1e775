//! Two-pass best-effort fill over a template's AcroForm
//!
//! Text pass: every answer whose key names a text widget gets its
//! display string written to `/V`. Checkbox pass: every checkbox
//! mapping row decides whether its widget should be checked, tolerant
//! of UI-label vs. database-token spelling drift.
//!
//! The form stays fillable — `/NeedAppearances` is set instead of
//! flattening, so viewers regenerate field appearances.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde_json::Value;

use intake_core::normalize::{is_truthy_yes, matches_option};
use intake_core::value;

use crate::error::FillError;
use crate::mapping::MappingRow;
use crate::report::FillReport;

/// One terminal field of the AcroForm tree.
#[derive(Debug, Clone)]
pub(crate) struct AcroField {
    /// Fully-qualified name (parent names joined with '.').
    pub name: String,
    pub id: ObjectId,
    /// Raw `/FT` value ("Tx", "Btn", "Ch", "Sig"), possibly inherited.
    pub field_type: Option<String>,
}

impl AcroField {
    fn is_text(&self) -> bool {
        self.field_type.as_deref() == Some("Tx")
    }

    fn is_button(&self) -> bool {
        self.field_type.as_deref() == Some("Btn")
    }
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj.as_reference() {
        Ok(id) => doc.get_object(id).unwrap_or(obj),
        Err(_) => obj,
    }
}

/// Walk the AcroForm field tree collecting terminal fields with their
/// fully-qualified names. Malformed entries are skipped, not fatal.
pub(crate) fn collect_fields(doc: &Document) -> Vec<AcroField> {
    let mut out = Vec::new();

    let Ok(catalog) = doc.catalog() else {
        return out;
    };
    let Ok(acro_obj) = catalog.get(b"AcroForm") else {
        return out;
    };
    let Ok(acro) = deref(doc, acro_obj).as_dict() else {
        return out;
    };
    let Ok(fields) = acro.get(b"Fields").and_then(|f| f.as_array()) else {
        return out;
    };

    for field in fields {
        if let Ok(id) = field.as_reference() {
            walk(doc, id, "", None, &mut out);
        }
    }

    out
}

fn walk(doc: &Document, id: ObjectId, prefix: &str, inherited_ft: Option<&str>, out: &mut Vec<AcroField>) {
    let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
        return;
    };

    let partial = match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    };

    let name = match (&partial, prefix.is_empty()) {
        (Some(p), true) => p.clone(),
        (Some(p), false) => format!("{prefix}.{p}"),
        (None, _) => prefix.to_string(),
    };

    let ft = match dict.get(b"FT").map(|o| deref(doc, o)) {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => inherited_ft.map(String::from),
    };

    // A node with named kids is structural; a node whose kids are all
    // anonymous widgets holds the value itself.
    if let Ok(kids) = dict.get(b"Kids").and_then(|k| k.as_array()) {
        let has_named_kids = kids.iter().any(|k| {
            k.as_reference()
                .ok()
                .and_then(|kid_id| doc.get_object(kid_id).ok())
                .and_then(|o| o.as_dict().ok())
                .map(|d| d.has(b"T"))
                .unwrap_or(false)
        });

        if has_named_kids {
            for kid in kids {
                if let Ok(kid_id) = kid.as_reference() {
                    walk(doc, kid_id, &name, ft.as_deref(), out);
                }
            }
            return;
        }
    }

    if !name.is_empty() {
        out.push(AcroField {
            name,
            id,
            field_type: ft,
        });
    }
}

fn set_text_value(doc: &mut Document, id: ObjectId, text: &str) {
    if let Ok(dict) = doc.get_object_mut(id).and_then(|o| o.as_dict_mut()) {
        dict.set(
            "V",
            Object::String(text.as_bytes().to_vec(), StringFormat::Literal),
        );
        // Stale appearance streams would keep showing the old value.
        dict.remove(b"AP");
    }
}

/// The appearance-state name that means "checked" for this widget:
/// the first non-Off key of `/AP /N`, defaulting to `Yes`.
fn checkbox_on_state(doc: &Document, id: ObjectId) -> Vec<u8> {
    let state = doc
        .get_object(id)
        .ok()
        .and_then(|o| o.as_dict().ok())
        .and_then(|dict| dict.get(b"AP").ok())
        .map(|ap| deref(doc, ap))
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .map(|n| deref(doc, n))
        .and_then(|n| n.as_dict().ok())
        .and_then(|n| {
            n.iter()
                .map(|(key, _)| key.as_slice())
                .find(|key| *key != b"Off")
                .map(|key| key.to_vec())
        });

    state.unwrap_or_else(|| b"Yes".to_vec())
}

fn set_checkbox_value(doc: &mut Document, id: ObjectId, state: Vec<u8>) {
    if let Ok(dict) = doc.get_object_mut(id).and_then(|o| o.as_dict_mut()) {
        dict.set("V", Object::Name(state.clone()));
        dict.set("AS", Object::Name(state));
    }
}

/// Viewers must regenerate appearances for the values we set.
fn set_need_appearances(doc: &mut Document) {
    let acro_ref = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AcroForm").ok())
        .and_then(|o| o.as_reference().ok());

    match acro_ref {
        Some(id) => {
            if let Ok(acro) = doc.get_object_mut(id).and_then(|o| o.as_dict_mut()) {
                acro.set("NeedAppearances", Object::Boolean(true));
            }
        }
        None => {
            if let Ok(catalog) = doc.catalog_mut() {
                if let Ok(acro) = catalog
                    .get_mut(b"AcroForm")
                    .and_then(|o| o.as_dict_mut())
                {
                    acro.set("NeedAppearances", Object::Boolean(true));
                }
            }
        }
    }
}

/// JavaScript-style stringification used by option matching: booleans
/// render as "true"/"false" (not the "Yes"/"No" of text fills).
fn match_string(v: &Value) -> String {
    match v {
        Value::Bool(b) => b.to_string(),
        other => value::to_display_string(other),
    }
}

/// Decide whether a checkbox mapping row's widget should be checked.
fn should_check(answer: Option<&Value>, option: &str) -> bool {
    let logical = answer.map(value::to_primitive).unwrap_or(Value::Null);

    match &logical {
        // Multi-select: checked iff ANY selected item matches this
        // row's option.
        Value::Array(items) => items
            .iter()
            .any(|item| matches_option(&match_string(item), option)),
        Value::Bool(b) => {
            if option.is_empty() {
                *b
            } else {
                matches_option(&b.to_string(), option)
            }
        }
        other => {
            let s = match_string(other);
            if option.is_empty() {
                is_truthy_yes(&s)
            } else {
                matches_option(&s, option)
            }
        }
    }
}

/// Fill a template's text widgets and mapped checkboxes from an answer
/// map. Missing individual widgets land in the report; only an
/// unloadable or unsaveable template is an error.
pub fn fill_document(
    template: &[u8],
    answers: &HashMap<String, Value>,
    mappings: &[MappingRow],
) -> Result<(Vec<u8>, FillReport), FillError> {
    let mut doc =
        Document::load_mem(template).map_err(|e| FillError::ParseError(e.to_string()))?;

    let widgets: HashMap<String, AcroField> = collect_fields(&doc)
        .into_iter()
        .map(|f| (f.name.clone(), f))
        .collect();

    let checkbox_rows: Vec<&MappingRow> = mappings.iter().filter(|m| m.is_checkbox()).collect();
    let mut report = FillReport::default();

    // Text pass, in sorted key order so output is deterministic.
    let mut keys: Vec<&String> = answers.keys().collect();
    keys.sort();

    for key in keys {
        match widgets.get(key.as_str()) {
            Some(w) if w.is_text() => {
                set_text_value(&mut doc, w.id, &value::to_display_string(&answers[key]));
                report.filled_text += 1;
            }
            _ => {
                // Keys resolved by the checkbox pass are expected to
                // have no text widget.
                let covered = checkbox_rows.iter().any(|m| &m.field_key == key);
                if !covered {
                    report.missing_text_in_pdf.push(key.clone());
                }
            }
        }
    }

    // Checkbox pass.
    for row in &checkbox_rows {
        match widgets.get(row.pdf_field_name.as_str()) {
            Some(w) if w.is_button() => {
                let state = if should_check(answers.get(&row.field_key), row.option()) {
                    checkbox_on_state(&doc, w.id)
                } else {
                    b"Off".to_vec()
                };
                set_checkbox_value(&mut doc, w.id, state);
                report.filled_checkbox += 1;
            }
            _ => report.missing_checkbox_in_pdf.push(row.pdf_field_name.clone()),
        }
    }

    set_need_appearances(&mut doc);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| FillError::SaveError(e.to_string()))?;

    Ok((out, report))
}
