use crate::grades::Grade;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::record::{RecordDraft, SubjectGrade};
use crate::store::{RecordStore, StoreError};
use serde_json::json;
use tracing::{error, warn};

pub fn require_store<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut RecordStore, serde_json::Value> {
    state
        .store
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) => Ok(v.to_string()),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

/// Absent text fields read as blank so the store reports which one is missing.
fn text_field(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string", key),
            None,
        )),
    }
}

pub fn parse_draft(req: &Request) -> Result<RecordDraft, serde_json::Value> {
    let name = text_field(req, "name")?;
    let email = text_field(req, "email")?;
    let class_label = text_field(req, "classLabel")?;

    let rows = match req.params.get("subjects") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(a)) => a.clone(),
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "subjects must be an array",
                None,
            ))
        }
    };

    let mut subjects = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let Some(obj) = row.as_object() else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("subjects[{}] must be an object", i),
                None,
            ));
        };
        let subject_name = match obj.get("subjectName") {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("subjects[{}].subjectName must be a string", i),
                    None,
                ))
            }
        };
        let Some(letter) = obj.get("grade").and_then(|v| v.as_str()) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("subjects[{}].grade must be a string", i),
                None,
            ));
        };
        let grade: Grade = match letter.parse() {
            Ok(g) => g,
            Err(e) => return Err(store_err(&req.id, StoreError::from(e))),
        };
        subjects.push(SubjectGrade {
            subject_name,
            grade,
        });
    }

    Ok(RecordDraft {
        name,
        email,
        class_label,
        subjects,
    })
}

pub fn store_err(id: &str, e: StoreError) -> serde_json::Value {
    let details = match &e {
        StoreError::MissingRequiredField(f) => Some(json!({ "field": f.as_str() })),
        StoreError::InvalidGrade(g) => Some(json!({ "grade": g.0 })),
        StoreError::NotFound(student_id) | StoreError::DuplicateId(student_id) => {
            Some(json!({ "studentId": student_id }))
        }
        StoreError::Backend(_) => None,
    };
    match &e {
        StoreError::Backend(inner) => error!(error = %format!("{inner:#}"), "backend write failed"),
        other => warn!(code = other.code(), "request rejected: {}", other),
    }
    err(id, e.code(), e.to_string(), details)
}
