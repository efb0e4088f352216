use crate::blob::BlobBackend;
use crate::calc;
use crate::config::BackendKind;
use crate::db::SqliteBackend;
use crate::grades::Grade;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{Backend, RecordStore};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Opens the roster in `path` and makes it the active store. The previous
/// store, with its subscriptions, is dropped.
pub fn select_workspace(
    state: &mut AppState,
    path: &Path,
    kind: BackendKind,
) -> anyhow::Result<usize> {
    let backend: Box<dyn Backend> = match kind {
        BackendKind::Sqlite => Box::new(SqliteBackend::open(path)?),
        BackendKind::Blob => Box::new(BlobBackend::open(path)?),
    };
    let store = RecordStore::open(backend)?;
    let count = store.list().len();

    state.store = Some(store);
    state.workspace = Some(path.to_path_buf());
    state.toast.cancel();
    state.drain_events();
    info!(workspace = %path.display(), backend = kind.as_str(), "workspace selected");
    Ok(count)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.store.as_ref().map(|s| s.backend_kind()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let kind = match req.params.get("backend").and_then(|v| v.as_str()) {
        None => BackendKind::default(),
        Some(raw) => match raw.parse::<BackendKind>() {
            Ok(k) => k,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
    };

    match select_workspace(state, &path, kind) {
        Ok(count) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "backend": kind.as_str(),
                "studentCount": count,
            }),
        ),
        Err(e) => {
            error!(workspace = %path.display(), "workspace open failed: {e:#}");
            err(&req.id, "workspace_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_grades_table(req: &Request) -> serde_json::Value {
    let grades: Vec<serde_json::Value> = Grade::ALL
        .iter()
        .map(|g| json!({ "grade": g.letter(), "points": g.points() }))
        .collect();
    ok(&req.id, json!({ "grades": grades }))
}

/// Live preview for the edit form; nothing is stored.
fn handle_gpa_preview(req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("grades").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing grades", None);
    };
    let mut grades = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(letter) = v.as_str() else {
            return err(&req.id, "bad_params", "grades must be strings", None);
        };
        match letter.parse::<Grade>() {
            Ok(g) => grades.push(g),
            Err(e) => {
                return err(
                    &req.id,
                    "invalid_grade",
                    e.to_string(),
                    Some(json!({ "grade": letter })),
                )
            }
        }
    }
    let gpa = calc::gpa(grades);
    ok(
        &req.id,
        json!({ "gpa": gpa, "gpaText": calc::format_gpa(gpa) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "grades.table" => Some(handle_grades_table(req)),
        "gpa.preview" => Some(handle_gpa_preview(req)),
        _ => None,
    }
}
