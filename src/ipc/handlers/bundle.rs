use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_store, required_str, store_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match backup::export_roster_bundle(store.list(), &out_path) {
        Ok(summary) => {
            info!(path = %out_path.display(), students = summary.student_count, "roster exported");
            ok(
                &req.id,
                json!({
                    "format": summary.bundle_format,
                    "studentCount": summary.student_count,
                    "sha256": summary.checksum,
                    "path": out_path.to_string_lossy(),
                }),
            )
        }
        Err(e) => {
            error!(path = %out_path.display(), "roster export failed: {e:#}");
            err(&req.id, "bundle_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }

    let imported = match backup::read_roster_bundle(&in_path) {
        Ok(r) => r,
        Err(e) => {
            error!(path = %in_path.display(), "roster import failed: {e:#}");
            return err(&req.id, "bundle_failed", format!("{e:#}"), None);
        }
    };

    let count = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(e) => return e,
        };
        match store.replace_all(imported.students) {
            Ok(n) => n,
            Err(e) => return store_err(&req.id, e),
        }
    };

    let toast = "Roster imported";
    state.toast.notify(toast, Instant::now());
    ok(
        &req.id,
        json!({
            "format": imported.bundle_format,
            "studentCount": count,
            "toast": toast,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.exportBundle" => Some(handle_export_bundle(state, req)),
        "roster.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
