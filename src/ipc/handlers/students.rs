use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{parse_draft, require_store, required_str, store_err};
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use crate::store::StoreError;
use serde_json::json;
use std::time::Instant;

fn records_json<'a, I>(records: I) -> Vec<serde_json::Value>
where
    I: IntoIterator<Item = &'a Record>,
{
    records.into_iter().map(Record::to_json).collect()
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let query = req
        .params
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    ok(
        &req.id,
        json!({ "students": records_json(store.search(query)) }),
    )
}

fn handle_students_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let query = match required_str(req, "query") {
        Ok(q) => q,
        Err(e) => return e,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let matches = store.search(&query);
    ok(
        &req.id,
        json!({
            "query": query,
            "students": records_json(matches),
        }),
    )
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    match store.get(&student_id) {
        Some(r) => ok(&req.id, json!({ "student": r.to_json() })),
        None => store_err(&req.id, StoreError::NotFound(student_id)),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let draft = match parse_draft(req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let record = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(e) => return e,
        };
        match store.add(&draft) {
            Ok(r) => r,
            Err(e) => return store_err(&req.id, e),
        }
    };

    let toast = "Student added";
    state.toast.notify(toast, Instant::now());
    ok(
        &req.id,
        json!({ "student": record.to_json(), "toast": toast }),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match parse_draft(req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let record = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(e) => return e,
        };
        match store.update(&student_id, &draft) {
            Ok(r) => r,
            Err(e) => return store_err(&req.id, e),
        }
    };

    let toast = "Student updated";
    state.toast.notify(toast, Instant::now());
    ok(
        &req.id,
        json!({ "student": record.to_json(), "toast": toast }),
    )
}

/// The front-end asks for confirmation before sending this.
fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(e) => return e,
        };
        if let Err(e) = store.remove(&student_id) {
            return store_err(&req.id, e);
        }
    }

    let toast = "Student deleted";
    state.toast.notify(toast, Instant::now());
    ok(
        &req.id,
        json!({ "ok": true, "studentId": student_id, "toast": toast }),
    )
}

fn handle_students_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let stats = store.stats();
    ok(
        &req.id,
        json!({
            "count": stats.count,
            "averageGpa": stats.average_gpa,
            "averageGpaText": calc::format_gpa(stats.average_gpa),
            "topName": stats.top_name,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.search" => Some(handle_students_search(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.stats" => Some(handle_students_stats(state, req)),
        _ => None,
    }
}
