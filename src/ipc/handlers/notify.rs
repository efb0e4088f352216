use crate::ipc::error::{err, event, ok};
use crate::ipc::helpers::require_store;
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use crate::store::SubscriptionId;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Every delivery is the full roster, written as an event line ahead of the
/// response to the request that changed it.
fn handle_snapshot_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outbox = Rc::clone(&state.outbox);
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let known_id = Rc::new(Cell::new(0u64));
    let sub_id = Rc::clone(&known_id);
    let id = store.on_snapshot(Box::new(move |records: &[Record]| {
        outbox.borrow_mut().push(event(
            "students.snapshot",
            json!({
                "subscriptionId": sub_id.get(),
                "students": records.iter().map(Record::to_json).collect::<Vec<_>>(),
            }),
        ));
    }));
    known_id.set(id.0);

    // The initial delivery ran before the id was known.
    if let Some(first) = state.outbox.borrow_mut().last_mut() {
        first["subscriptionId"] = json!(id.0);
    }

    ok(&req.id, json!({ "subscriptionId": id.0 }))
}

fn handle_snapshot_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("subscriptionId").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing subscriptionId", None);
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if !store.unsubscribe(SubscriptionId(raw)) {
        return err(
            &req.id,
            "not_found",
            "subscription not found",
            Some(json!({ "subscriptionId": raw })),
        );
    }
    ok(&req.id, json!({ "removed": true }))
}

fn handle_toast_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let message = state.toast.current(Instant::now()).map(str::to_string);
    ok(&req.id, json!({ "message": message }))
}

fn handle_toast_dismiss(state: &mut AppState, req: &Request) -> serde_json::Value {
    let dismissed = state.toast.cancel();
    ok(&req.id, json!({ "dismissed": dismissed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.subscribe" => Some(handle_snapshot_subscribe(state, req)),
        "snapshot.unsubscribe" => Some(handle_snapshot_unsubscribe(state, req)),
        "toast.current" => Some(handle_toast_current(state, req)),
        "toast.dismiss" => Some(handle_toast_dismiss(state, req)),
        _ => None,
    }
}
