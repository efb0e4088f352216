use crate::store::RecordStore;
use crate::toast::Toast;
use serde::Deserialize;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Event lines produced while handling a request; written before its response.
pub type Outbox = Rc<RefCell<Vec<serde_json::Value>>>;

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<RecordStore>,
    pub toast: Toast,
    pub outbox: Outbox,
}

impl AppState {
    pub fn drain_events(&self) -> Vec<serde_json::Value> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }
}
