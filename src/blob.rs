use crate::record::Record;
use crate::store::Backend;
use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

pub const BLOB_FILE: &str = "roster.localstore.json";
/// The single key the roster array lives under.
pub const STORAGE_KEY: &str = "students";

#[derive(Serialize)]
struct StoredRow<'a> {
    #[serde(flatten)]
    record: &'a Record,
    gpa: String,
}

/// Local key-value blob: the whole roster is one serialized array, read once
/// at open and rewritten in full after every mutation.
pub struct BlobBackend {
    path: PathBuf,
    rows: Vec<Record>,
}

impl BlobBackend {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!("failed to create workspace {}", workspace.to_string_lossy())
        })?;
        let path = workspace.join(BLOB_FILE);
        let mut backend = Self {
            path,
            rows: Vec::new(),
        };
        if !backend.path.is_file() {
            return Ok(backend);
        }

        let text = std::fs::read_to_string(&backend.path)
            .with_context(|| format!("failed to read {}", backend.path.to_string_lossy()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is invalid JSON", backend.path.to_string_lossy()))?;
        let rows = match value.get(STORAGE_KEY) {
            Some(v) => serde_json::from_value::<Vec<Record>>(v.clone())
                .with_context(|| format!("malformed {:?} array", STORAGE_KEY))?,
            None if value.as_object().is_some() => Vec::new(),
            None => return Err(anyhow!("expected an object with a {:?} key", STORAGE_KEY)),
        };
        backend.rows = rows;

        // Rows saved by position-identified editors carry no id.
        let mut backfilled = 0usize;
        for r in backend.rows.iter_mut() {
            if r.id.trim().is_empty() {
                r.id = Uuid::new_v4().to_string();
                backfilled += 1;
            }
        }
        if backfilled > 0 {
            info!(backfilled, "assigned ids to stored students without one");
            backend.flush()?;
        }
        Ok(backend)
    }

    fn flush(&self) -> anyhow::Result<()> {
        let rows: Vec<StoredRow<'_>> = self
            .rows
            .iter()
            .map(|r| StoredRow {
                record: r,
                gpa: crate::calc::format_gpa(r.gpa()),
            })
            .collect();
        let text = serde_json::to_string_pretty(&json!({ STORAGE_KEY: rows }))
            .context("failed to serialize roster")?;

        let tmp = self.path.with_extension("json.writing");
        std::fs::write(&tmp, text)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("failed to move roster into {}", self.path.to_string_lossy())
        })?;
        Ok(())
    }
}

impl Backend for BlobBackend {
    fn kind(&self) -> &'static str {
        "blob"
    }

    fn list(&self) -> anyhow::Result<Vec<Record>> {
        Ok(self.rows.clone())
    }

    fn upsert(&mut self, record: &Record) -> anyhow::Result<()> {
        let previous = self.rows.clone();
        match self.rows.iter_mut().find(|r| r.id == record.id) {
            Some(r) => *r = record.clone(),
            None => self.rows.push(record.clone()),
        }
        if let Err(e) = self.flush() {
            self.rows = previous;
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> anyhow::Result<()> {
        let Some(pos) = self.rows.iter().position(|r| r.id == id) else {
            return Err(anyhow!("student {} is not in the stored roster", id));
        };
        let removed = self.rows.remove(pos);
        if let Err(e) = self.flush() {
            self.rows.insert(pos, removed);
            return Err(e);
        }
        Ok(())
    }

    fn replace_all(&mut self, records: &[Record]) -> anyhow::Result<()> {
        let previous = std::mem::replace(&mut self.rows, records.to_vec());
        if let Err(e) = self.flush() {
            self.rows = previous;
            return Err(e);
        }
        Ok(())
    }
}
