use crate::calc::{self, RosterStats};
use crate::grades::InvalidGrade;
use crate::record::{Record, RecordDraft, RequiredField};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Persistence collaborator behind a [`RecordStore`].
pub trait Backend {
    fn kind(&self) -> &'static str;

    /// Full collection in stored order.
    fn list(&self) -> anyhow::Result<Vec<Record>>;

    fn allocate_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Insert or fully overwrite the record keyed by `record.id`.
    fn upsert(&mut self, record: &Record) -> anyhow::Result<()>;

    fn delete(&mut self, id: &str) -> anyhow::Result<()>;

    /// Drops every stored record and writes `records` in order, as one step.
    fn replace_all(&mut self, records: &[Record]) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} must not be empty")]
    MissingRequiredField(RequiredField),
    #[error(transparent)]
    InvalidGrade(#[from] InvalidGrade),
    #[error("student not found: {0}")]
    NotFound(String),
    #[error("student id {0} appears more than once")]
    DuplicateId(String),
    #[error("backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::MissingRequiredField(_) => "missing_required_field",
            StoreError::InvalidGrade(_) => "invalid_grade",
            StoreError::NotFound(_) => "not_found",
            StoreError::DuplicateId(_) => "duplicate_id",
            StoreError::Backend(_) => "backend_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type SnapshotCallback = Box<dyn FnMut(&[Record])>;

/// Owns the canonical record list. Every mutation is persisted through the
/// backend before the in-memory list changes, then subscribers get the
/// full list (never a diff).
pub struct RecordStore {
    backend: Box<dyn Backend>,
    records: Vec<Record>,
    subscribers: Vec<(SubscriptionId, SnapshotCallback)>,
    next_subscription: u64,
}

impl RecordStore {
    pub fn open(backend: Box<dyn Backend>) -> anyhow::Result<Self> {
        let records = backend.list()?;
        info!(
            backend = backend.kind(),
            students = records.len(),
            "record store opened"
        );
        Ok(Self {
            backend,
            records,
            subscribers: Vec::new(),
            next_subscription: 1,
        })
    }

    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    pub fn list(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn add(&mut self, draft: &RecordDraft) -> Result<Record, StoreError> {
        let draft = draft
            .normalized()
            .map_err(StoreError::MissingRequiredField)?;
        let id = self.backend.allocate_id();
        let record = draft.into_record(id);
        self.backend.upsert(&record)?;
        self.records.push(record.clone());
        info!(student_id = %record.id, "student added");
        self.notify();
        Ok(record)
    }

    pub fn update(&mut self, id: &str, draft: &RecordDraft) -> Result<Record, StoreError> {
        let Some(pos) = self.position(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let draft = draft
            .normalized()
            .map_err(StoreError::MissingRequiredField)?;
        let record = draft.into_record(id.to_string());
        self.backend.upsert(&record)?;
        self.records[pos] = record.clone();
        info!(student_id = %id, "student updated");
        self.notify();
        Ok(record)
    }

    pub fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        let Some(pos) = self.position(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        self.backend.delete(id)?;
        self.records.remove(pos);
        info!(student_id = %id, "student deleted");
        self.notify();
        Ok(())
    }

    /// Swaps the whole roster for `records`, keeping their ids (fresh ids
    /// are allocated for blank ones). All-or-nothing: on any error the list
    /// is untouched and no snapshot goes out.
    pub fn replace_all(&mut self, records: Vec<Record>) -> Result<usize, StoreError> {
        let mut incoming = Vec::with_capacity(records.len());
        for r in records {
            let draft = RecordDraft {
                name: r.name,
                email: r.email,
                class_label: r.class_label,
                subjects: r.subjects,
            }
            .normalized()
            .map_err(StoreError::MissingRequiredField)?;
            let id = if r.id.trim().is_empty() {
                self.backend.allocate_id()
            } else {
                r.id
            };
            incoming.push(draft.into_record(id));
        }

        let mut seen = HashSet::with_capacity(incoming.len());
        for r in &incoming {
            if !seen.insert(r.id.as_str()) {
                return Err(StoreError::DuplicateId(r.id.clone()));
            }
        }

        self.backend.replace_all(&incoming)?;
        self.records = incoming;
        info!(students = self.records.len(), "roster replaced");
        self.notify();
        Ok(self.records.len())
    }

    pub fn stats(&self) -> RosterStats {
        calc::roster_stats(&self.records)
    }

    pub fn search(&self, query: &str) -> Vec<&Record> {
        calc::filter_by_name(&self.records, query)
    }

    /// Registers `callback` and delivers the current list to it right away.
    pub fn on_snapshot(&mut self, mut callback: SnapshotCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        callback(&self.records);
        self.subscribers.push((id, callback));
        debug!(subscription = id.0, "snapshot subscriber registered");
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn notify(&mut self) {
        for (_, cb) in self.subscribers.iter_mut() {
            cb(&self.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grades::Grade;
    use crate::record::SubjectGrade;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory backend recording every write; `fail_writes` simulates an
    /// unreachable store.
    #[derive(Default, Clone)]
    pub struct MemoryBackend {
        pub rows: Rc<RefCell<Vec<Record>>>,
        pub writes: Rc<RefCell<usize>>,
        pub fail_writes: Rc<RefCell<bool>>,
        next_id: u64,
    }

    impl Backend for MemoryBackend {
        fn kind(&self) -> &'static str {
            "memory"
        }

        fn list(&self) -> anyhow::Result<Vec<Record>> {
            Ok(self.rows.borrow().clone())
        }

        fn allocate_id(&mut self) -> String {
            self.next_id += 1;
            format!("id-{}", self.next_id)
        }

        fn upsert(&mut self, record: &Record) -> anyhow::Result<()> {
            if *self.fail_writes.borrow() {
                anyhow::bail!("store offline");
            }
            *self.writes.borrow_mut() += 1;
            let mut rows = self.rows.borrow_mut();
            match rows.iter_mut().find(|r| r.id == record.id) {
                Some(r) => *r = record.clone(),
                None => rows.push(record.clone()),
            }
            Ok(())
        }

        fn delete(&mut self, id: &str) -> anyhow::Result<()> {
            if *self.fail_writes.borrow() {
                anyhow::bail!("store offline");
            }
            *self.writes.borrow_mut() += 1;
            self.rows.borrow_mut().retain(|r| r.id != id);
            Ok(())
        }

        fn replace_all(&mut self, records: &[Record]) -> anyhow::Result<()> {
            if *self.fail_writes.borrow() {
                anyhow::bail!("store offline");
            }
            *self.writes.borrow_mut() += 1;
            *self.rows.borrow_mut() = records.to_vec();
            Ok(())
        }
    }

    fn subject(name: &str, grade: Grade) -> SubjectGrade {
        SubjectGrade {
            subject_name: name.to_string(),
            grade,
        }
    }

    fn kim() -> RecordDraft {
        RecordDraft {
            name: "Kim".to_string(),
            email: "k@x.com".to_string(),
            class_label: "10A".to_string(),
            subjects: vec![subject("Math", Grade::S), subject("Sci", Grade::B)],
        }
    }

    fn named(name: &str) -> RecordDraft {
        RecordDraft {
            name: name.to_string(),
            ..kim()
        }
    }

    fn open() -> (RecordStore, MemoryBackend) {
        let backend = MemoryBackend::default();
        let store = RecordStore::open(Box::new(backend.clone())).expect("open store");
        (store, backend)
    }

    #[test]
    fn kim_lifecycle_add_update_remove() {
        let (mut store, backend) = open();

        let added = store.add(&kim()).expect("add");
        assert_eq!(added.gpa(), 9.0);
        assert_eq!(store.list().len(), 1);
        assert_eq!(backend.rows.borrow().len(), 1);

        let mut edit = kim();
        edit.subjects = vec![subject("Math", Grade::F)];
        let updated = store.update(&added.id, &edit).expect("update");
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.gpa(), 0.0);
        assert_eq!(store.get(&added.id).map(|r| r.gpa()), Some(0.0));

        store.remove(&added.id).expect("remove");
        assert!(store.list().is_empty());
        let again = store.remove(&added.id);
        assert!(matches!(again, Err(StoreError::NotFound(ref id)) if *id == added.id));
    }

    #[test]
    fn add_with_blank_name_changes_nothing() {
        let (mut store, backend) = open();
        store.add(&named("Ana")).expect("add");

        let err = store.add(&named("  ")).expect_err("blank name");
        assert!(matches!(
            err,
            StoreError::MissingRequiredField(RequiredField::Name)
        ));
        assert_eq!(err.code(), "missing_required_field");
        assert_eq!(store.list().len(), 1);
        assert_eq!(*backend.writes.borrow(), 1);
    }

    #[test]
    fn update_validates_before_writing() {
        let (mut store, backend) = open();
        let r = store.add(&kim()).expect("add");
        let mut bad = kim();
        bad.email = String::new();
        let err = store.update(&r.id, &bad).expect_err("blank email");
        assert!(matches!(
            err,
            StoreError::MissingRequiredField(RequiredField::Email)
        ));
        assert_eq!(store.get(&r.id).map(|x| x.email.as_str()), Some("k@x.com"));
        assert_eq!(*backend.writes.borrow(), 1);
    }

    #[test]
    fn update_of_missing_id_is_not_found() {
        let (mut store, _) = open();
        let err = store.update("nope", &kim()).expect_err("missing");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn update_keeps_list_position() {
        let (mut store, _) = open();
        let a = store.add(&named("Ana")).expect("add");
        store.add(&named("Bo")).expect("add");
        store.update(&a.id, &named("Anabel")).expect("update");
        let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Anabel", "Bo"]);
    }

    #[test]
    fn remove_while_filtered_targets_the_id() {
        let (mut store, _) = open();
        store.add(&named("Anita")).expect("add");
        store.add(&named("Bo")).expect("add");
        let joanne = store.add(&named("Joanne")).expect("add");

        // Second visible row of the "an" filter is Joanne, third in the list.
        let visible: Vec<String> = store.search("an").iter().map(|r| r.id.clone()).collect();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[1], joanne.id);

        store.remove(&visible[1]).expect("remove");
        let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Anita", "Bo"]);
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let (mut store, backend) = open();
        let r = store.add(&kim()).expect("add");
        *backend.fail_writes.borrow_mut() = true;

        let err = store.add(&named("Bo")).expect_err("offline");
        assert_eq!(err.code(), "backend_failed");
        assert!(store.remove(&r.id).is_err());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn subscribers_get_full_list_on_every_change() {
        let (mut store, _) = open();
        let seen: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let sub = store.on_snapshot(Box::new(move |records| {
            sink.borrow_mut()
                .push(records.iter().map(|r| r.name.clone()).collect());
        }));

        let a = store.add(&named("Ana")).expect("add");
        store.add(&named("Bo")).expect("add");
        store.update(&a.id, &named("Ann")).expect("update");
        store.remove(&a.id).expect("remove");
        let _ = store.add(&named("")).expect_err("rejected");

        let expected: Vec<Vec<String>> = vec![
            vec![],
            vec!["Ana".into()],
            vec!["Ana".into(), "Bo".into()],
            vec!["Ann".into(), "Bo".into()],
            vec!["Bo".into()],
        ];
        assert_eq!(*seen.borrow(), expected);

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.add(&named("Cy")).expect("add");
        assert_eq!(seen.borrow().len(), 5);
    }

    #[test]
    fn open_loads_existing_rows() {
        let backend = MemoryBackend::default();
        backend
            .rows
            .borrow_mut()
            .push(kim().into_record("existing".to_string()));
        let store = RecordStore::open(Box::new(backend)).expect("open");
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.stats().top_name, "Kim");
    }

    #[test]
    fn replace_all_swaps_roster() {
        let (mut store, backend) = open();
        store.add(&named("Old")).expect("add");
        let incoming = vec![
            named("New1").into_record("keep-me".to_string()),
            named("New2").into_record(String::new()),
        ];
        let n = store.replace_all(incoming).expect("replace");
        assert_eq!(n, 2);
        let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["New1", "New2"]);
        assert_eq!(store.list()[0].id, "keep-me");
        assert!(!store.list()[1].id.is_empty());
        assert_eq!(backend.rows.borrow().len(), 2);
    }

    #[test]
    fn replace_all_rejects_repeated_ids() {
        let (mut store, backend) = open();
        let old = store.add(&named("Old")).expect("add");
        let incoming = vec![
            named("Ana").into_record("dup".to_string()),
            named("Bo").into_record("dup".to_string()),
        ];

        let err = store.replace_all(incoming).expect_err("repeated id");
        assert!(matches!(err, StoreError::DuplicateId(ref id) if id == "dup"));
        assert_eq!(err.code(), "duplicate_id");
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].id, old.id);
        assert_eq!(backend.rows.borrow().len(), 1);

        store.remove(&old.id).expect("remove");
        assert!(matches!(store.remove(&old.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn failed_replace_keeps_roster_and_sends_no_snapshot() {
        let (mut store, backend) = open();
        store.add(&named("Old1")).expect("add");
        store.add(&named("Old2")).expect("add");
        let seen: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
        let sink = Rc::clone(&seen);
        store.on_snapshot(Box::new(move |records| {
            sink.borrow_mut()
                .push(records.iter().map(|r| r.name.clone()).collect());
        }));

        *backend.fail_writes.borrow_mut() = true;
        let incoming = vec![
            named("New1").into_record(String::new()),
            named("New2").into_record(String::new()),
        ];
        let err = store.replace_all(incoming).expect_err("offline");
        assert_eq!(err.code(), "backend_failed");

        let names: Vec<&str> = store.list().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Old1", "Old2"]);
        let stored: Vec<String> = backend.rows.borrow().iter().map(|r| r.name.clone()).collect();
        assert_eq!(stored, vec!["Old1", "Old2"]);
        // Only the delivery made on subscribe.
        assert_eq!(seen.borrow().len(), 1);

        *backend.fail_writes.borrow_mut() = false;
        store
            .replace_all(vec![named("New1").into_record(String::new())])
            .expect("replace");
        assert_eq!(seen.borrow().last().cloned(), Some(vec!["New1".to_string()]));
    }
}
