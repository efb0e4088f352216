use crate::grades::Grade;
use crate::record::{Record, SubjectGrade};
use crate::store::Backend;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

pub const DB_FILE: &str = "roster.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            class_label TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_subjects(
            student_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            subject_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            PRIMARY KEY(student_id, position),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    Ok(conn)
}

fn insert_subjects(tx: &Transaction<'_>, record: &Record) -> rusqlite::Result<()> {
    let mut ins = tx.prepare(
        "INSERT INTO student_subjects(student_id, position, subject_name, grade)
         VALUES(?, ?, ?, ?)",
    )?;
    for (i, s) in record.subjects.iter().enumerate() {
        ins.execute((&record.id, i as i64, &s.subject_name, s.grade.letter()))?;
    }
    Ok(())
}

/// Document-collection backend: one `students` row per record, subjects in
/// `student_subjects` keyed by position.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = open_db(workspace)
            .with_context(|| format!("failed to open {}", workspace.join(DB_FILE).display()))?;
        Ok(Self { conn })
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn list(&self) -> anyhow::Result<Vec<Record>> {
        let mut subj_stmt = self.conn.prepare(
            "SELECT student_id, subject_name, grade
             FROM student_subjects
             ORDER BY student_id, position",
        )?;
        let subject_rows = subj_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut subjects_by_student: HashMap<String, Vec<SubjectGrade>> = HashMap::new();
        for (student_id, subject_name, grade) in subject_rows {
            let grade: Grade = grade
                .parse()
                .with_context(|| format!("stored grade for student {}", student_id))?;
            subjects_by_student
                .entry(student_id)
                .or_default()
                .push(SubjectGrade {
                    subject_name,
                    grade,
                });
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, class_label
             FROM students
             ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    class_label: row.get(3)?,
                    subjects: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|mut r| {
                r.subjects = subjects_by_student.remove(&r.id).unwrap_or_default();
                r
            })
            .collect())
    }

    fn upsert(&mut self, record: &Record) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM students WHERE id = ?", [&record.id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_some() {
            tx.execute(
                "UPDATE students
                 SET name = ?, email = ?, class_label = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ?",
                (&record.name, &record.email, &record.class_label, &record.id),
            )?;
            tx.execute(
                "DELETE FROM student_subjects WHERE student_id = ?",
                [&record.id],
            )?;
        } else {
            let sort_order: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
                [],
                |r| r.get(0),
            )?;
            tx.execute(
                "INSERT INTO students(id, name, email, class_label, sort_order, updated_at)
                 VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                (
                    &record.id,
                    &record.name,
                    &record.email,
                    &record.class_label,
                    sort_order,
                ),
            )?;
        }

        insert_subjects(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        // Children first; there is no ON DELETE CASCADE.
        tx.execute("DELETE FROM student_subjects WHERE student_id = ?", [id])?;
        let n = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        if n == 0 {
            anyhow::bail!("student {} is not in the collection", id);
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_all(&mut self, records: &[Record]) -> anyhow::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM student_subjects", [])?;
        tx.execute("DELETE FROM students", [])?;
        for (i, record) in records.iter().enumerate() {
            tx.execute(
                "INSERT INTO students(id, name, email, class_label, sort_order, updated_at)
                 VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                (
                    &record.id,
                    &record.name,
                    &record.email,
                    &record.class_label,
                    i as i64,
                ),
            )
            .with_context(|| format!("failed to insert student {}", record.id))?;
            insert_subjects(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }
}
