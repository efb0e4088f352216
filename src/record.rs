use crate::calc;
use crate::grades::Grade;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrade {
    #[serde(alias = "subName")]
    pub subject_name: String,
    pub grade: Grade,
}

/// One student. `gpa` is never stored as truth; see [`Record::gpa`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(alias = "classVal")]
    pub class_label: String,
    #[serde(default)]
    pub subjects: Vec<SubjectGrade>,
}

impl Record {
    pub fn gpa(&self) -> f64 {
        calc::gpa(self.subjects.iter().map(|s| s.grade))
    }

    /// Wire shape shared by IPC results, snapshot events and bundles.
    pub fn to_json(&self) -> serde_json::Value {
        let gpa = self.gpa();
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "classLabel": self.class_label,
            "subjects": self.subjects,
            "gpa": gpa,
            "gpaText": calc::format_gpa(gpa),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Name,
    Email,
    ClassLabel,
}

impl RequiredField {
    pub fn as_str(self) -> &'static str {
        match self {
            RequiredField::Name => "name",
            RequiredField::Email => "email",
            RequiredField::ClassLabel => "classLabel",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form contents for add/edit; carries no id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub name: String,
    pub email: String,
    pub class_label: String,
    pub subjects: Vec<SubjectGrade>,
}

impl RecordDraft {
    /// Trims the text fields and drops unnamed subject rows, or reports the
    /// first blank required field (name, email, classLabel order).
    pub fn normalized(&self) -> Result<RecordDraft, RequiredField> {
        let name = self.name.trim();
        let email = self.email.trim();
        let class_label = self.class_label.trim();
        if name.is_empty() {
            return Err(RequiredField::Name);
        }
        if email.is_empty() {
            return Err(RequiredField::Email);
        }
        if class_label.is_empty() {
            return Err(RequiredField::ClassLabel);
        }

        let subjects = self
            .subjects
            .iter()
            .filter_map(|s| {
                let t = s.subject_name.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(SubjectGrade {
                        subject_name: t.to_string(),
                        grade: s.grade,
                    })
                }
            })
            .collect();

        Ok(RecordDraft {
            name: name.to_string(),
            email: email.to_string(),
            class_label: class_label.to_string(),
            subjects,
        })
    }

    pub fn into_record(self, id: String) -> Record {
        Record {
            id,
            name: self.name,
            email: self.email,
            class_label: self.class_label,
            subjects: self.subjects,
        }
    }
}
