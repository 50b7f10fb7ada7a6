use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One table row as read off the grades page, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub date_magnitude: u32,
    pub date_unit: String,
    pub course: String,
    pub assignment: String,
    pub grade_text: String,
}

/// A single (date, course, assignment, grade) observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub key: String,
    pub date: NaiveDate,
    pub course: String,
    pub assignment: String,
    pub grade: String,
}

/// A grade record as it sits in the snapshot log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub date: NaiveDate,
    pub course: String,
    pub assignment: String,
    pub grade: String,
    pub extracted_at: DateTime<Utc>,
    pub run_id: Uuid,
}

impl StoredRecord {
    pub fn new(record: &GradeRecord, extracted_at: DateTime<Utc>, run_id: Uuid) -> Self {
        Self {
            key: record.key.clone(),
            date: record.date,
            course: record.course.clone(),
            assignment: record.assignment.clone(),
            grade: record.grade.clone(),
            extracted_at,
            run_id,
        }
    }

    pub fn into_record(self) -> GradeRecord {
        GradeRecord {
            key: self.key,
            date: self.date,
            course: self.course,
            assignment: self.assignment,
            grade: self.grade,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeChange {
    pub record: GradeRecord,
    pub old_grade: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeDiff {
    pub added: Vec<GradeRecord>,
    pub changed: Vec<GradeChange>,
    pub unchanged: Vec<GradeRecord>,
}

impl GradeDiff {
    /// Report every record as new, without consulting any baseline.
    pub fn all_added(current: Vec<GradeRecord>) -> Self {
        Self {
            added: current,
            ..Self::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty()
    }
}
