use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{GradeRecord, StoredRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("grade log {} is unavailable", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("grade log {} has an unreadable entry", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Append-only CSV log of every grade ever extracted.
///
/// Rows are never rewritten or removed. A key recorded on several runs shows
/// up once per run, each copy stamped with its own extraction time.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, source: io::Error) -> StoreError {
        StoreError::Unavailable {
            path: self.path.clone(),
            source,
        }
    }

    /// Add one run's records to the end of the log, writing the header row
    /// first when the log is new or empty.
    pub fn append(
        &self,
        records: &[GradeRecord],
        at: DateTime<Utc>,
        run_id: Uuid,
    ) -> Result<usize, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.unavailable(e))?;
        let is_empty = file.metadata().map_err(|e| self.unavailable(e))?.len() == 0;

        // One buffered write per run keeps a run's rows contiguous in the log.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_empty)
            .from_writer(Vec::new());
        for record in records {
            writer
                .serialize(StoredRecord::new(record, at, run_id))
                .map_err(|e| self.unavailable(e.into()))?;
        }
        let buf = writer
            .into_inner()
            .map_err(|e| self.unavailable(e.into_error()))?;

        file.write_all(&buf).map_err(|e| self.unavailable(e))?;
        file.flush().map_err(|e| self.unavailable(e))?;

        Ok(records.len())
    }

    /// Everything extracted at or after `since`, in log order. A log that
    /// does not exist yet reads as empty.
    pub fn query(&self, since: Option<DateTime<Utc>>) -> Result<Vec<StoredRecord>, StoreError> {
        self.read(|entry| since.map_or(true, |since| entry.extracted_at >= since))
    }

    /// Everything extracted strictly before `until`, in log order.
    pub fn query_before(&self, until: DateTime<Utc>) -> Result<Vec<StoredRecord>, StoreError> {
        self.read(|entry| entry.extracted_at < until)
    }

    fn read<F>(&self, keep: F) -> Result<Vec<StoredRecord>, StoreError>
    where
        F: Fn(&StoredRecord) -> bool,
    {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };

        let mut reader = csv::Reader::from_reader(file);
        let mut entries = Vec::new();

        for result in reader.deserialize::<StoredRecord>() {
            let entry = result.map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
            if keep(&entry) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn record(course: &str, assignment: &str, grade: &str) -> GradeRecord {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        GradeRecord {
            key: crate::records::record_key(date, course, assignment),
            date,
            course: course.to_string(),
            assignment: assignment.to_string(),
            grade: grade.to_string(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 7, 0, 0).unwrap()
    }

    #[test]
    fn missing_log_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        assert!(store.query(None).unwrap().is_empty());
    }

    #[test]
    fn appends_accumulate_with_a_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        let first_run = Uuid::new_v4();
        let second_run = Uuid::new_v4();

        store.append(&[record("Math", "HW1", "90")], t0(), first_run).unwrap();
        store
            .append(
                &[record("Math", "HW1", "95"), record("Art", "Sketch", "Missing")],
                t0() + Duration::days(1),
                second_run,
            )
            .unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("key,")).count(), 1);
        assert!(text.starts_with("key,date,course,assignment,grade,extracted_at,run_id\n"));

        let entries = store.query(None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].grade, "90");
        assert_eq!(entries[0].run_id, first_run);
        assert_eq!(entries[1].key, entries[0].key);
        assert_eq!(entries[1].grade, "95");
        assert_eq!(entries[2].run_id, second_run);
        assert_eq!(entries[2].clone().into_record(), record("Art", "Sketch", "Missing"));
    }

    #[test]
    fn dates_are_written_as_iso_days() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        store.append(&[record("Math", "HW1", "90")], t0(), Uuid::new_v4()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("2024-03-07-Math-HW1,2024-03-07,Math,HW1,90,"));
    }

    #[test]
    fn query_filters_by_extraction_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        store.append(&[record("Math", "HW1", "80")], t0(), Uuid::new_v4()).unwrap();
        store
            .append(&[record("Math", "HW1", "85")], t0() + Duration::days(3), Uuid::new_v4())
            .unwrap();

        let since = store.query(Some(t0() + Duration::days(3))).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].grade, "85");
        assert_eq!(store.query(Some(t0())).unwrap().len(), 2);
        assert!(store.query(Some(t0() + Duration::days(4))).unwrap().is_empty());
    }

    #[test]
    fn query_before_excludes_the_bound() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        store.append(&[record("Math", "HW1", "80")], t0(), Uuid::new_v4()).unwrap();
        store
            .append(&[record("Math", "HW1", "85")], t0() + Duration::days(3), Uuid::new_v4())
            .unwrap();

        let before = store.query_before(t0() + Duration::days(3)).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].grade, "80");
        assert!(store.query_before(t0()).unwrap().is_empty());
    }

    #[test]
    fn names_with_commas_and_quotes_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("grades.csv"));
        let tricky = record("English, Honors", "Read \"Hamlet\"", "A-");
        store.append(&[tricky.clone()], t0(), Uuid::new_v4()).unwrap();

        assert_eq!(store.query(None).unwrap()[0].clone().into_record(), tricky);
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("grades.csv"));
        store.append(&[record("Math", "HW1", "90")], t0(), Uuid::new_v4()).unwrap();
        assert_eq!(store.query(None).unwrap().len(), 1);
    }

    #[test]
    fn unwritable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending.
        let store = SnapshotStore::new(dir.path());
        let err = store.append(&[record("Math", "HW1", "90")], t0(), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn garbage_rows_are_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.csv");
        fs::write(
            &path,
            "key,date,course,assignment,grade,extracted_at,run_id\nk,not-a-date,Math,HW,90,nope,nope\n",
        )
        .unwrap();

        let err = SnapshotStore::new(path).query(None).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
