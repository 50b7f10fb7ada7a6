use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, Utc};
use tracing::warn;

use crate::models::{GradeChange, GradeDiff, GradeRecord, StoredRecord};
use crate::store::{SnapshotStore, StoreError};

/// Which earlier view of the log a run is compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    /// The grades as they stood `days` days ago.
    Window { days: u32 },
    /// The grade each key had when last recorded, over the whole log.
    Latest,
}

impl Baseline {
    pub fn load(self, store: &SnapshotStore, now: DateTime<Utc>) -> Result<Vec<GradeRecord>, StoreError> {
        match self {
            Baseline::Window { days } => match snapshot_cutoff(now, days) {
                Some(cutoff) => Ok(latest_by_key(store.query_before(cutoff)?)),
                None => {
                    warn!(days, "baseline window reaches past the calendar, comparing with nothing");
                    Ok(Vec::new())
                }
            },
            Baseline::Latest => Ok(latest_by_key(store.query(None)?)),
        }
    }
}

/// Start of the UTC day after `now - days`.
///
/// Anything logged on or before that calendar day was already known `days`
/// days ago. Working in whole days keeps a run from exactly a week earlier
/// inside the snapshot even when it started a few seconds late.
pub fn snapshot_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    now.date_naive()
        .checked_sub_days(Days::new(u64::from(days)))?
        .succ_opt()?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}

/// One record per key, the last the log holds, at the position the key
/// first appeared.
pub fn latest_by_key(entries: Vec<StoredRecord>) -> Vec<GradeRecord> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<GradeRecord> = Vec::new();

    for entry in entries {
        match slots.get(&entry.key) {
            Some(&slot) => records[slot] = entry.into_record(),
            None => {
                slots.insert(entry.key.clone(), records.len());
                records.push(entry.into_record());
            }
        }
    }

    records
}

/// Classify the current batch against a baseline by key.
///
/// Current records keep their extraction order. Keys that only the baseline
/// knows about (the page no longer lists them) are appended to `unchanged`
/// in baseline order, so every key from either side lands in exactly one
/// bucket.
pub fn diff(current: &[GradeRecord], baseline: &[GradeRecord]) -> GradeDiff {
    let previous: HashMap<&str, &GradeRecord> = baseline
        .iter()
        .map(|record| (record.key.as_str(), record))
        .collect();

    let mut result = GradeDiff::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in current {
        if !seen.insert(record.key.as_str()) {
            continue;
        }
        match previous.get(record.key.as_str()) {
            None => result.added.push(record.clone()),
            Some(old) if old.grade != record.grade => result.changed.push(GradeChange {
                record: record.clone(),
                old_grade: old.grade.clone(),
            }),
            Some(_) => result.unchanged.push(record.clone()),
        }
    }

    for record in baseline {
        if seen.insert(record.key.as_str()) {
            result.unchanged.push(record.clone());
        }
    }

    result
}
