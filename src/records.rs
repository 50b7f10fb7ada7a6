use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, TimeZone};
use tracing::debug;

use crate::dates;
use crate::models::{GradeRecord, RawRow};

const KEY_SEPARATOR: char = '-';
const KEY_ESCAPE: char = '\\';

/// Identity of a grade entry: `date-course-assignment`.
///
/// The date is always `YYYY-MM-DD`, so its own dashes are fixed in place.
/// Dashes and backslashes inside course and assignment names are
/// backslash-escaped, which keeps distinct triples from ever sharing a key.
pub fn record_key(date: NaiveDate, course: &str, assignment: &str) -> String {
    let mut key = date.format("%Y-%m-%d").to_string();
    for part in [course, assignment] {
        key.push(KEY_SEPARATOR);
        push_escaped(&mut key, part);
    }
    key
}

fn push_escaped(out: &mut String, field: &str) {
    for ch in field.chars() {
        if ch == KEY_SEPARATOR || ch == KEY_ESCAPE {
            out.push(KEY_ESCAPE);
        }
        out.push(ch);
    }
}

/// Drop a trailing percent sign; any other grade text is kept verbatim.
pub fn clean_grade(text: &str) -> String {
    text.trim().trim_end_matches('%').trim_end().to_string()
}

pub fn build<Tz: TimeZone>(raw: RawRow, reference: &DateTime<Tz>) -> GradeRecord {
    let date = dates::resolve(raw.date_magnitude, &raw.date_unit, reference);
    GradeRecord {
        key: record_key(date, &raw.course, &raw.assignment),
        date,
        grade: clean_grade(&raw.grade_text),
        course: raw.course,
        assignment: raw.assignment,
    }
}

/// Keep the first record seen for each key, preserving order.
pub fn dedup_by_key(records: Vec<GradeRecord>) -> Vec<GradeRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.key.clone());
            if !fresh {
                debug!(key = %record.key, "dropping repeated grade row");
            }
            fresh
        })
        .collect()
}
