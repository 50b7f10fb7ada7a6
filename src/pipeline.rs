use chrono::{DateTime, TimeZone, Utc};
use scraper::Html;
use tracing::{debug, warn};

use crate::diff::{self, Baseline};
use crate::extract::RowExtractor;
use crate::models::{GradeDiff, GradeRecord};
use crate::records;
use crate::report::ReportMode;
use crate::store::{SnapshotStore, StoreError};

/// Grades read off one page, plus how many rows had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub records: Vec<GradeRecord>,
    pub skipped: usize,
}

/// Turn a grades page into de-duplicated records, dated relative to
/// `reference`. Rows that do not fit the table layout are logged and skipped.
pub fn extract_batch<Tz: TimeZone>(page: &str, reference: &DateTime<Tz>) -> Batch {
    let html = Html::parse_document(page);
    let extractor = RowExtractor::new();

    let mut batch = Batch::default();
    let mut records = Vec::new();
    for row in extractor.rows(&html) {
        match row {
            Ok(raw) => records.push(records::build(raw, reference)),
            Err(e) => {
                warn!(error = %e, "skipping malformed grade row");
                batch.skipped += 1;
            }
        }
    }

    batch.records = records::dedup_by_key(records);
    debug!(records = batch.records.len(), skipped = batch.skipped, "extracted grades");
    batch
}

/// How a run compares against what it logged before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub baseline: Option<Baseline>,
    pub report: ReportMode,
}

impl Comparison {
    pub fn from_flags(weekly: bool, diff_only: bool, window_days: u32) -> Self {
        let baseline = if weekly {
            Some(Baseline::Window { days: window_days })
        } else if diff_only {
            Some(Baseline::Latest)
        } else {
            None
        };
        let report = match (baseline, diff_only) {
            (None, _) => ReportMode::Full,
            (Some(_), true) => ReportMode::ChangesOnly,
            (Some(_), false) => ReportMode::Compared,
        };
        Self { baseline, report }
    }

    pub fn baseline_label(&self) -> Option<String> {
        self.baseline.map(|baseline| match baseline {
            Baseline::Window { days } => format!("grades as of {days} days ago"),
            Baseline::Latest => "the last recorded grades".to_string(),
        })
    }

    /// Classify the batch, or report it all as new when no baseline applies.
    pub fn run(
        &self,
        current: Vec<GradeRecord>,
        store: &SnapshotStore,
        now: DateTime<Utc>,
    ) -> Result<GradeDiff, StoreError> {
        let Some(baseline) = self.baseline else {
            return Ok(GradeDiff::all_added(current));
        };
        let previous = baseline.load(store, now)?;
        debug!(baseline = previous.len(), ?baseline, "loaded baseline");
        Ok(diff::diff(&current, &previous))
    }
}
