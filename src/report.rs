use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{GradeDiff, GradeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Every grade on the page, no comparison.
    Full,
    /// Compared with the log, unchanged grades listed too.
    Compared,
    /// Compared with the log, only new and changed grades.
    ChangesOnly,
}

pub struct ReportContext<'a> {
    pub generated_on: NaiveDate,
    pub mode: ReportMode,
    pub baseline_label: Option<&'a str>,
    pub skipped_rows: usize,
}

fn grade_line(output: &mut String, record: &GradeRecord) {
    let _ = writeln!(
        output,
        "- {} {}: {} ({})",
        record.date, record.course, record.assignment, record.grade
    );
}

pub fn build_report(ctx: &ReportContext<'_>, diff: &GradeDiff) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Report");
    match ctx.baseline_label {
        Some(label) => {
            let _ = writeln!(output, "Generated {} (compared with {})", ctx.generated_on, label);
        }
        None => {
            let _ = writeln!(output, "Generated {}", ctx.generated_on);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## {}",
        if ctx.mode == ReportMode::Full { "Grades" } else { "New grades" }
    );
    if diff.added.is_empty() {
        let _ = writeln!(output, "No new grades.");
    } else {
        for record in &diff.added {
            grade_line(&mut output, record);
        }
    }

    if ctx.mode != ReportMode::Full {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Changed grades");
        if diff.changed.is_empty() {
            let _ = writeln!(output, "No grades changed.");
        } else {
            for change in &diff.changed {
                let record = &change.record;
                let _ = writeln!(
                    output,
                    "- {} {}: {} ({} -> {})",
                    record.date, record.course, record.assignment, change.old_grade, record.grade
                );
            }
        }
    }

    if ctx.mode == ReportMode::Compared {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Unchanged grades");
        if diff.unchanged.is_empty() {
            let _ = writeln!(output, "No unchanged grades.");
        } else {
            for record in &diff.unchanged {
                grade_line(&mut output, record);
            }
        }
    }

    if ctx.skipped_rows > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{} row(s) on the grades page could not be read and were skipped.",
            ctx.skipped_rows
        );
    }

    output
}
