use chrono::{DateTime, Days, NaiveDate, TimeZone};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Day,
    Week,
}

impl DateUnit {
    /// Matches on substrings so "day", "days" and "Days ago" all count.
    pub fn parse(unit: &str) -> Option<Self> {
        let unit = unit.to_ascii_lowercase();
        if unit.contains("day") {
            Some(DateUnit::Day)
        } else if unit.contains("week") {
            Some(DateUnit::Week)
        } else {
            None
        }
    }

    fn days(self, magnitude: u32) -> u64 {
        match self {
            DateUnit::Day => u64::from(magnitude),
            DateUnit::Week => u64::from(magnitude) * 7,
        }
    }
}

/// Turn a scraped "N units ago" pair into the calendar date it refers to.
///
/// The reference instant is read in its own time zone and truncated to the
/// date, so two calls on the same day agree no matter the time of day.
/// Units other than days and weeks (months included) are not resolved: the
/// reference date is returned as-is and a warning is logged. That default is
/// lossy, since the site's wording is not fully known.
pub fn resolve<Tz: TimeZone>(magnitude: u32, unit: &str, reference: &DateTime<Tz>) -> NaiveDate {
    let today = reference.date_naive();

    let Some(kind) = DateUnit::parse(unit) else {
        warn!(magnitude, unit, %today, "unrecognized date unit, using the reference date");
        return today;
    };

    match today.checked_sub_days(Days::new(kind.days(magnitude))) {
        Some(date) => date,
        None => {
            warn!(magnitude, unit, %today, "date offset out of range, using the reference date");
            today
        }
    }
}
