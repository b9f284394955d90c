//! Calendar-week arithmetic for credential rotation.
//!
//! A credential is scoped to one ISO week: Monday 00:00:00.000 through
//! Sunday 23:59:59.999 (UTC). Week identifiers come from chrono's ISO week
//! routines so year-boundary weeks resolve correctly (the first days of
//! January can belong to the previous ISO year, and vice versa).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A calendar key identifying one Monday-to-Sunday week, e.g. `"2026-W35"`.
///
/// The year component is the ISO week-year, not the calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekId(String);

impl WeekId {
    /// Compute the week id containing the given instant.
    pub fn for_instant(at: DateTime<Utc>) -> Self {
        let iso = at.iso_week();
        Self(format!("{:04}-W{:02}", iso.year(), iso.week()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WeekId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == 8
            && s.as_bytes()[4] == b'-'
            && s.as_bytes()[5] == b'W'
            && s[..4].chars().all(|c| c.is_ascii_digit())
            && s[6..].chars().all(|c| c.is_ascii_digit());
        if !valid {
            return Err(CoreError::InvalidWeekId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// The first instant of the week containing `at`: Monday 00:00:00.000 UTC.
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let back = u64::from(date.weekday().number_from_monday() - 1);
    let monday = date - Days::new(back);
    monday
        .and_hms_milli_opt(0, 0, 0, 0)
        .expect("midnight is a valid wall-clock time")
        .and_utc()
}

/// The last instant of the week containing `at`: Sunday 23:59:59.999 UTC.
///
/// Credentials expire at this instant; validation at exactly this time still
/// succeeds, validation any later fails.
pub fn week_end(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let forward = u64::from(7 - date.weekday().number_from_monday());
    let sunday = date + Days::new(forward);
    sunday
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("end of day is a valid wall-clock time")
        .and_utc()
}
