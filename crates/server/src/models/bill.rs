//! Billed hours and the compact wire format timesheets are saved with.
//!
//! Each entry is `taskId_[assignmentId]:yyyyMMdd:hours[:reason]` and entries
//! are joined with `;`. Within a reason a backslash escapes the next
//! character, so reasons may carry `;` themselves. Reasons are kept verbatim.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, Result};

const DAY_FORMAT: &str = "%Y%m%d";

/// Identifies a bill within a user's timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillKey {
    pub task_id: i64,
    pub assignment_id: Option<i64>,
    pub day: NaiveDate,
}

impl fmt::Display for BillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.assignment_id {
            Some(assignment_id) => write!(f, "{}_{}:{}", self.task_id, assignment_id, self.day.format(DAY_FORMAT)),
            None => write!(f, "{}_:{}", self.task_id, self.day.format(DAY_FORMAT)),
        }
    }
}

/// A persisted bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bill {
    pub id: i64,
    pub assignment_id: Option<i64>,
    pub task_id: i64,
    pub user_id: i64,
    pub day: NaiveDate,
    pub hours: Decimal,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

impl Bill {
    pub fn key(&self) -> BillKey {
        BillKey {
            task_id: self.task_id,
            assignment_id: self.assignment_id,
            day: self.day,
        }
    }
}

/// A bill as submitted by a client, before it is matched against storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillEntry {
    pub task_id: i64,
    pub assignment_id: Option<i64>,
    pub day: NaiveDate,
    pub hours: Decimal,
    pub reason: Option<String>,
}

impl BillEntry {
    pub fn key(&self) -> BillKey {
        BillKey {
            task_id: self.task_id,
            assignment_id: self.assignment_id,
            day: self.day,
        }
    }
}

impl fmt::Display for BillEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key(), self.hours)?;
        if let Some(reason) = self.reason.as_deref().filter(|reason| !reason.is_empty()) {
            f.write_str(":")?;
            for c in reason.chars() {
                if matches!(c, '\\' | ';') {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Normalizes hours to two decimal places, rejecting negative values and
/// values with more precision than cents.
pub fn normalize_hours(hours: Decimal) -> Result<Decimal> {
    if hours.is_sign_negative() && !hours.is_zero() {
        return Err(AppError::Validation(format!("Hours cannot be negative: {hours}")));
    }
    if hours.normalize().scale() > 2 {
        return Err(AppError::Validation(format!(
            "Hours may have at most two decimal places: {hours}"
        )));
    }
    let mut hours = hours.abs();
    hours.rescale(2);
    Ok(hours)
}

/// Parses the wire format. Any malformed entry rejects the whole payload.
pub fn decode(data: &str) -> Result<Vec<BillEntry>> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for raw in split_entries(data).into_iter().filter(|raw| !raw.trim().is_empty()) {
        let entry = decode_entry(raw)?;
        if !seen.insert(entry.key()) {
            return Err(AppError::Validation(format!(
                "Duplicate timesheet data entry: {}",
                entry.key()
            )));
        }
        entries.push(entry);
    }

    Ok(entries)
}

fn decode_entry(raw: &str) -> Result<BillEntry> {
    let invalid = || AppError::Validation(format!("Invalid timesheet data entry: {raw:?}"));

    let pieces: Vec<&str> = raw.splitn(4, ':').collect();
    if pieces.len() < 3 {
        return Err(invalid());
    }

    let (task, assignment) = pieces[0].split_once('_').unwrap_or((pieces[0], ""));
    let task_id = parse_id(task).ok_or_else(invalid)?;
    let assignment_id = match assignment.trim() {
        "" => None,
        value => Some(parse_id(value).ok_or_else(invalid)?),
    };

    let day = NaiveDate::parse_from_str(pieces[1].trim(), DAY_FORMAT).map_err(|_| invalid())?;
    let hours = Decimal::from_str(pieces[2].trim()).map_err(|_| invalid())?;
    let hours = normalize_hours(hours)?;
    let reason = pieces.get(3).filter(|reason| !reason.is_empty()).map(|reason| unescape(reason));

    Ok(BillEntry {
        task_id,
        assignment_id,
        day,
        hours,
        reason,
    })
}

/// Splits on every `;` not preceded by an escaping backslash.
fn split_entries(data: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in data.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ';' => {
                entries.push(&data[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&data[start..]);
    entries
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

fn parse_id(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|id| *id >= 0)
}

/// Renders entries in the wire format accepted by [`decode`].
pub fn encode<'a>(entries: impl IntoIterator<Item = &'a BillEntry>) -> String {
    entries
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}
