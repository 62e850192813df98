use chrono::NaiveDate;

use crate::error::{AppError, Result};

pub mod auth;
pub mod holidays;
pub mod manager;
pub mod profile;
pub mod supervisors;
pub mod timesheets;

/// Parses a `yyyyMMdd` path segment.
pub(crate) fn parse_day(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {value}")))
}
