use chrono::{Datelike, Month, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use super::pay_period::last_day_of_month;
use crate::error::{AppError, Result};

// "January 1st", "Jul 4 observance"
static FIXED_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([a-z]+)\s+(\d{1,2})(?:st|nd|rd|th)?(?:\s+(observance))?\s*$").unwrap()
});

// "3rd Monday in January", "last thursday in nov"
static NTH_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*([1-5](?:st|nd|rd|th)|first|second|third|fourth|fifth|last)\s+([a-z]+)\s+in\s+([a-z]+)\s*$",
    )
    .unwrap()
});

/// A company holiday whose date is computed from a textual rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holiday {
    pub id: i64,
    pub company_id: i64,
    pub description: String,
    pub config: String,
    /// The date in the current year.
    pub day: NaiveDate,
}

impl Holiday {
    pub fn new(
        id: i64,
        company_id: i64,
        description: impl Into<String>,
        config: impl Into<String>,
    ) -> Result<Self> {
        let description = description.into().trim().to_string();
        let config = config.into().trim().to_string();
        if description.is_empty() {
            return Err(AppError::Validation("Holiday description is required".to_string()));
        }
        let day = calculate(&config, Utc::now().year())?;
        Ok(Self {
            id,
            company_id,
            description,
            config,
            day,
        })
    }

    pub fn date_for_year(&self, year: i32) -> Result<NaiveDate> {
        calculate(&self.config, year)
    }
}

/// Whether `config` is a rule the calculator understands.
pub fn is_valid(config: &str) -> bool {
    calculate(config, Utc::now().year()).is_ok()
}

/// Resolves a holiday rule to a concrete date in `year`.
///
/// Two forms are accepted, case-insensitively:
/// `<month> <day>[st|nd|rd|th] [observance]` where observance moves a
/// Saturday to the preceding Friday and a Sunday to the following Monday,
/// and `<1st..5th|first..fifth|last> <weekday> in <month>`.
pub fn calculate(config: &str, year: i32) -> Result<NaiveDate> {
    if let Some(captures) = FIXED_DAY.captures(config) {
        return fixed_day(config, &captures, year);
    }
    if let Some(captures) = NTH_WEEKDAY.captures(config) {
        return nth_weekday(config, &captures, year);
    }
    Err(AppError::HolidayConfig(format!("Unrecognized holiday rule: {config:?}")))
}

fn fixed_day(config: &str, captures: &Captures<'_>, year: i32) -> Result<NaiveDate> {
    let month = parse_month(config, &captures[1])?;
    let day: u32 = captures[2]
        .parse()
        .map_err(|_| AppError::HolidayConfig(format!("Invalid day in holiday rule: {config:?}")))?;
    let date = NaiveDate::from_ymd_opt(year, month.number_from_month(), day).ok_or_else(|| {
        AppError::HolidayConfig(format!("Holiday rule {config:?} does not exist in {year}"))
    })?;

    if captures.get(3).is_none() {
        return Ok(date);
    }
    let observed = match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    };
    observed.ok_or_else(|| AppError::HolidayConfig(format!("Holiday rule {config:?} is out of range")))
}

fn nth_weekday(config: &str, captures: &Captures<'_>, year: i32) -> Result<NaiveDate> {
    let weekday: Weekday = captures[2]
        .parse()
        .map_err(|_| AppError::HolidayConfig(format!("Invalid weekday in holiday rule: {config:?}")))?;
    let month = parse_month(config, &captures[3])?.number_from_month();

    let ordinal = captures[1].to_ascii_lowercase();
    let nth = match ordinal.as_str() {
        "last" => return last_weekday(config, year, month, weekday),
        "first" => 1,
        "second" => 2,
        "third" => 3,
        "fourth" => 4,
        "fifth" => 5,
        digits => digits[..1].parse::<u8>().map_err(|_| {
            AppError::HolidayConfig(format!("Invalid ordinal in holiday rule: {config:?}"))
        })?,
    };

    NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth).ok_or_else(|| {
        AppError::HolidayConfig(format!("Holiday rule {config:?} does not exist in {year}"))
    })
}

fn last_weekday(config: &str, year: i32, month: u32, weekday: Weekday) -> Result<NaiveDate> {
    let invalid = || AppError::HolidayConfig(format!("Holiday rule {config:?} is out of range"));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let mut day = last_day_of_month(first).ok_or_else(invalid)?;
    while day.weekday() != weekday {
        day = day.pred_opt().ok_or_else(invalid)?;
    }
    Ok(day)
}

fn parse_month(config: &str, value: &str) -> Result<Month> {
    value
        .parse::<Month>()
        .map_err(|_| AppError::HolidayConfig(format!("Invalid month in holiday rule: {config:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rule_validity() {
        assert!(!is_valid(""));
        assert!(!is_valid("J"));
        assert!(!is_valid("Jan"));
        assert!(!is_valid("Jan 1 sometimes"));
        assert!(!is_valid("Feb 30"));
        assert!(is_valid("Jan 1"));
        assert!(is_valid("jan 1st observance"));
        assert!(is_valid("3rd monday in january"));
        assert!(is_valid("last monday in january"));
        assert!(is_valid("first monday in january"));
    }

    #[test]
    fn test_fixed_day() {
        assert_eq!(calculate("December 25th", 2024).unwrap(), date(2024, 12, 25));
        assert_eq!(calculate("jul 4", 2025).unwrap(), date(2025, 7, 4));
    }

    #[test]
    fn test_observance_moves_weekends() {
        // July 4th 2026 is a Saturday, 2027 a Sunday.
        assert_eq!(calculate("July 4th Observance", 2026).unwrap(), date(2026, 7, 3));
        assert_eq!(calculate("July 4th Observance", 2027).unwrap(), date(2027, 7, 5));
        assert_eq!(calculate("July 4th Observance", 2025).unwrap(), date(2025, 7, 4));
    }

    #[test]
    fn test_nth_weekday() {
        assert_eq!(calculate("3rd Monday in January", 2024).unwrap(), date(2024, 1, 15));
        assert_eq!(calculate("4th Thursday in November", 2024).unwrap(), date(2024, 11, 28));
        assert_eq!(calculate("first monday in sep", 2024).unwrap(), date(2024, 9, 2));
    }

    #[test]
    fn test_last_weekday() {
        assert_eq!(calculate("Last Monday in May", 2024).unwrap(), date(2024, 5, 27));
        assert_eq!(calculate("last friday in february", 2024).unwrap(), date(2024, 2, 23));
    }

    #[test]
    fn test_missing_fifth_weekday_is_an_error() {
        let result = calculate("5th Monday in February", 2024);
        assert!(matches!(result, Err(AppError::HolidayConfig(_))));
    }

    #[test]
    fn test_new_holiday_requires_description() {
        assert!(matches!(
            Holiday::new(0, 1, "  ", "Jan 1"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            Holiday::new(0, 1, "Bad", "someday"),
            Err(AppError::HolidayConfig(_))
        ));
    }
}
