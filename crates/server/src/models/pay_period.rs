use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::holiday::Holiday;
use crate::error::{AppError, Result};

/// How often a company's pay periods recur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayPeriodType {
    Weekly,
    BiWeekly,
    Monthly,
    SemiMonthly,
    /// Boundaries chosen by hand; neighbors cannot be derived.
    Custom,
}

impl PayPeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayPeriodType::Weekly => "WEEKLY",
            PayPeriodType::BiWeekly => "BI_WEEKLY",
            PayPeriodType::Monthly => "MONTHLY",
            PayPeriodType::SemiMonthly => "SEMI_MONTHLY",
            PayPeriodType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for PayPeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayPeriodType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        [
            PayPeriodType::Weekly,
            PayPeriodType::BiWeekly,
            PayPeriodType::Monthly,
            PayPeriodType::SemiMonthly,
            PayPeriodType::Custom,
        ]
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| AppError::Validation(format!("Invalid pay period type: {value}")))
    }
}

/// An inclusive range of days over which a timesheet accumulates hours.
///
/// Values are immutable: `previous` and `next` always build a new period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PayPeriod {
    company_id: i64,
    #[serde(rename = "type")]
    kind: PayPeriodType,
    begin: NaiveDate,
    end: NaiveDate,
}

impl PayPeriod {
    pub fn new(company_id: i64, kind: PayPeriodType, begin: NaiveDate, end: NaiveDate) -> Result<Self> {
        if company_id < 0 {
            return Err(AppError::Validation("Invalid negative company id".to_string()));
        }
        if begin > end {
            return Err(AppError::Validation(format!(
                "Pay period begin {begin} is after its end {end}"
            )));
        }
        Ok(Self {
            company_id,
            kind,
            begin,
            end,
        })
    }

    pub fn company_id(&self) -> i64 {
        self.company_id
    }

    pub fn kind(&self) -> PayPeriodType {
        self.kind
    }

    pub fn begin(&self) -> NaiveDate {
        self.begin
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.begin <= day && day <= self.end
    }

    /// Checks the holiday's date in the begin year and, for periods that
    /// straddle new year, in the end year as well.
    pub fn contains_holiday(&self, holiday: &Holiday) -> Result<bool> {
        let begin_year = self.begin.year();
        let end_year = self.end.year();

        if self.contains(holiday.date_for_year(begin_year)?) {
            return Ok(true);
        }
        if begin_year != end_year {
            return Ok(self.contains(holiday.date_for_year(end_year)?));
        }
        Ok(false)
    }

    /// True when the whole period ends before `day`.
    pub fn is_before(&self, day: NaiveDate) -> bool {
        self.end < day
    }

    /// True when the whole period begins after `day`.
    pub fn is_after(&self, day: NaiveDate) -> bool {
        self.begin > day
    }

    /// The period immediately preceding this one, or `None` when the cadence
    /// does not allow it to be derived.
    pub fn previous(&self) -> Option<PayPeriod> {
        let (begin, end) = match self.kind {
            PayPeriodType::Weekly => (
                self.begin - Duration::days(7),
                self.end - Duration::days(7),
            ),
            PayPeriodType::BiWeekly => (
                self.begin - Duration::days(14),
                self.end - Duration::days(14),
            ),
            PayPeriodType::Monthly => (
                self.begin.checked_sub_months(Months::new(1))?,
                self.begin.pred_opt()?,
            ),
            PayPeriodType::SemiMonthly => (
                // The current end mirrors where the previous half began.
                self.end.succ_opt()?.checked_sub_months(Months::new(1))?,
                self.begin.pred_opt()?,
            ),
            PayPeriodType::Custom => return None,
        };
        self.derive(begin, end)
    }

    /// The period immediately following this one, or `None` when the cadence
    /// does not allow it to be derived.
    pub fn next(&self) -> Option<PayPeriod> {
        let (begin, end) = match self.kind {
            PayPeriodType::Weekly => (
                self.begin + Duration::days(7),
                self.end + Duration::days(7),
            ),
            PayPeriodType::BiWeekly => (
                self.begin + Duration::days(14),
                self.end + Duration::days(14),
            ),
            PayPeriodType::Monthly => {
                let begin = self.end.succ_opt()?;
                let end = if begin.day() == 1 {
                    last_day_of_month(begin)?
                } else {
                    self.end.checked_add_months(Months::new(1))?
                };
                (begin, end)
            }
            PayPeriodType::SemiMonthly => {
                let begin = self.end.succ_opt()?;
                let previous_end = self.begin.pred_opt()?;
                // A period starting on the 1st is the first half; the second
                // half always runs to the end of the month.
                let end = if self.begin.day() == 1 {
                    last_day_of_month(begin)?
                } else {
                    previous_end.checked_add_months(Months::new(1))?
                };
                (begin, end)
            }
            PayPeriodType::Custom => return None,
        };
        self.derive(begin, end)
    }

    fn derive(&self, begin: NaiveDate, end: NaiveDate) -> Option<PayPeriod> {
        (begin <= end).then(|| PayPeriod {
            company_id: self.company_id,
            kind: self.kind,
            begin,
            end,
        })
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pay period {}..{} (company {})",
            self.kind, self.begin, self.end, self.company_id
        )
    }
}

pub fn last_day_of_month(day: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}
