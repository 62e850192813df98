//! Lazily extends a company's pay periods to cover any requested day.

use chrono::NaiveDate;

use crate::db::PayPeriodStore;
use crate::error::{AppError, Result};
use crate::models::{PayPeriod, PayPeriodType};

/// Returns the pay period containing `day`, deriving and persisting any
/// missing periods between the known range and `day`.
///
/// `Ok(None)` means the company has no pay periods to extrapolate from.
pub async fn get_containing<S>(store: &S, company_id: i64, day: NaiveDate) -> Result<Option<PayPeriod>>
where
    S: PayPeriodStore,
{
    if let Some(pay_period) = store.pay_period_containing(company_id, day).await? {
        return Ok(Some(pay_period));
    }

    let (Some(earliest), Some(latest)) = (
        store.earliest_pay_period(company_id).await?,
        store.latest_pay_period(company_id).await?,
    ) else {
        return Ok(None);
    };

    let start = if earliest.is_after(day) {
        earliest
    } else if latest.is_before(day) {
        latest
    } else {
        return Err(AppError::InconsistentState(format!(
            "No pay period for company {company_id} contains {day}, which lies between {} and {}",
            earliest.begin(),
            latest.end()
        )));
    };

    if start.kind() == PayPeriodType::Custom {
        return Err(AppError::NotFound(format!(
            "Unable to derive pay periods from custom pay period beginning {}",
            start.begin()
        )));
    }

    let derived = walk_to(start, day)?;
    let added = store.add_pay_periods(&derived).await?;
    tracing::info!(company_id, %day, added, "Materialized pay periods");

    Ok(derived.last().cloned())
}

/// Steps from `start` towards `day`, returning every period produced on the
/// way. The last one contains `day`.
fn walk_to(start: PayPeriod, day: NaiveDate) -> Result<Vec<PayPeriod>> {
    let mut derived = Vec::new();
    let mut current = start;

    while !current.contains(day) {
        let step = if current.is_after(day) {
            current.previous()
        } else {
            current.next()
        };
        current = step.ok_or_else(|| {
            AppError::NotFound(format!("Unable to derive the pay period adjacent to {current}"))
        })?;
        derived.push(current.clone());
    }

    Ok(derived)
}
