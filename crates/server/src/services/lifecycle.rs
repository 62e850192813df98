//! Timesheet workflows behind the user and manager endpoints.

use chrono::NaiveDate;

use super::enrichment::enrich;
use super::materializer;
use super::reconcile::{self, SaveSummary};
use crate::db::{AuditLogStore, BillStore, HolidayStore, PayPeriodStore, TaskStore, TimesheetStore, UserStore};
use crate::error::{AppError, Result};
use crate::models::{AuditLog, Enrichment, LifecycleFlag, PayPeriod, Timesheet};

/// What a user sees when opening a timesheet.
pub const FULL: &[Enrichment] = &[
    Enrichment::PayPeriods,
    Enrichment::AuditLogs,
    Enrichment::Holidays,
    Enrichment::Users,
    Enrichment::Tasks,
    Enrichment::Bills,
];

/// Enough to reconcile a save.
pub const SAVE: &[Enrichment] = &[Enrichment::Users, Enrichment::PayPeriods, Enrichment::Tasks, Enrichment::Bills];

/// Every capability the workflows touch.
pub trait Store:
    PayPeriodStore + TimesheetStore + BillStore + AuditLogStore + TaskStore + HolidayStore + UserStore
{
}

impl<T> Store for T where
    T: PayPeriodStore + TimesheetStore + BillStore + AuditLogStore + TaskStore + HolidayStore + UserStore
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

pub async fn load<S: Store>(store: &S, company_id: i64, id: i64, enrichments: &[Enrichment]) -> Result<Timesheet> {
    let timesheet = store
        .timesheet(company_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Timesheet {id} not found")))?;
    enriched(store, timesheet, enrichments).await
}

async fn enriched<S: Store>(store: &S, timesheet: Timesheet, enrichments: &[Enrichment]) -> Result<Timesheet> {
    let mut sheets = [timesheet];
    enrich(store, sheets[0].company_id, &mut sheets, enrichments).await?;
    let [timesheet] = sheets;
    Ok(timesheet)
}

async fn owned<S: Store>(
    store: &S,
    company_id: i64,
    user_id: i64,
    id: i64,
    enrichments: &[Enrichment],
) -> Result<Timesheet> {
    let timesheet = load(store, company_id, id, enrichments).await?;
    if timesheet.user_id != user_id {
        tracing::warn!(user_id, timesheet_id = id, "Rejected access to another user's timesheet");
        return Err(AppError::Forbidden(
            "Unable to modify a timesheet you do not own".to_string(),
        ));
    }
    Ok(timesheet)
}

/// The user's latest timesheet, creating one for today's pay period when
/// they have none yet.
pub async fn current<S: Store>(store: &S, company_id: i64, user_id: i64, today: NaiveDate) -> Result<Timesheet> {
    tracing::debug!(user_id, "Retrieving current timesheet");
    let timesheet = match store.latest_timesheet_for_user(user_id).await? {
        Some(timesheet) => timesheet,
        None => {
            let pay_period = materializer::get_containing(store, company_id, today)
                .await?
                .ok_or_else(|| AppError::NotFound("No pay periods have been configured".to_string()))?;
            tracing::debug!(user_id, begin = %pay_period.begin(), "Creating first timesheet");
            store.ensure_timesheet(company_id, user_id, pay_period.begin()).await?
        }
    };
    enriched(store, timesheet, FULL).await
}

/// The user's timesheet for the pay period before or after the one
/// beginning on `begin`.
pub async fn adjacent<S: Store>(
    store: &S,
    company_id: i64,
    user_id: i64,
    begin: NaiveDate,
    direction: Direction,
) -> Result<Timesheet> {
    let pay_period = store
        .pay_period(company_id, begin)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No pay period begins on {begin}")))?;
    let neighbor = match direction {
        Direction::Previous => pay_period.previous(),
        Direction::Next => pay_period.next(),
    }
    .ok_or_else(|| AppError::NotFound(format!("Unable to derive the pay period adjacent to {pay_period}")))?;

    let timesheet = timesheet_for(store, user_id, &neighbor).await?;
    enriched(store, timesheet, FULL).await
}

/// The user's existing timesheet for the pay period containing `day`.
pub async fn containing<S: Store>(store: &S, company_id: i64, user_id: i64, day: NaiveDate) -> Result<Timesheet> {
    let pay_period = materializer::get_containing(store, company_id, day)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No pay period contains {day}")))?;
    let timesheet = store
        .timesheet_for_user(user_id, pay_period.begin())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No timesheet exists for the pay period containing {day}")))?;
    enriched(store, timesheet, FULL).await
}

/// Persists the pay period if needed and returns the user's timesheet for
/// it, creating that too.
async fn timesheet_for<S: Store>(store: &S, user_id: i64, pay_period: &PayPeriod) -> Result<Timesheet> {
    store.add_pay_periods(std::slice::from_ref(pay_period)).await?;
    store
        .ensure_timesheet(pay_period.company_id(), user_id, pay_period.begin())
        .await
}

pub async fn save<S: Store>(store: &S, company_id: i64, user_id: i64, id: i64, data: &str) -> Result<SaveSummary> {
    let timesheet = owned(store, company_id, user_id, id, SAVE).await?;
    reconcile::save_timesheet(store, &timesheet, data).await
}

/// Saves, marks the timesheet complete and returns the user's next
/// timesheet. Custom pay periods have no next timesheet.
pub async fn complete<S: Store>(
    store: &S,
    company_id: i64,
    user_id: i64,
    id: i64,
    data: &str,
) -> Result<Option<Timesheet>> {
    let timesheet = owned(store, company_id, user_id, id, SAVE).await?;
    reconcile::save_timesheet(store, &timesheet, data).await?;

    store
        .set_flag(company_id, id, LifecycleFlag::Completed, true, None)
        .await?;
    store
        .add_audit_logs(&[AuditLog::new(
            company_id,
            id,
            LifecycleFlag::Completed.audit_message(true),
        )])
        .await?;
    tracing::info!(user_id, timesheet_id = id, "Timesheet completed");

    let pay_period = timesheet.pay_period.ok_or_else(|| {
        AppError::InconsistentState(format!("Timesheet {id} has no pay period beginning {}", timesheet.begin))
    })?;
    let Some(next) = pay_period.next() else {
        return Ok(None);
    };

    let next = timesheet_for(store, user_id, &next).await?;
    enriched(store, next, SAVE).await.map(Some)
}

/// Reopens a completed timesheet for editing.
pub async fn reopen<S: Store>(store: &S, company_id: i64, user_id: i64, id: i64) -> Result<()> {
    owned(store, company_id, user_id, id, &[]).await?;
    store
        .set_flag(company_id, id, LifecycleFlag::Completed, false, None)
        .await?;
    store
        .add_audit_logs(&[AuditLog::new(
            company_id,
            id,
            LifecycleFlag::Completed.audit_message(false),
        )])
        .await?;
    tracing::info!(user_id, timesheet_id = id, "Timesheet reopened");
    Ok(())
}

/// Sets approval, verification or export on behalf of `actor_id`. Only an
/// actual change is written and audited.
pub async fn set_status<S: Store>(
    store: &S,
    company_id: i64,
    actor_id: i64,
    id: i64,
    flag: LifecycleFlag,
    value: bool,
) -> Result<Timesheet> {
    if flag == LifecycleFlag::Completed {
        return Err(AppError::Validation(
            "Completion is managed by the timesheet owner".to_string(),
        ));
    }

    let timesheet = load(store, company_id, id, &[]).await?;
    if timesheet.flag(flag) != value {
        store.set_flag(company_id, id, flag, value, Some(actor_id)).await?;
        store
            .add_audit_logs(&[AuditLog::new(company_id, id, flag.audit_message(value))])
            .await?;
        tracing::info!(actor_id, timesheet_id = id, ?flag, value, "Timesheet status changed");
    }

    load(store, company_id, id, &[Enrichment::Users, Enrichment::PayPeriods, Enrichment::AuditLogs]).await
}

/// Removes a timesheet and its audit history.
pub async fn delete<S: Store>(store: &S, company_id: i64, id: i64) -> Result<()> {
    if store.delete_timesheets(company_id, &[id]).await? == 0 {
        return Err(AppError::NotFound(format!("Timesheet {id} not found")));
    }
    store.delete_audit_logs(&[id]).await?;
    tracing::info!(timesheet_id = id, "Timesheet deleted");
    Ok(())
}
