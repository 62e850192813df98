//! Brings a timesheet's stored bills in line with a client submission,
//! writing one audit-log entry per change.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{AuditLogStore, BillStore};
use crate::error::{AppError, Result};
use crate::models::bill;
use crate::models::{Assignment, AuditLog, Bill, BillEntry, BillKey, Task, Timesheet};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Saves `data` (the bill wire format) against a timesheet enriched with
/// its tasks and bills. Stored bills missing from `data` are deleted.
///
/// Entries for tasks the timesheet does not carry are skipped. An entry
/// dated outside the pay period rejects the whole submission before any
/// bill is written.
pub async fn save_timesheet<S>(store: &S, timesheet: &Timesheet, data: &str) -> Result<SaveSummary>
where
    S: BillStore + AuditLogStore,
{
    let entries = bill::decode(data)?;
    let pay_period = timesheet.pay_period.as_ref().ok_or_else(|| {
        AppError::InconsistentState(format!("Timesheet {} was loaded without its pay period", timesheet.id))
    })?;
    if let Some(entry) = entries.iter().find(|entry| !pay_period.contains(entry.day)) {
        return Err(AppError::Validation(format!(
            "Timesheet data entry {} falls outside the pay period {pay_period}",
            entry.key()
        )));
    }

    let mut summary = SaveSummary::default();
    let mut processed: HashSet<BillKey> = HashSet::new();

    for entry in &entries {
        let key = entry.key();
        processed.insert(key);

        let Some(task) = timesheet.task(entry.task_id) else {
            tracing::debug!(timesheet_id = timesheet.id, %key, "Skipping bill for unknown task");
            continue;
        };
        let assignment = entry.assignment_id.and_then(|id| task.assignment(id));
        // Bills outside their assignment's window are attached to the task.
        let existing = assignment
            .and_then(|assignment| assignment.bill(&key))
            .or_else(|| task.bill(&key));

        match existing {
            Some(existing) if existing.hours != entry.hours => {
                store.update_bill(existing.id, entry).await?;
                store
                    .add_audit_logs(&[updated_log(timesheet, task, assignment, existing, entry)])
                    .await?;
                summary.updated += 1;
            }
            Some(_) => {}
            None => {
                store.add_bill(timesheet.user_id, entry).await?;
                store
                    .add_audit_logs(&[added_log(timesheet, task, assignment, entry)])
                    .await?;
                summary.added += 1;
            }
        }
    }

    let mut stale = Vec::new();
    let mut logs = Vec::new();
    for task in &timesheet.tasks {
        for bill in task.bills.iter().filter(|b| !processed.contains(&b.key())) {
            logs.push(deleted_log(timesheet, task, None, bill));
            stale.push(bill.id);
        }
        for assignment in &task.assignments {
            for bill in assignment.bills.iter().filter(|b| !processed.contains(&b.key())) {
                logs.push(deleted_log(timesheet, task, Some(assignment), bill));
                stale.push(bill.id);
            }
        }
    }

    store.add_audit_logs(&logs).await?;
    summary.deleted = stale.len();
    store.delete_bills(&stale).await?;

    tracing::debug!(
        timesheet_id = timesheet.id,
        added = summary.added,
        updated = summary.updated,
        deleted = summary.deleted,
        "Saved timesheet"
    );
    Ok(summary)
}

fn labor_cat(assignment: Option<&Assignment>) -> String {
    assignment.map_or_else(String::new, |a| format!(" (LCAT: {})", a.labor_cat))
}

fn format_hours(hours: Decimal) -> String {
    let mut hours = hours;
    hours.rescale(2);
    hours.to_string()
}

fn updated_log(
    timesheet: &Timesheet,
    task: &Task,
    assignment: Option<&Assignment>,
    existing: &Bill,
    entry: &BillEntry,
) -> AuditLog {
    let mut log = format!(
        "Hours for task {}{} on {} changed from {} to {}.",
        task.description,
        labor_cat(assignment),
        entry.day.format("%Y-%m-%d"),
        format_hours(existing.hours),
        format_hours(entry.hours),
    );
    if let Some(reason) = &entry.reason {
        log.push_str(&format!(" The user-specified reason: {reason}"));
    }
    AuditLog::new(timesheet.company_id, timesheet.id, log)
}

fn added_log(timesheet: &Timesheet, task: &Task, assignment: Option<&Assignment>, entry: &BillEntry) -> AuditLog {
    let log = format!(
        "Added {} hours for task {}{} on {}",
        format_hours(entry.hours),
        task.description,
        labor_cat(assignment),
        entry.day.format("%Y-%m-%d"),
    );
    AuditLog::new(timesheet.company_id, timesheet.id, log)
}

fn deleted_log(timesheet: &Timesheet, task: &Task, assignment: Option<&Assignment>, bill: &Bill) -> AuditLog {
    let log = format!(
        "Hours for task {}{} on {} changed from {} to 0.00.",
        task.description,
        labor_cat(assignment),
        bill.day.format("%Y-%m-%d"),
        format_hours(bill.hours),
    );
    AuditLog::new(timesheet.company_id, timesheet.id, log)
}
