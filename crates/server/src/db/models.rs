//! Row shapes as stored in SQLite, converted into domain models on the way
//! out.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::{AppError, Result};
use crate::models::{
    Assignment, AuditLog, Bill, Holiday, PayPeriod, PayPeriodType, Role, Task, Timesheet, User,
};

#[derive(Debug, sqlx::FromRow)]
pub struct PayPeriodRow {
    pub company_id: i64,
    pub pp_begin: NaiveDate,
    pub pp_end: NaiveDate,
    #[sqlx(rename = "type")]
    pub kind: String,
}

impl TryFrom<PayPeriodRow> for PayPeriod {
    type Error = AppError;

    fn try_from(row: PayPeriodRow) -> Result<Self> {
        let kind = PayPeriodType::from_str(&row.kind)?;
        PayPeriod::new(row.company_id, kind, row.pp_begin, row.pp_end)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TimesheetRow {
    pub id: i64,
    pub company_id: i64,
    pub user_id: i64,
    pub pp_begin: NaiveDate,
    pub completed: bool,
    pub approved: bool,
    pub verified: bool,
    pub exported: bool,
    pub approver_id: Option<i64>,
    pub verifier_id: Option<i64>,
    pub exporter_id: Option<i64>,
}

impl From<TimesheetRow> for Timesheet {
    fn from(row: TimesheetRow) -> Self {
        let mut timesheet = Timesheet::new(row.id, row.company_id, row.user_id, row.pp_begin);
        timesheet.completed = row.completed;
        timesheet.approved = row.approved;
        timesheet.verified = row.verified;
        timesheet.exported = row.exported;
        timesheet.approver_id = row.approver_id;
        timesheet.verifier_id = row.verifier_id;
        timesheet.exporter_id = row.exporter_id;
        timesheet
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct BillRow {
    pub id: i64,
    pub assignment_id: Option<i64>,
    pub task_id: i64,
    pub user_id: i64,
    pub day: NaiveDate,
    pub hours: String,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

impl TryFrom<BillRow> for Bill {
    type Error = AppError;

    fn try_from(row: BillRow) -> Result<Self> {
        let hours = Decimal::from_str(&row.hours).map_err(|_| {
            AppError::InconsistentState(format!("Bill {} has invalid hours {:?}", row.id, row.hours))
        })?;
        Ok(Bill {
            id: row.id,
            assignment_id: row.assignment_id,
            task_id: row.task_id,
            user_id: row.user_id,
            day: row.day,
            hours,
            timestamp: row.timestamp,
            reason: row.reason,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AuditLogRow {
    pub company_id: i64,
    pub timesheet_id: i64,
    pub log: String,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLog {
    fn from(row: AuditLogRow) -> Self {
        AuditLog {
            company_id: row.company_id,
            timesheet_id: row.timesheet_id,
            log: row.log,
            timestamp: row.timestamp,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub company_id: i64,
    pub description: String,
    pub job_code: String,
    pub admin: bool,
    pub active: bool,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            company_id: row.company_id,
            description: row.description,
            job_code: row.job_code,
            administrative: row.admin,
            active: row.active,
            assignments: Vec::new(),
            bills: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: i64,
    pub company_id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub labor_cat: String,
    pub item_name: String,
    pub begin_day: Option<NaiveDate>,
    pub end_day: Option<NaiveDate>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            id: row.id,
            company_id: row.company_id,
            task_id: row.task_id,
            user_id: row.user_id,
            labor_cat: row.labor_cat,
            item_name: row.item_name,
            begin: row.begin_day,
            end: row.end_day,
            bills: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct HolidayRow {
    pub id: i64,
    pub company_id: i64,
    pub description: String,
    pub config: String,
}

impl TryFrom<HolidayRow> for Holiday {
    type Error = AppError;

    fn try_from(row: HolidayRow) -> Result<Self> {
        Holiday::new(row.id, row.company_id, row.description, row.config)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub company_id: i64,
    pub login: String,
    pub hashed_pass: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
}

impl UserRow {
    pub fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            company_id: self.company_id,
            login: self.login,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            active: self.active,
            roles,
        }
    }
}
