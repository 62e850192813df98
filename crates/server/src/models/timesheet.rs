use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::holiday::Holiday;
use super::pay_period::PayPeriod;
use super::task::Task;
use super::user::User;
use crate::error::AppError;

/// One user's hours for one pay period, plus whatever related data an
/// enrichment pass attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timesheet {
    pub id: i64,
    pub company_id: i64,
    pub user_id: i64,
    pub begin: NaiveDate,
    pub completed: bool,
    pub approved: bool,
    pub verified: bool,
    pub exported: bool,
    pub approver_id: Option<i64>,
    pub verifier_id: Option<i64>,
    pub exporter_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifier: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exporter: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_period: Option<PayPeriod>,
    pub holidays: Vec<Holiday>,
    pub audit_logs: Vec<AuditLog>,
    pub tasks: Vec<Task>,
}

impl Timesheet {
    pub fn new(id: i64, company_id: i64, user_id: i64, begin: NaiveDate) -> Self {
        Self {
            id,
            company_id,
            user_id,
            begin,
            completed: false,
            approved: false,
            verified: false,
            exported: false,
            approver_id: None,
            verifier_id: None,
            exporter_id: None,
            user: None,
            approver: None,
            verifier: None,
            exporter: None,
            pay_period: None,
            holidays: Vec::new(),
            audit_logs: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: i64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Owner plus any approver, verifier and exporter.
    pub fn user_ids(&self) -> BTreeSet<i64> {
        [
            Some(self.user_id),
            self.approver_id,
            self.verifier_id,
            self.exporter_id,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn flag(&self, flag: LifecycleFlag) -> bool {
        match flag {
            LifecycleFlag::Completed => self.completed,
            LifecycleFlag::Approved => self.approved,
            LifecycleFlag::Verified => self.verified,
            LifecycleFlag::Exported => self.exported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleFlag {
    Completed,
    Approved,
    Verified,
    Exported,
}

impl LifecycleFlag {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            LifecycleFlag::Completed => "completed",
            LifecycleFlag::Approved => "approved",
            LifecycleFlag::Verified => "verified",
            LifecycleFlag::Exported => "exported",
        }
    }

    /// Column recording who set the flag; completion has none.
    pub(crate) fn actor_column(&self) -> Option<&'static str> {
        match self {
            LifecycleFlag::Completed => None,
            LifecycleFlag::Approved => Some("approver_id"),
            LifecycleFlag::Verified => Some("verifier_id"),
            LifecycleFlag::Exported => Some("exporter_id"),
        }
    }

    pub fn audit_message(&self, value: bool) -> &'static str {
        match (self, value) {
            (LifecycleFlag::Completed, true) => "Timesheet completed",
            (LifecycleFlag::Completed, false) => "Timesheet reopened",
            (LifecycleFlag::Approved, true) => "Timesheet approved",
            (LifecycleFlag::Approved, false) => "Timesheet approval removed",
            (LifecycleFlag::Verified, true) => "Timesheet verified",
            (LifecycleFlag::Verified, false) => "Timesheet verification removed",
            (LifecycleFlag::Exported, true) => "Timesheet exported",
            (LifecycleFlag::Exported, false) => "Timesheet export removed",
        }
    }
}

/// Immutable record of a change made to a timesheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditLog {
    pub company_id: i64,
    pub timesheet_id: i64,
    pub log: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(company_id: i64, timesheet_id: i64, log: impl Into<String>) -> Self {
        Self {
            company_id,
            timesheet_id,
            log: log.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Related data that can be attached to loaded timesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Enrichment {
    Users,
    PayPeriods,
    Holidays,
    AuditLogs,
    Tasks,
    Bills,
}

impl Enrichment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Enrichment::Users => "USERS",
            Enrichment::PayPeriods => "PAY_PERIODS",
            Enrichment::Holidays => "HOLIDAYS",
            Enrichment::AuditLogs => "AUDIT_LOGS",
            Enrichment::Tasks => "TASKS",
            Enrichment::Bills => "BILLS",
        }
    }
}

impl fmt::Display for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Enrichment {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, AppError> {
        let value = value.trim();
        [
            Enrichment::Users,
            Enrichment::PayPeriods,
            Enrichment::Holidays,
            Enrichment::AuditLogs,
            Enrichment::Tasks,
            Enrichment::Bills,
        ]
        .into_iter()
        .find(|e| e.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| AppError::Validation(format!("Invalid enrichment: {value}")))
    }
}
