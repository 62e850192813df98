//! Storage capabilities the services depend on. Each service asks only for
//! the traits it uses; [`Database`](super::Database) implements all of them.

use std::collections::HashMap;
use std::future::Future;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::task::{AssignmentFilter, CreateAssignment, CreateTask};
use crate::models::{
    Assignment, AuditLog, Bill, BillEntry, Holiday, LifecycleFlag, PayPeriod, Supervisor, Task,
    Timesheet, User,
};

pub trait PayPeriodStore: Send + Sync {
    fn pay_period(
        &self,
        company_id: i64,
        begin: NaiveDate,
    ) -> impl Future<Output = Result<Option<PayPeriod>>> + Send;

    fn pay_period_containing(
        &self,
        company_id: i64,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<PayPeriod>>> + Send;

    fn earliest_pay_period(&self, company_id: i64) -> impl Future<Output = Result<Option<PayPeriod>>> + Send;

    fn latest_pay_period(&self, company_id: i64) -> impl Future<Output = Result<Option<PayPeriod>>> + Send;

    fn pay_periods_beginning(
        &self,
        company_id: i64,
        begins: &[NaiveDate],
    ) -> impl Future<Output = Result<Vec<PayPeriod>>> + Send;

    /// Inserts the periods, ignoring any that already exist. Returns how many
    /// were new.
    fn add_pay_periods(&self, pay_periods: &[PayPeriod]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait TimesheetStore: Send + Sync {
    fn timesheet(&self, company_id: i64, id: i64) -> impl Future<Output = Result<Option<Timesheet>>> + Send;

    fn timesheet_for_user(
        &self,
        user_id: i64,
        begin: NaiveDate,
    ) -> impl Future<Output = Result<Option<Timesheet>>> + Send;

    /// The user's most recent incomplete timesheet, or their most recent one
    /// when everything is complete.
    fn latest_timesheet_for_user(&self, user_id: i64) -> impl Future<Output = Result<Option<Timesheet>>> + Send;

    /// Returns the user's timesheet for `begin`, creating it if needed.
    fn ensure_timesheet(
        &self,
        company_id: i64,
        user_id: i64,
        begin: NaiveDate,
    ) -> impl Future<Output = Result<Timesheet>> + Send;

    /// Sets a lifecycle flag. `actor` is recorded for flags that track who
    /// set them and cleared along with the flag.
    fn set_flag(
        &self,
        company_id: i64,
        id: i64,
        flag: LifecycleFlag,
        value: bool,
        actor: Option<i64>,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn delete_timesheets(&self, company_id: i64, ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait BillStore: Send + Sync {
    /// Bills of any of `user_ids` dated within `begin..=end`.
    fn bills_for_users(
        &self,
        user_ids: &[i64],
        begin: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Bill>>> + Send;

    fn add_bill(&self, user_id: i64, entry: &BillEntry) -> impl Future<Output = Result<Bill>> + Send;

    /// Replaces hours and reason, refreshing the timestamp.
    fn update_bill(&self, id: i64, entry: &BillEntry) -> impl Future<Output = Result<bool>> + Send;

    fn delete_bills(&self, ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait AuditLogStore: Send + Sync {
    fn add_audit_logs(&self, logs: &[AuditLog]) -> impl Future<Output = Result<()>> + Send;

    fn audit_logs_for_timesheets(&self, timesheet_ids: &[i64]) -> impl Future<Output = Result<Vec<AuditLog>>> + Send;

    fn delete_audit_logs(&self, timesheet_ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait TaskStore: Send + Sync {
    /// Active tasks each user may bill to during the pay period: every
    /// administrative task plus those with an assignment overlapping the
    /// period. Only that user's overlapping assignments are attached.
    fn tasks_for_pay_period(
        &self,
        pay_period: &PayPeriod,
        user_ids: &[i64],
    ) -> impl Future<Output = Result<HashMap<i64, Vec<Task>>>> + Send;

    fn tasks(&self, company_id: i64) -> impl Future<Output = Result<Vec<Task>>> + Send;

    /// The task with all of its assignments.
    fn task(&self, company_id: i64, id: i64) -> impl Future<Output = Result<Option<Task>>> + Send;

    fn add_task(&self, company_id: i64, task: &CreateTask) -> impl Future<Output = Result<Task>> + Send;

    fn add_assignment(
        &self,
        company_id: i64,
        assignment: &CreateAssignment,
    ) -> impl Future<Output = Result<Assignment>> + Send;

    fn assignments_for_task(
        &self,
        company_id: i64,
        task_id: i64,
        filter: &AssignmentFilter,
    ) -> impl Future<Output = Result<Vec<Assignment>>> + Send;

    fn assignments_for_user(
        &self,
        company_id: i64,
        user_id: i64,
        filter: &AssignmentFilter,
    ) -> impl Future<Output = Result<Vec<Assignment>>> + Send;

    /// Replaces every field of the assignment. `None` when it does not exist.
    fn update_assignment(
        &self,
        company_id: i64,
        id: i64,
        assignment: &CreateAssignment,
    ) -> impl Future<Output = Result<Option<Assignment>>> + Send;

    /// Deleting an assignment also deletes the bills made against it.
    fn delete_assignments(&self, company_id: i64, ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait HolidayStore: Send + Sync {
    fn holidays(&self, company_id: i64) -> impl Future<Output = Result<Vec<Holiday>>> + Send;

    fn holiday(&self, company_id: i64, id: i64) -> impl Future<Output = Result<Option<Holiday>>> + Send;

    /// Built-in holidays, addressed to `company_id` but not yet saved.
    fn common_holidays(&self, company_id: i64) -> impl Future<Output = Result<Vec<Holiday>>> + Send;

    fn add_holiday(
        &self,
        company_id: i64,
        description: &str,
        config: &str,
    ) -> impl Future<Output = Result<Holiday>> + Send;

    fn update_holiday(&self, holiday: &Holiday) -> impl Future<Output = Result<bool>> + Send;

    fn delete_holidays(&self, company_id: i64, ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;
}

pub trait UserStore: Send + Sync {
    fn users(&self, ids: &[i64]) -> impl Future<Output = Result<HashMap<i64, User>>> + Send;

    /// The user and their password hash.
    fn credentials(&self, login: &str) -> impl Future<Output = Result<Option<(User, String)>>> + Send;

    fn add_user(
        &self,
        company_id: i64,
        user: &NewUser<'_>,
    ) -> impl Future<Output = Result<User>> + Send;

    /// Every user of the company, active or not, by name.
    fn company_users(&self, company_id: i64) -> impl Future<Output = Result<Vec<User>>> + Send;

    fn update_profile(
        &self,
        user_id: i64,
        profile: &ProfileUpdate<'_>,
    ) -> impl Future<Output = Result<User>> + Send;

    fn supervisors(&self, company_id: i64, user_id: i64) -> impl Future<Output = Result<Vec<Supervisor>>> + Send;

    fn add_supervisor(
        &self,
        company_id: i64,
        user_id: i64,
        supervisor_id: i64,
        primary: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_supervisors(
        &self,
        company_id: i64,
        user_id: i64,
        supervisor_ids: &[i64],
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// A user ready to insert, with the password already hashed.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub login: &'a str,
    pub hashed_pass: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub roles: &'a [crate::models::Role],
}

/// New profile fields for an existing user. The password is only replaced
/// when a new hash is given.
#[derive(Debug)]
pub struct ProfileUpdate<'a> {
    pub login: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub hashed_pass: Option<&'a str>,
}
