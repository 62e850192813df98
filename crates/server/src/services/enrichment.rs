//! Attaches related data to loaded timesheets.
//!
//! Every kind replaces what it attaches, so enriching twice is harmless.
//! Kinds that depend on the pay period leave timesheets without one alone.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::db::{AuditLogStore, BillStore, HolidayStore, PayPeriodStore, TaskStore, UserStore};
use crate::error::Result;
use crate::models::{Bill, Enrichment, PayPeriod, Timesheet};

pub async fn enrich<S>(store: &S, company_id: i64, timesheets: &mut [Timesheet], enrichments: &[Enrichment]) -> Result<()>
where
    S: UserStore + PayPeriodStore + HolidayStore + AuditLogStore + TaskStore + BillStore,
{
    if timesheets.is_empty() {
        return Ok(());
    }

    let mut applied = Vec::with_capacity(enrichments.len());
    for &enrichment in enrichments {
        if applied.contains(&enrichment) {
            continue;
        }
        applied.push(enrichment);

        match enrichment {
            Enrichment::Users => enrich_users(store, timesheets).await?,
            Enrichment::PayPeriods => enrich_pay_periods(store, company_id, timesheets).await?,
            Enrichment::Holidays => enrich_holidays(store, company_id, timesheets).await?,
            Enrichment::AuditLogs => enrich_audit_logs(store, timesheets).await?,
            Enrichment::Tasks => enrich_tasks(store, timesheets).await?,
            Enrichment::Bills => enrich_bills(store, timesheets).await?,
        }
    }
    Ok(())
}

async fn enrich_users<S: UserStore>(store: &S, timesheets: &mut [Timesheet]) -> Result<()> {
    let ids: BTreeSet<i64> = timesheets.iter().flat_map(Timesheet::user_ids).collect();
    let ids: Vec<i64> = ids.into_iter().collect();
    let users = store.users(&ids).await?;

    for ts in timesheets.iter_mut() {
        ts.user = users.get(&ts.user_id).cloned();
        ts.approver = ts.approver_id.and_then(|id| users.get(&id).cloned());
        ts.verifier = ts.verifier_id.and_then(|id| users.get(&id).cloned());
        ts.exporter = ts.exporter_id.and_then(|id| users.get(&id).cloned());
    }
    Ok(())
}

async fn enrich_pay_periods<S: PayPeriodStore>(store: &S, company_id: i64, timesheets: &mut [Timesheet]) -> Result<()> {
    let begins: BTreeSet<_> = timesheets.iter().map(|ts| ts.begin).collect();
    let begins: Vec<_> = begins.into_iter().collect();
    let by_begin: HashMap<_, _> = store
        .pay_periods_beginning(company_id, &begins)
        .await?
        .into_iter()
        .map(|pp| (pp.begin(), pp))
        .collect();

    for ts in timesheets.iter_mut() {
        ts.pay_period = by_begin.get(&ts.begin).cloned();
    }
    Ok(())
}

async fn enrich_holidays<S: HolidayStore>(store: &S, company_id: i64, timesheets: &mut [Timesheet]) -> Result<()> {
    if timesheets.iter().all(|ts| ts.pay_period.is_none()) {
        return Ok(());
    }
    let holidays = store.holidays(company_id).await?;

    for ts in timesheets.iter_mut() {
        let Some(pay_period) = &ts.pay_period else {
            continue;
        };
        let mut within = Vec::new();
        for holiday in &holidays {
            if pay_period.contains_holiday(holiday)? {
                within.push(holiday.clone());
            }
        }
        ts.holidays = within;
    }
    Ok(())
}

async fn enrich_audit_logs<S: AuditLogStore>(store: &S, timesheets: &mut [Timesheet]) -> Result<()> {
    let ids: Vec<i64> = timesheets.iter().map(|ts| ts.id).collect();
    let mut by_timesheet: HashMap<i64, Vec<_>> = HashMap::new();
    for log in store.audit_logs_for_timesheets(&ids).await? {
        by_timesheet.entry(log.timesheet_id).or_default().push(log);
    }

    for ts in timesheets.iter_mut() {
        ts.audit_logs = by_timesheet.remove(&ts.id).unwrap_or_default();
    }
    Ok(())
}

async fn enrich_tasks<S: TaskStore>(store: &S, timesheets: &mut [Timesheet]) -> Result<()> {
    // One task query per distinct pay period covers every user on it.
    let mut users_by_period: HashMap<PayPeriod, BTreeSet<i64>> = HashMap::new();
    for ts in timesheets.iter() {
        if let Some(pay_period) = &ts.pay_period {
            users_by_period
                .entry(pay_period.clone())
                .or_default()
                .insert(ts.user_id);
        }
    }

    let mut tasks_by_period = HashMap::new();
    for (pay_period, user_ids) in users_by_period {
        let user_ids: Vec<i64> = user_ids.into_iter().collect();
        let tasks = store.tasks_for_pay_period(&pay_period, &user_ids).await?;
        tasks_by_period.insert(pay_period, tasks);
    }

    for ts in timesheets.iter_mut() {
        let Some(pay_period) = &ts.pay_period else {
            continue;
        };
        ts.tasks = tasks_by_period
            .get(pay_period)
            .and_then(|by_user| by_user.get(&ts.user_id))
            .cloned()
            .unwrap_or_default();
    }
    Ok(())
}

async fn enrich_bills<S: BillStore>(store: &S, timesheets: &mut [Timesheet]) -> Result<()> {
    // One query spans every pay period; each sheet keeps its own user and days.
    let mut range: Option<(NaiveDate, NaiveDate)> = None;
    let mut user_ids = BTreeSet::new();
    for ts in timesheets.iter() {
        if let Some(pay_period) = &ts.pay_period {
            let (begin, end) = (pay_period.begin(), pay_period.end());
            range = Some(range.map_or((begin, end), |(b, e)| (b.min(begin), e.max(end))));
            user_ids.insert(ts.user_id);
        }
    }
    let Some((begin, end)) = range else {
        return Ok(());
    };

    let user_ids: Vec<i64> = user_ids.into_iter().collect();
    let mut by_user: HashMap<i64, Vec<Bill>> = HashMap::new();
    for bill in store.bills_for_users(&user_ids, begin, end).await? {
        by_user.entry(bill.user_id).or_default().push(bill);
    }

    for ts in timesheets.iter_mut() {
        let Some(pay_period) = &ts.pay_period else {
            continue;
        };
        let bills: Vec<Bill> = by_user
            .get(&ts.user_id)
            .map(|bills| bills.iter().filter(|b| pay_period.contains(b.day)).cloned().collect())
            .unwrap_or_default();
        attach_bills(ts, bills);
    }
    Ok(())
}

/// Hangs each bill off its task, and off its assignment when the bill's day
/// falls inside that assignment's window. Bills for tasks the timesheet does
/// not carry are dropped.
pub fn attach_bills(timesheet: &mut Timesheet, bills: Vec<Bill>) {
    for task in &mut timesheet.tasks {
        task.clear_bills();
    }

    for bill in bills {
        let Some(task) = timesheet.task_mut(bill.task_id) else {
            continue;
        };
        let assignment = bill
            .assignment_id
            .and_then(|id| task.assignment_mut(id))
            .filter(|assignment| assignment.contains(bill.day));
        match assignment {
            Some(assignment) => assignment.bills.push(bill),
            None => task.bills.push(bill),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::db::stores::{NewUser, ProfileUpdate};
    use crate::db::{AuditLogStore, BillStore, Database, TimesheetStore};
    use crate::models::task::{AssignmentFilter, CreateAssignment, CreateTask};
    use crate::models::{
        Assignment, AuditLog, BillEntry, LifecycleFlag, PayPeriodType, Supervisor, Task, User,
    };
    use crate::testing::{date, Fixture};
    use rust_decimal_macros::dec;

    /// Passes through to the database, noting each user and task lookup.
    struct Recording {
        db: Database,
        user_lookups: Mutex<Vec<Vec<i64>>>,
        task_lookups: Mutex<Vec<(NaiveDate, Vec<i64>)>>,
    }

    impl Recording {
        fn new(db: &Database) -> Self {
            Self {
                db: db.clone(),
                user_lookups: Mutex::new(Vec::new()),
                task_lookups: Mutex::new(Vec::new()),
            }
        }
    }

    impl UserStore for Recording {
        async fn users(&self, ids: &[i64]) -> Result<HashMap<i64, User>> {
            self.user_lookups.lock().unwrap().push(ids.to_vec());
            self.db.users(ids).await
        }

        async fn credentials(&self, login: &str) -> Result<Option<(User, String)>> {
            self.db.credentials(login).await
        }

        async fn add_user(&self, company_id: i64, user: &NewUser<'_>) -> Result<User> {
            self.db.add_user(company_id, user).await
        }

        async fn company_users(&self, company_id: i64) -> Result<Vec<User>> {
            self.db.company_users(company_id).await
        }

        async fn update_profile(&self, user_id: i64, profile: &ProfileUpdate<'_>) -> Result<User> {
            self.db.update_profile(user_id, profile).await
        }

        async fn supervisors(&self, company_id: i64, user_id: i64) -> Result<Vec<Supervisor>> {
            self.db.supervisors(company_id, user_id).await
        }

        async fn add_supervisor(&self, company_id: i64, user_id: i64, supervisor_id: i64, primary: bool) -> Result<()> {
            self.db.add_supervisor(company_id, user_id, supervisor_id, primary).await
        }

        async fn delete_supervisors(&self, company_id: i64, user_id: i64, supervisor_ids: &[i64]) -> Result<u64> {
            self.db.delete_supervisors(company_id, user_id, supervisor_ids).await
        }
    }

    impl TaskStore for Recording {
        async fn tasks_for_pay_period(&self, pay_period: &PayPeriod, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Task>>> {
            self.task_lookups
                .lock()
                .unwrap()
                .push((pay_period.begin(), user_ids.to_vec()));
            self.db.tasks_for_pay_period(pay_period, user_ids).await
        }

        async fn tasks(&self, company_id: i64) -> Result<Vec<Task>> {
            self.db.tasks(company_id).await
        }

        async fn task(&self, company_id: i64, id: i64) -> Result<Option<Task>> {
            self.db.task(company_id, id).await
        }

        async fn add_task(&self, company_id: i64, task: &CreateTask) -> Result<Task> {
            self.db.add_task(company_id, task).await
        }

        async fn add_assignment(&self, company_id: i64, assignment: &CreateAssignment) -> Result<Assignment> {
            self.db.add_assignment(company_id, assignment).await
        }

        async fn assignments_for_task(
            &self,
            company_id: i64,
            task_id: i64,
            filter: &AssignmentFilter,
        ) -> Result<Vec<Assignment>> {
            self.db.assignments_for_task(company_id, task_id, filter).await
        }

        async fn assignments_for_user(
            &self,
            company_id: i64,
            user_id: i64,
            filter: &AssignmentFilter,
        ) -> Result<Vec<Assignment>> {
            self.db.assignments_for_user(company_id, user_id, filter).await
        }

        async fn update_assignment(
            &self,
            company_id: i64,
            id: i64,
            assignment: &CreateAssignment,
        ) -> Result<Option<Assignment>> {
            self.db.update_assignment(company_id, id, assignment).await
        }

        async fn delete_assignments(&self, company_id: i64, ids: &[i64]) -> Result<u64> {
            self.db.delete_assignments(company_id, ids).await
        }
    }

    fn entry(task_id: i64, assignment_id: Option<i64>, day: NaiveDate) -> BillEntry {
        BillEntry {
            task_id,
            assignment_id,
            day,
            hours: dec!(8),
            reason: None,
        }
    }

    async fn timesheet(fx: &Fixture, begin: NaiveDate) -> Timesheet {
        fx.db.ensure_timesheet(fx.company_id, fx.user_id, begin).await.unwrap()
    }

    #[tokio::test]
    async fn test_full_enrichment() {
        let fx = Fixture::new().await;
        let pp = fx.with_weekly_pay_period().await;
        fx.db.add_holiday(fx.company_id, "Flag Day", "June 14th").await.unwrap();
        fx.db.add_holiday(fx.company_id, "Someday", "1st Wednesday in June").await.unwrap();
        let task = fx.add_task("Development", false).await;
        fx.add_assignment(task.id, fx.user_id, None, None).await;

        let mut ts = timesheet(&fx, date(2024, 6, 3)).await;
        fx.db
            .set_flag(fx.company_id, ts.id, LifecycleFlag::Approved, true, Some(fx.manager_id))
            .await
            .unwrap();
        ts = fx.db.timesheet(fx.company_id, ts.id).await.unwrap().unwrap();
        fx.db
            .add_audit_logs(&[AuditLog::new(fx.company_id, ts.id, "Timesheet completed")])
            .await
            .unwrap();
        fx.db.add_bill(fx.user_id, &entry(task.id, None, date(2024, 6, 4))).await.unwrap();

        let mut sheets = vec![ts];
        let all = [
            Enrichment::PayPeriods,
            Enrichment::AuditLogs,
            Enrichment::Holidays,
            Enrichment::Users,
            Enrichment::Tasks,
            Enrichment::Bills,
        ];
        enrich(&fx.db, fx.company_id, &mut sheets, &all).await.unwrap();
        let ts = &sheets[0];

        assert_eq!(ts.pay_period, Some(pp));
        assert_eq!(ts.user.as_ref().unwrap().login, "jdoe");
        assert_eq!(ts.approver.as_ref().unwrap().login, "boss");
        assert_eq!(ts.audit_logs.len(), 1);
        assert_eq!(ts.holidays.len(), 1);
        assert_eq!(ts.holidays[0].description, "Someday");
        assert_eq!(ts.tasks.len(), 1);
        assert_eq!(ts.tasks[0].bills.len(), 1);
    }

    #[tokio::test]
    async fn test_many_timesheets_share_lookups() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let next = PayPeriod::new(fx.company_id, PayPeriodType::Weekly, date(2024, 6, 10), date(2024, 6, 16)).unwrap();
        fx.db.add_pay_periods(std::slice::from_ref(&next)).await.unwrap();

        let holiday = fx.add_task("Holiday", true).await;
        let development = fx.add_task("Development", false).await;
        fx.add_assignment(development.id, fx.user_id, None, None).await;

        let first = timesheet(&fx, date(2024, 6, 3)).await;
        fx.db
            .set_flag(fx.company_id, first.id, LifecycleFlag::Approved, true, Some(fx.manager_id))
            .await
            .unwrap();
        let mut sheets = vec![
            fx.db.timesheet(fx.company_id, first.id).await.unwrap().unwrap(),
            fx.db.ensure_timesheet(fx.company_id, fx.manager_id, date(2024, 6, 3)).await.unwrap(),
            timesheet(&fx, date(2024, 6, 10)).await,
        ];

        fx.db.add_bill(fx.user_id, &entry(development.id, None, date(2024, 6, 4))).await.unwrap();
        fx.db.add_bill(fx.user_id, &entry(development.id, None, date(2024, 6, 11))).await.unwrap();
        fx.db.add_bill(fx.manager_id, &entry(holiday.id, None, date(2024, 6, 5))).await.unwrap();

        enrich(&fx.db, fx.company_id, &mut sheets, &[Enrichment::PayPeriods]).await.unwrap();
        let recording = Recording::new(&fx.db);
        enrich_users(&recording, &mut sheets).await.unwrap();
        enrich_tasks(&recording, &mut sheets).await.unwrap();

        // Owners and approvers across every sheet resolve in one lookup.
        let mut everyone = vec![fx.user_id, fx.manager_id];
        everyone.sort();
        assert_eq!(*recording.user_lookups.lock().unwrap(), vec![everyone.clone()]);
        assert_eq!(sheets[0].user.as_ref().unwrap().login, "jdoe");
        assert_eq!(sheets[0].approver.as_ref().unwrap().login, "boss");
        assert_eq!(sheets[1].user.as_ref().unwrap().login, "boss");
        assert!(sheets[1].approver.is_none());
        assert_eq!(sheets[2].user.as_ref().unwrap().login, "jdoe");

        // One task lookup per pay period, covering the users on it.
        let mut task_lookups = recording.task_lookups.lock().unwrap().clone();
        task_lookups.sort();
        assert_eq!(
            task_lookups,
            vec![(date(2024, 6, 3), everyone), (date(2024, 6, 10), vec![fx.user_id])]
        );

        let descriptions = |ts: &Timesheet| ts.tasks.iter().map(|t| t.description.clone()).collect::<Vec<_>>();
        assert_eq!(descriptions(&sheets[0]), vec!["Development", "Holiday"]);
        assert_eq!(descriptions(&sheets[1]), vec!["Holiday"]);
        assert_eq!(descriptions(&sheets[2]), vec!["Development", "Holiday"]);

        // Bills come back in one query yet stay with their own sheet.
        enrich(&fx.db, fx.company_id, &mut sheets, &[Enrichment::Bills]).await.unwrap();
        let days = |ts: &Timesheet| {
            ts.tasks
                .iter()
                .flat_map(|t| t.bills.iter().map(|b| (t.description.clone(), b.day)))
                .collect::<Vec<_>>()
        };
        assert_eq!(days(&sheets[0]), vec![("Development".to_string(), date(2024, 6, 4))]);
        assert_eq!(days(&sheets[1]), vec![("Holiday".to_string(), date(2024, 6, 5))]);
        assert_eq!(days(&sheets[2]), vec![("Development".to_string(), date(2024, 6, 11))]);
    }

    #[tokio::test]
    async fn test_enriching_twice_does_not_duplicate() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let task = fx.add_task("Development", false).await;
        let assignment = fx.add_assignment(task.id, fx.user_id, None, None).await;
        fx.db
            .add_bill(fx.user_id, &entry(task.id, Some(assignment.id), date(2024, 6, 5)))
            .await
            .unwrap();

        let mut sheets = vec![timesheet(&fx, date(2024, 6, 3)).await];
        let kinds = [Enrichment::PayPeriods, Enrichment::Tasks, Enrichment::Bills, Enrichment::Bills];
        enrich(&fx.db, fx.company_id, &mut sheets, &kinds).await.unwrap();
        enrich(&fx.db, fx.company_id, &mut sheets, &[Enrichment::Bills]).await.unwrap();

        assert_eq!(sheets[0].tasks.len(), 1);
        assert_eq!(sheets[0].tasks[0].assignments[0].bills.len(), 1);
        assert!(sheets[0].tasks[0].bills.is_empty());
    }

    #[tokio::test]
    async fn test_missing_pay_period_skips_dependent_kinds() {
        let fx = Fixture::new().await;
        fx.add_task("Holiday", true).await;

        // No pay period begins on this date.
        let mut sheets = vec![timesheet(&fx, date(2030, 1, 1)).await];
        let kinds = [Enrichment::PayPeriods, Enrichment::Holidays, Enrichment::Tasks, Enrichment::Bills];
        enrich(&fx.db, fx.company_id, &mut sheets, &kinds).await.unwrap();

        assert!(sheets[0].pay_period.is_none());
        assert!(sheets[0].tasks.is_empty());
        assert!(sheets[0].holidays.is_empty());
    }

    #[tokio::test]
    async fn test_order_matters_for_dependent_kinds() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        fx.add_task("Holiday", true).await;

        // Tasks before pay periods sees no pay period yet.
        let mut sheets = vec![timesheet(&fx, date(2024, 6, 3)).await];
        enrich(&fx.db, fx.company_id, &mut sheets, &[Enrichment::Tasks, Enrichment::PayPeriods])
            .await
            .unwrap();
        assert!(sheets[0].pay_period.is_some());
        assert!(sheets[0].tasks.is_empty());

        enrich(&fx.db, fx.company_id, &mut sheets, &[Enrichment::Tasks]).await.unwrap();
        assert_eq!(sheets[0].tasks.len(), 1);
    }

    #[test]
    fn test_attach_bills_respects_assignment_window() {
        let fx_day = date(2024, 6, 5);
        let mut ts = Timesheet::new(1, 1, 7, date(2024, 6, 3));
        ts.tasks.push(crate::models::Task {
            id: 10,
            company_id: 1,
            description: "Development".to_string(),
            job_code: "DEV".to_string(),
            administrative: false,
            active: true,
            assignments: vec![crate::models::Assignment {
                id: 100,
                company_id: 1,
                task_id: 10,
                user_id: 7,
                labor_cat: "Engineer".to_string(),
                item_name: "Build".to_string(),
                begin: Some(date(2024, 6, 1)),
                end: Some(date(2024, 6, 3)),
                bills: Vec::new(),
            }],
            bills: Vec::new(),
        });

        let bill = |id: i64, day: NaiveDate, assignment_id: Option<i64>| Bill {
            id,
            assignment_id,
            task_id: 10,
            user_id: 7,
            day,
            hours: dec!(4.00),
            timestamp: chrono::Utc::now(),
            reason: None,
        };
        attach_bills(
            &mut ts,
            vec![
                bill(1, date(2024, 6, 3), Some(100)),
                bill(2, fx_day, Some(100)),
                bill(3, fx_day, None),
                Bill { task_id: 99, ..bill(4, fx_day, None) },
            ],
        );

        let task = &ts.tasks[0];
        let on_assignment: Vec<_> = task.assignments[0].bills.iter().map(|b| b.id).collect();
        let on_task: Vec<_> = task.bills.iter().map(|b| b.id).collect();
        assert_eq!(on_assignment, vec![1]);
        assert_eq!(on_task, vec![2, 3]);
    }
}
