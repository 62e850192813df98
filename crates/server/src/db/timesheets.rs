use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

use super::models::TimesheetRow;
use super::stores::TimesheetStore;
use super::{push_ids, Database};
use crate::error::{AppError, Result};
use crate::models::{LifecycleFlag, Timesheet};

const COLUMNS: &str = "SELECT id, company_id, user_id, pp_begin, completed, approved, verified, exported, \
                       approver_id, verifier_id, exporter_id FROM timesheets";

impl TimesheetStore for Database {
    async fn timesheet(&self, company_id: i64, id: i64) -> Result<Option<Timesheet>> {
        let row = sqlx::query_as::<_, TimesheetRow>(&format!("{COLUMNS} WHERE company_id = ? AND id = ?"))
            .bind(company_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Timesheet::from))
    }

    async fn timesheet_for_user(&self, user_id: i64, begin: NaiveDate) -> Result<Option<Timesheet>> {
        let row = sqlx::query_as::<_, TimesheetRow>(&format!("{COLUMNS} WHERE user_id = ? AND pp_begin = ?"))
            .bind(user_id)
            .bind(begin)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Timesheet::from))
    }

    async fn latest_timesheet_for_user(&self, user_id: i64) -> Result<Option<Timesheet>> {
        let row = sqlx::query_as::<_, TimesheetRow>(&format!(
            "{COLUMNS} WHERE user_id = ? ORDER BY completed ASC, pp_begin DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Timesheet::from))
    }

    async fn ensure_timesheet(&self, company_id: i64, user_id: i64, begin: NaiveDate) -> Result<Timesheet> {
        sqlx::query(
            "INSERT INTO timesheets (company_id, user_id, pp_begin) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, pp_begin) DO NOTHING",
        )
        .bind(company_id)
        .bind(user_id)
        .bind(begin)
        .execute(&self.pool)
        .await?;

        self.timesheet_for_user(user_id, begin).await?.ok_or_else(|| {
            AppError::InconsistentState(format!("Timesheet for user {user_id} beginning {begin} vanished"))
        })
    }

    async fn set_flag(
        &self,
        company_id: i64,
        id: i64,
        flag: LifecycleFlag,
        value: bool,
        actor: Option<i64>,
    ) -> Result<bool> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE timesheets SET ");
        query.push(flag.column()).push(" = ").push_bind(value);

        if let Some(actor_column) = flag.actor_column() {
            let actor = match (value, actor) {
                (true, Some(actor)) => Some(actor),
                (true, None) => {
                    return Err(AppError::Validation(format!(
                        "Setting {} requires the acting user",
                        flag.column()
                    )))
                }
                (false, _) => None,
            };
            query.push(", ").push(actor_column).push(" = ").push_bind(actor);
        }

        query.push(" WHERE company_id = ").push_bind(company_id);
        query.push(" AND id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_timesheets(&self, company_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM timesheets WHERE company_id = ");
        query.push_bind(company_id).push(" AND id IN ");
        push_ids(&mut query, ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
