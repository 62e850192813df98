use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::BillRow;
use super::stores::BillStore;
use super::{push_ids, Database};
use crate::error::Result;
use crate::models::{Bill, BillEntry};

const COLUMNS: &str = "SELECT id, assignment_id, task_id, user_id, day, hours, timestamp, reason FROM bills";

impl BillStore for Database {
    async fn bills_for_users(&self, user_ids: &[i64], begin: NaiveDate, end: NaiveDate) -> Result<Vec<Bill>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Sqlite>::new(COLUMNS);
        query.push(" WHERE day >= ").push_bind(begin);
        query.push(" AND day <= ").push_bind(end);
        query.push(" AND user_id IN ");
        push_ids(&mut query, user_ids);
        query.push(" ORDER BY day, task_id, id");

        query
            .build_query_as::<BillRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Bill::try_from)
            .collect()
    }

    async fn add_bill(&self, user_id: i64, entry: &BillEntry) -> Result<Bill> {
        let timestamp = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO bills (assignment_id, task_id, user_id, day, hours, timestamp, reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(entry.assignment_id)
        .bind(entry.task_id)
        .bind(user_id)
        .bind(entry.day)
        .bind(entry.hours.to_string())
        .bind(timestamp)
        .bind(entry.reason.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(Bill {
            id,
            assignment_id: entry.assignment_id,
            task_id: entry.task_id,
            user_id,
            day: entry.day,
            hours: entry.hours,
            timestamp,
            reason: entry.reason.clone(),
        })
    }

    async fn update_bill(&self, id: i64, entry: &BillEntry) -> Result<bool> {
        let result = sqlx::query("UPDATE bills SET hours = ?, timestamp = ?, reason = ? WHERE id = ?")
            .bind(entry.hours.to_string())
            .bind(Utc::now())
            .bind(entry.reason.as_deref())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bills(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM bills WHERE id IN ");
        push_ids(&mut query, ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
