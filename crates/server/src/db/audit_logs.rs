use sqlx::{QueryBuilder, Sqlite};

use super::models::AuditLogRow;
use super::stores::AuditLogStore;
use super::{push_ids, Database};
use crate::error::Result;
use crate::models::AuditLog;

impl AuditLogStore for Database {
    async fn add_audit_logs(&self, logs: &[AuditLog]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }
        let mut query = QueryBuilder::<Sqlite>::new("INSERT INTO audit_logs (company_id, timesheet_id, log, timestamp) ");
        query.push_values(logs, |mut row, log| {
            row.push_bind(log.company_id)
                .push_bind(log.timesheet_id)
                .push_bind(log.log.clone())
                .push_bind(log.timestamp);
        });
        query.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn audit_logs_for_timesheets(&self, timesheet_ids: &[i64]) -> Result<Vec<AuditLog>> {
        if timesheet_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT company_id, timesheet_id, log, timestamp FROM audit_logs WHERE timesheet_id IN ",
        );
        push_ids(&mut query, timesheet_ids);
        query.push(" ORDER BY id");

        let rows = query.build_query_as::<AuditLogRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AuditLog::from).collect())
    }

    async fn delete_audit_logs(&self, timesheet_ids: &[i64]) -> Result<u64> {
        if timesheet_ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM audit_logs WHERE timesheet_id IN ");
        push_ids(&mut query, timesheet_ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_logs_grouped_by_timesheet() {
        let fx = Fixture::new().await;
        fx.db
            .add_audit_logs(&[
                AuditLog::new(fx.company_id, 1, "first"),
                AuditLog::new(fx.company_id, 1, "second"),
                AuditLog::new(fx.company_id, 2, "other"),
            ])
            .await
            .unwrap();

        let logs = fx.db.audit_logs_for_timesheets(&[1]).await.unwrap();
        let messages: Vec<_> = logs.iter().map(|l| l.log.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);

        assert_eq!(fx.db.delete_audit_logs(&[1, 3]).await.unwrap(), 2);
        assert!(fx.db.audit_logs_for_timesheets(&[1]).await.unwrap().is_empty());
        assert_eq!(fx.db.audit_logs_for_timesheets(&[1, 2]).await.unwrap().len(), 1);
    }
}
