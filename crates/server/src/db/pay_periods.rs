use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

use super::models::PayPeriodRow;
use super::stores::PayPeriodStore;
use super::Database;
use crate::error::Result;
use crate::models::PayPeriod;

const COLUMNS: &str = "SELECT company_id, pp_begin, pp_end, type FROM pay_periods";

impl Database {
    async fn fetch_pay_period(&self, sql: &str, company_id: i64, day: Option<NaiveDate>) -> Result<Option<PayPeriod>> {
        let mut query = sqlx::query_as::<_, PayPeriodRow>(sql).bind(company_id);
        if let Some(day) = day {
            query = query.bind(day);
        }
        query
            .fetch_optional(&self.pool)
            .await?
            .map(PayPeriod::try_from)
            .transpose()
    }
}

impl PayPeriodStore for Database {
    async fn pay_period(&self, company_id: i64, begin: NaiveDate) -> Result<Option<PayPeriod>> {
        let sql = format!("{COLUMNS} WHERE company_id = ? AND pp_begin = ?");
        self.fetch_pay_period(&sql, company_id, Some(begin)).await
    }

    async fn pay_period_containing(&self, company_id: i64, day: NaiveDate) -> Result<Option<PayPeriod>> {
        let sql = format!("{COLUMNS} WHERE company_id = ?1 AND pp_begin <= ?2 AND pp_end >= ?2");
        self.fetch_pay_period(&sql, company_id, Some(day)).await
    }

    async fn earliest_pay_period(&self, company_id: i64) -> Result<Option<PayPeriod>> {
        let sql = format!("{COLUMNS} WHERE company_id = ? ORDER BY pp_begin ASC LIMIT 1");
        self.fetch_pay_period(&sql, company_id, None).await
    }

    async fn latest_pay_period(&self, company_id: i64) -> Result<Option<PayPeriod>> {
        let sql = format!("{COLUMNS} WHERE company_id = ? ORDER BY pp_begin DESC LIMIT 1");
        self.fetch_pay_period(&sql, company_id, None).await
    }

    async fn pay_periods_beginning(&self, company_id: i64, begins: &[NaiveDate]) -> Result<Vec<PayPeriod>> {
        if begins.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(COLUMNS);
        query.push(" WHERE company_id = ").push_bind(company_id);
        query.push(" AND pp_begin IN (");
        let mut separated = query.separated(", ");
        for begin in begins {
            separated.push_bind(*begin);
        }
        separated.push_unseparated(")");

        query
            .build_query_as::<PayPeriodRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PayPeriod::try_from)
            .collect()
    }

    async fn add_pay_periods(&self, pay_periods: &[PayPeriod]) -> Result<u64> {
        if pay_periods.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("INSERT INTO pay_periods (company_id, pp_begin, pp_end, type) ");
        query.push_values(pay_periods, |mut row, pp| {
            row.push_bind(pp.company_id())
                .push_bind(pp.begin())
                .push_bind(pp.end())
                .push_bind(pp.kind().as_str());
        });
        // Another request may have materialized the same periods already.
        query.push(" ON CONFLICT (company_id, pp_begin) DO NOTHING");

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayPeriodType;
    use crate::testing::date;

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().await;
        let company_id = db.add_company("Acme").await.unwrap();
        (db, company_id)
    }

    fn weekly(company_id: i64, begin: NaiveDate) -> PayPeriod {
        PayPeriod::new(company_id, PayPeriodType::Weekly, begin, begin + chrono::Duration::days(6)).unwrap()
    }

    #[tokio::test]
    async fn test_empty_company_has_no_pay_periods() {
        let (db, company_id) = setup().await;
        assert!(db.earliest_pay_period(company_id).await.unwrap().is_none());
        assert!(db.latest_pay_period(company_id).await.unwrap().is_none());
        assert!(db
            .pay_period_containing(company_id, date(2024, 6, 3))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (db, company_id) = setup().await;
        let periods = vec![weekly(company_id, date(2024, 6, 3)), weekly(company_id, date(2024, 6, 10))];

        assert_eq!(db.add_pay_periods(&periods).await.unwrap(), 2);
        assert_eq!(db.add_pay_periods(&periods).await.unwrap(), 0);

        assert_eq!(db.earliest_pay_period(company_id).await.unwrap(), Some(periods[0].clone()));
        assert_eq!(db.latest_pay_period(company_id).await.unwrap(), Some(periods[1].clone()));
    }

    #[tokio::test]
    async fn test_containing_and_lookup() {
        let (db, company_id) = setup().await;
        let pp = weekly(company_id, date(2024, 6, 3));
        db.add_pay_periods(std::slice::from_ref(&pp)).await.unwrap();

        for day in [date(2024, 6, 3), date(2024, 6, 6), date(2024, 6, 9)] {
            assert_eq!(db.pay_period_containing(company_id, day).await.unwrap(), Some(pp.clone()));
        }
        assert!(db
            .pay_period_containing(company_id, date(2024, 6, 10))
            .await
            .unwrap()
            .is_none());

        assert_eq!(db.pay_period(company_id, date(2024, 6, 3)).await.unwrap(), Some(pp.clone()));
        let found = db
            .pay_periods_beginning(company_id, &[date(2024, 6, 3), date(2024, 7, 1)])
            .await
            .unwrap();
        assert_eq!(found, vec![pp]);
    }

    #[tokio::test]
    async fn test_periods_are_scoped_by_company() {
        let (db, company_id) = setup().await;
        let other = db.add_company("Other").await.unwrap();
        db.add_pay_periods(&[weekly(company_id, date(2024, 6, 3))]).await.unwrap();

        assert!(db.earliest_pay_period(other).await.unwrap().is_none());
    }
}
