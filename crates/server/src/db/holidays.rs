use sqlx::{QueryBuilder, Sqlite};

use super::models::HolidayRow;
use super::stores::HolidayStore;
use super::{push_ids, Database};
use crate::error::Result;
use crate::models::Holiday;

impl HolidayStore for Database {
    async fn holidays(&self, company_id: i64) -> Result<Vec<Holiday>> {
        sqlx::query_as::<_, HolidayRow>(
            "SELECT id, company_id, description, config FROM holidays WHERE company_id = ? ORDER BY id",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Holiday::try_from)
        .collect()
    }

    async fn holiday(&self, company_id: i64, id: i64) -> Result<Option<Holiday>> {
        sqlx::query_as::<_, HolidayRow>(
            "SELECT id, company_id, description, config FROM holidays WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Holiday::try_from)
        .transpose()
    }

    async fn common_holidays(&self, company_id: i64) -> Result<Vec<Holiday>> {
        let rows = sqlx::query_as::<_, (String, String)>("SELECT description, config FROM common_holidays")
            .fetch_all(&self.pool)
            .await?;

        let mut holidays = rows
            .into_iter()
            .map(|(description, config)| Holiday::new(0, company_id, description, config))
            .collect::<Result<Vec<_>>>()?;
        holidays.sort_by_key(|h| h.day);
        Ok(holidays)
    }

    async fn add_holiday(&self, company_id: i64, description: &str, config: &str) -> Result<Holiday> {
        // Validates before anything is written.
        let holiday = Holiday::new(0, company_id, description, config)?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO holidays (company_id, description, config) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(company_id)
        .bind(&holiday.description)
        .bind(&holiday.config)
        .fetch_one(&self.pool)
        .await?;

        Ok(Holiday { id, ..holiday })
    }

    async fn update_holiday(&self, holiday: &Holiday) -> Result<bool> {
        let result = sqlx::query("UPDATE holidays SET description = ?, config = ? WHERE company_id = ? AND id = ?")
            .bind(&holiday.description)
            .bind(&holiday.config)
            .bind(holiday.company_id)
            .bind(holiday.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_holidays(&self, company_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM holidays WHERE company_id = ");
        query.push_bind(company_id).push(" AND id IN ");
        push_ids(&mut query, ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_common_holidays_are_seeded() {
        let fx = Fixture::new().await;
        let common = fx.db.common_holidays(fx.company_id).await.unwrap();
        assert_eq!(common.len(), 10);
        assert!(common.iter().all(|h| h.company_id == fx.company_id && h.id == 0));
        assert!(common.windows(2).all(|w| w[0].day <= w[1].day));
    }

    #[tokio::test]
    async fn test_holiday_crud() {
        let fx = Fixture::new().await;
        let holiday = fx.db.add_holiday(fx.company_id, "Christmas", "December 25th").await.unwrap();
        assert!(holiday.id > 0);

        let updated = Holiday::new(holiday.id, fx.company_id, "Christmas Day", "Dec 25 observance").unwrap();
        assert!(fx.db.update_holiday(&updated).await.unwrap());
        assert_eq!(fx.db.holiday(fx.company_id, holiday.id).await.unwrap(), Some(updated));

        assert_eq!(fx.db.delete_holidays(fx.company_id, &[holiday.id]).await.unwrap(), 1);
        assert!(fx.db.holidays(fx.company_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_rule_is_not_stored() {
        let fx = Fixture::new().await;
        let result = fx.db.add_holiday(fx.company_id, "Someday", "whenever").await;
        assert!(matches!(result, Err(AppError::HolidayConfig(_))));
        assert!(fx.db.holidays(fx.company_id).await.unwrap().is_empty());
    }
}
