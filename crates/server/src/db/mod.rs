pub mod models;
pub mod stores;

mod audit_logs;
mod bills;
mod holidays;
mod pay_periods;
mod tasks;
mod timesheets;
mod users;

use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Sqlite, SqlitePool};

pub use stores::{
    AuditLogStore, BillStore, HolidayStore, PayPeriodStore, TaskStore, TimesheetStore, UserStore,
};

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // Ensure the data directory exists
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// A migrated database that lives for as long as the returned handle.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        // One connection that never expires, or the data would vanish.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Self { pool };
        db.run_migrations().await.unwrap();
        db
    }

    pub async fn add_company(&self, name: &str) -> crate::error::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>("INSERT INTO companies (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}

/// Appends `(?, ?, ...)` binding every id.
pub(crate) fn push_ids(query: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    query.push("(");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
