//! Seed data shared by store, service and route tests.

use chrono::NaiveDate;

use crate::db::stores::NewUser;
use crate::db::{Database, PayPeriodStore, TaskStore, UserStore};
use crate::models::task::{CreateAssignment, CreateTask};
use crate::models::{Assignment, PayPeriod, PayPeriodType, Role, Task};
use crate::config::Config;
use crate::routes::auth::{create_token, hash_password};
use crate::AppState;

pub const PASSWORD: &str = "correct horse";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const JWT_SECRET: &str = "test-secret";

pub fn state(fx: &Fixture) -> AppState {
    AppState {
        db: fx.db.clone(),
        config: Config {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: JWT_SECRET.to_string(),
            static_dir: "static".to_string(),
            admin_login: "admin".to_string(),
            admin_password: None,
            admin_email: "admin@localhost".to_string(),
            company_name: "Acme".to_string(),
        },
    }
}

/// Signs a token for an existing user of the fixture company.
pub async fn bearer(fx: &Fixture, user_id: i64) -> String {
    let users = fx.db.users(&[user_id]).await.unwrap();
    create_token(&users[&user_id], JWT_SECRET).unwrap()
}

/// A company with one regular user and one manager.
pub struct Fixture {
    pub db: Database,
    pub company_id: i64,
    pub user_id: i64,
    pub manager_id: i64,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = Database::in_memory().await;
        let company_id = db.add_company("Acme").await.unwrap();
        let hashed_pass = hash_password(PASSWORD).unwrap();

        let user = db
            .add_user(
                company_id,
                &NewUser {
                    login: "jdoe",
                    hashed_pass: &hashed_pass,
                    email: "jdoe@example.com",
                    first_name: "Jane",
                    last_name: "Doe",
                    roles: &[Role::User],
                },
            )
            .await
            .unwrap();
        let manager = db
            .add_user(
                company_id,
                &NewUser {
                    login: "boss",
                    hashed_pass: &hashed_pass,
                    email: "boss@example.com",
                    first_name: "Bob",
                    last_name: "Oss",
                    roles: &[Role::Manager, Role::Supervisor, Role::Payroll],
                },
            )
            .await
            .unwrap();

        Self {
            db,
            company_id,
            user_id: user.id,
            manager_id: manager.id,
        }
    }

    /// Seeds the weekly pay period June 3-9, 2024 and returns it.
    pub async fn with_weekly_pay_period(&self) -> PayPeriod {
        let pp = PayPeriod::new(self.company_id, PayPeriodType::Weekly, date(2024, 6, 3), date(2024, 6, 9)).unwrap();
        self.db.add_pay_periods(std::slice::from_ref(&pp)).await.unwrap();
        pp
    }

    pub async fn add_task(&self, description: &str, administrative: bool) -> Task {
        self.db
            .add_task(
                self.company_id,
                &CreateTask {
                    description: description.to_string(),
                    job_code: format!("JC-{description}"),
                    administrative,
                },
            )
            .await
            .unwrap()
    }

    pub async fn add_assignment(
        &self,
        task_id: i64,
        user_id: i64,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Assignment {
        self.db
            .add_assignment(
                self.company_id,
                &CreateAssignment {
                    task_id,
                    user_id,
                    labor_cat: "Engineer".to_string(),
                    item_name: "Build".to_string(),
                    begin,
                    end,
                },
            )
            .await
            .unwrap()
    }
}
