use std::collections::HashMap;
use std::str::FromStr;

use sqlx::{QueryBuilder, Sqlite};

use super::models::UserRow;
use super::stores::{NewUser, ProfileUpdate, UserStore};
use super::{push_ids, Database};
use crate::error::{AppError, Result};
use crate::models::{Role, Supervisor, User};

const COLUMNS: &str =
    "SELECT u.id, u.company_id, u.login, u.hashed_pass, u.email, u.first_name, u.last_name, u.active FROM users u";

impl Database {
    async fn roles(&self, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Role>>> {
        let mut roles: HashMap<i64, Vec<Role>> = HashMap::new();
        if user_ids.is_empty() {
            return Ok(roles);
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT user_id, name FROM user_roles WHERE user_id IN ");
        push_ids(&mut query, user_ids);
        query.push(" ORDER BY user_id, name");

        for (user_id, name) in query.build_query_as::<(i64, String)>().fetch_all(&self.pool).await? {
            roles.entry(user_id).or_default().push(Role::from_str(&name)?);
        }
        Ok(roles)
    }

    async fn with_roles(&self, rows: Vec<UserRow>) -> Result<Vec<User>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut roles = self.roles(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let user_roles = roles.remove(&row.id).unwrap_or_default();
                row.into_user(user_roles)
            })
            .collect())
    }
}

impl UserStore for Database {
    async fn users(&self, ids: &[i64]) -> Result<HashMap<i64, User>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(COLUMNS);
        query.push(" WHERE u.id IN ");
        push_ids(&mut query, ids);
        let rows = query.build_query_as::<UserRow>().fetch_all(&self.pool).await?;

        Ok(self
            .with_roles(rows)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect())
    }

    async fn credentials(&self, login: &str) -> Result<Option<(User, String)>> {
        let Some(row) = sqlx::query_as::<_, UserRow>(&format!("{COLUMNS} WHERE u.login = ? AND u.active = 1"))
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let hashed_pass = row.hashed_pass.clone();
        let mut roles = self.roles(&[row.id]).await?;
        let user_roles = roles.remove(&row.id).unwrap_or_default();
        Ok(Some((row.into_user(user_roles), hashed_pass)))
    }

    async fn add_user(&self, company_id: i64, user: &NewUser<'_>) -> Result<User> {
        let login = user.login.trim();
        if login.is_empty() {
            return Err(AppError::Validation("Login is required".to_string()));
        }
        if !user.email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE login = ?")
            .bind(login)
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Err(AppError::Validation(format!("Login {login} is already taken")));
        }

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (company_id, login, hashed_pass, email, first_name, last_name) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(company_id)
        .bind(login)
        .bind(user.hashed_pass)
        .bind(user.email.trim())
        .bind(user.first_name.trim())
        .bind(user.last_name.trim())
        .fetch_one(&self.pool)
        .await?;

        let mut roles = user.roles.to_vec();
        roles.sort();
        roles.dedup();
        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, name) VALUES (?, ?)")
                .bind(id)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        }

        Ok(User {
            id,
            company_id,
            login: login.to_string(),
            email: user.email.trim().to_string(),
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            active: true,
            roles,
        })
    }

    async fn company_users(&self, company_id: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{COLUMNS} WHERE u.company_id = ? ORDER BY u.last_name, u.first_name, u.id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_roles(rows).await
    }

    async fn update_profile(&self, user_id: i64, profile: &ProfileUpdate<'_>) -> Result<User> {
        let login = profile.login.trim();
        if login.is_empty() {
            return Err(AppError::Validation("Login is required".to_string()));
        }
        if !profile.email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
            return Err(AppError::Validation("First and last name are required".to_string()));
        }

        let taken = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE login = ? AND id <> ?")
            .bind(login)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        if taken > 0 {
            return Err(AppError::Validation(format!("Login {login} is already taken")));
        }

        let result = sqlx::query("UPDATE users SET login = ?, email = ?, first_name = ?, last_name = ? WHERE id = ?")
            .bind(login)
            .bind(profile.email.trim())
            .bind(profile.first_name.trim())
            .bind(profile.last_name.trim())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }

        if let Some(hashed_pass) = profile.hashed_pass {
            sqlx::query("UPDATE users SET hashed_pass = ? WHERE id = ?")
                .bind(hashed_pass)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        }

        self.users(&[user_id])
            .await?
            .remove(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    async fn supervisors(&self, company_id: i64, user_id: i64) -> Result<Vec<Supervisor>> {
        let rows = sqlx::query_as::<_, (i64, bool)>(
            "SELECT supervisor_id, is_primary FROM supervisors WHERE company_id = ? AND user_id = ? \
             ORDER BY is_primary DESC, supervisor_id",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|(id, _)| *id).collect();
        let mut users = self.users(&ids).await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, primary)| users.remove(&id).map(|user| Supervisor { user, primary }))
            .collect())
    }

    async fn add_supervisor(&self, company_id: i64, user_id: i64, supervisor_id: i64, primary: bool) -> Result<()> {
        if user_id == supervisor_id {
            return Err(AppError::Validation("A user cannot supervise themselves".to_string()));
        }

        let users = self.users(&[user_id, supervisor_id]).await?;
        for id in [user_id, supervisor_id] {
            if users.get(&id).map_or(true, |u| u.company_id != company_id) {
                return Err(AppError::NotFound(format!("User {id} not found")));
            }
        }

        sqlx::query(
            "INSERT INTO supervisors (company_id, user_id, supervisor_id, is_primary) VALUES (?, ?, ?, ?) \
             ON CONFLICT (user_id, supervisor_id) DO UPDATE SET is_primary = excluded.is_primary",
        )
        .bind(company_id)
        .bind(user_id)
        .bind(supervisor_id)
        .bind(primary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_supervisors(&self, company_id: i64, user_id: i64, supervisor_ids: &[i64]) -> Result<u64> {
        if supervisor_ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM supervisors WHERE company_id = ");
        query.push_bind(company_id);
        query.push(" AND user_id = ").push_bind(user_id);
        query.push(" AND supervisor_id IN ");
        push_ids(&mut query, supervisor_ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
