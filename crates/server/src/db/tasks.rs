use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

use super::models::{AssignmentRow, TaskRow};
use super::stores::TaskStore;
use super::{push_ids, Database};
use crate::error::{AppError, Result};
use crate::models::task::{AssignmentFilter, CreateAssignment, CreateTask};
use crate::models::{Assignment, PayPeriod, Task};

const ASSIGNMENT_COLUMNS: &str =
    "a.id, a.company_id, a.task_id, a.user_id, a.labor_cat, a.item_name, a.begin_day, a.end_day";

// Assignment window overlaps [?begin, ?end]; a missing bound is open.
const OVERLAPS: &str = "(a.begin_day IS NULL OR a.begin_day <= ?3) AND (a.end_day IS NULL OR a.end_day >= ?2)";

const RETURNING: &str = "RETURNING id, company_id, task_id, user_id, labor_cat, item_name, begin_day, end_day";

impl Database {
    /// Rejects inverted windows, and tasks or users outside the company.
    async fn check_assignment(&self, company_id: i64, assignment: &CreateAssignment) -> Result<()> {
        if let (Some(begin), Some(end)) = (assignment.begin, assignment.end) {
            if begin > end {
                return Err(AppError::Validation(format!(
                    "Assignment begin {begin} is after its end {end}"
                )));
            }
        }

        let task_found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE id = ? AND company_id = ?")
            .bind(assignment.task_id)
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        if task_found == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", assignment.task_id)));
        }

        let user_found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ? AND company_id = ?")
            .bind(assignment.user_id)
            .bind(company_id)
            .fetch_one(&self.pool)
            .await?;
        if user_found == 0 {
            return Err(AppError::NotFound(format!("User {} not found", assignment.user_id)));
        }
        Ok(())
    }

    async fn assignments_by(
        &self,
        company_id: i64,
        column: &str,
        id: i64,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a \
             JOIN tasks t ON t.id = a.task_id JOIN users u ON u.id = a.user_id WHERE a.company_id = "
        ));
        query.push_bind(company_id);
        query.push(format!(" AND a.{column} = ")).push_bind(id);
        if let Some(day) = filter.day {
            query.push(" AND (a.begin_day IS NULL OR a.begin_day <= ").push_bind(day);
            query.push(") AND (a.end_day IS NULL OR a.end_day >= ").push_bind(day).push(")");
        }
        if !filter.include_inactive {
            query.push(" AND t.active = 1 AND u.active = 1");
        }
        query.push(" ORDER BY a.id");

        Ok(query
            .build_query_as::<AssignmentRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Assignment::from)
            .collect())
    }
}

impl TaskStore for Database {
    async fn tasks_for_pay_period(&self, pay_period: &PayPeriod, user_ids: &[i64]) -> Result<HashMap<i64, Vec<Task>>> {
        let mut by_user = HashMap::new();

        for &user_id in user_ids {
            let tasks: Vec<Task> = sqlx::query_as::<_, TaskRow>(&format!(
                "SELECT t.id, t.company_id, t.description, t.job_code, t.admin, t.active FROM tasks t \
                 WHERE t.company_id = ?1 AND t.active = 1 AND (t.admin = 1 OR EXISTS ( \
                 SELECT 1 FROM assignments a WHERE a.task_id = t.id AND a.user_id = ?4 AND {OVERLAPS})) \
                 ORDER BY t.description, t.id"
            ))
            .bind(pay_period.company_id())
            .bind(pay_period.begin())
            .bind(pay_period.end())
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();

            let assignments = sqlx::query_as::<_, AssignmentRow>(&format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a JOIN tasks t ON t.id = a.task_id \
                 WHERE t.company_id = ?1 AND t.active = 1 AND a.user_id = ?4 AND {OVERLAPS} \
                 ORDER BY a.id"
            ))
            .bind(pay_period.company_id())
            .bind(pay_period.begin())
            .bind(pay_period.end())
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            by_user.insert(user_id, attach_assignments(tasks, assignments));
        }

        Ok(by_user)
    }

    async fn tasks(&self, company_id: i64) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, TaskRow>(
            "SELECT id, company_id, description, job_code, admin, active FROM tasks \
             WHERE company_id = ? ORDER BY description, id",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Task::from)
        .collect();

        let assignments = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a WHERE a.company_id = ? ORDER BY a.id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attach_assignments(tasks, assignments))
    }

    async fn task(&self, company_id: i64, id: i64) -> Result<Option<Task>> {
        let Some(row) = sqlx::query_as::<_, TaskRow>(
            "SELECT id, company_id, description, job_code, admin, active FROM tasks \
             WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let assignments = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a WHERE a.task_id = ? ORDER BY a.id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attach_assignments(vec![row.into()], assignments).pop())
    }

    async fn add_task(&self, company_id: i64, task: &CreateTask) -> Result<Task> {
        let description = task.description.trim();
        let job_code = task.job_code.trim();
        if description.is_empty() || job_code.is_empty() {
            return Err(AppError::Validation(
                "Task description and job code are required".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, TaskRow>(
            "INSERT INTO tasks (company_id, description, job_code, admin) VALUES (?, ?, ?, ?) \
             RETURNING id, company_id, description, job_code, admin, active",
        )
        .bind(company_id)
        .bind(description)
        .bind(job_code)
        .bind(task.administrative)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn add_assignment(&self, company_id: i64, assignment: &CreateAssignment) -> Result<Assignment> {
        self.check_assignment(company_id, assignment).await?;

        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "INSERT INTO assignments (company_id, task_id, user_id, labor_cat, item_name, begin_day, end_day) \
             VALUES (?, ?, ?, ?, ?, ?, ?) {RETURNING}",
        ))
        .bind(company_id)
        .bind(assignment.task_id)
        .bind(assignment.user_id)
        .bind(assignment.labor_cat.trim())
        .bind(assignment.item_name.trim())
        .bind(assignment.begin)
        .bind(assignment.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn assignments_for_task(
        &self,
        company_id: i64,
        task_id: i64,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>> {
        self.assignments_by(company_id, "task_id", task_id, filter).await
    }

    async fn assignments_for_user(
        &self,
        company_id: i64,
        user_id: i64,
        filter: &AssignmentFilter,
    ) -> Result<Vec<Assignment>> {
        self.assignments_by(company_id, "user_id", user_id, filter).await
    }

    async fn update_assignment(
        &self,
        company_id: i64,
        id: i64,
        assignment: &CreateAssignment,
    ) -> Result<Option<Assignment>> {
        self.check_assignment(company_id, assignment).await?;

        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "UPDATE assignments SET task_id = ?, user_id = ?, labor_cat = ?, item_name = ?, \
             begin_day = ?, end_day = ? WHERE id = ? AND company_id = ? {RETURNING}"
        ))
        .bind(assignment.task_id)
        .bind(assignment.user_id)
        .bind(assignment.labor_cat.trim())
        .bind(assignment.item_name.trim())
        .bind(assignment.begin)
        .bind(assignment.end)
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Assignment::from))
    }

    async fn delete_assignments(&self, company_id: i64, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM assignments WHERE company_id = ");
        query.push_bind(company_id);
        query.push(" AND id IN ");
        push_ids(&mut query, ids);
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn attach_assignments(mut tasks: Vec<Task>, assignments: Vec<AssignmentRow>) -> Vec<Task> {
    for row in assignments {
        if let Some(task) = tasks.iter_mut().find(|t| t.id == row.task_id) {
            task.assignments.push(row.into());
        }
    }
    tasks
}
