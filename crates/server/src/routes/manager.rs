use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{
    auth::{check_password, hash_password},
    holidays, parse_day,
};
use crate::{
    db::{stores::NewUser, PayPeriodStore, TaskStore, UserStore},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    models::{
        task::{AssignmentFilter, CreateAssignment, CreateTask},
        user::CreateUser,
        Assignment, Enrichment, LifecycleFlag, PayPeriod, PayPeriodType, Role, Supervisor, Task, Timesheet,
        User,
    },
    services::lifecycle,
    AppState,
};

const MANAGERS: &[Role] = &[Role::Manager, Role::Admin];
const APPROVERS: &[Role] = &[Role::Supervisor, Role::Manager, Role::Admin];
const PAYROLL: &[Role] = &[Role::Payroll, Role::Admin];
const REVIEWERS: &[Role] = &[Role::Supervisor, Role::Manager, Role::Payroll, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/timesheet/:id", get(get_timesheet).delete(delete_timesheet))
        .route("/timesheet/:id/approve", post(approve))
        .route("/timesheet/:id/verify", post(verify))
        .route("/timesheet/:id/export", post(export))
        .route("/task", get(list_tasks).post(add_task))
        .route("/task/:id", get(get_task))
        .route("/assignment", post(add_assignment))
        .route("/assignment/task/:task_id", get(task_assignments))
        .route("/assignment/user/:user_id", get(user_assignments))
        .route("/assignment/:id", put(update_assignment).delete(delete_assignment))
        .route("/user", get(list_users).post(add_user))
        .route("/user/:id", get(get_user))
        .route("/supervisor", post(add_supervisor))
        .route("/supervisor/:user_id", get(list_supervisors))
        .route("/supervisor/:user_id/:supervisor_id", delete(delete_supervisor))
        .route("/payperiod", post(add_pay_period))
        .nest("/holiday", holidays::router())
}

#[derive(Debug, Deserialize)]
pub struct TimesheetQuery {
    /// Comma-separated enrichment kinds; everything when absent.
    pub enrich: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentQuery {
    /// `yyyyMMdd`; only assignments whose window holds this day.
    pub day: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl AssignmentQuery {
    fn filter(&self) -> Result<AssignmentFilter> {
        let day = match self.day.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(day) => Some(parse_day(day)?),
        };
        Ok(AssignmentFilter {
            day,
            include_inactive: self.include_inactive,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub value: bool,
}

#[derive(Debug, Deserialize)]
pub struct SupervisorRequest {
    pub user_id: i64,
    pub supervisor_id: i64,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct PayPeriodRequest {
    #[serde(rename = "type")]
    pub kind: PayPeriodType,
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

async fn set_status(
    state: &AppState,
    auth_user: &AuthUser,
    id: i64,
    flag: LifecycleFlag,
    value: bool,
) -> Result<Json<Timesheet>> {
    let timesheet =
        lifecycle::set_status(&state.db, auth_user.company_id, auth_user.id, id, flag, value).await?;
    Ok(Json(timesheet))
}

async fn approve(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Timesheet>> {
    auth_user.require_any(APPROVERS)?;
    set_status(&state, &auth_user, id, LifecycleFlag::Approved, body.value).await
}

async fn verify(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Timesheet>> {
    auth_user.require_any(PAYROLL)?;
    set_status(&state, &auth_user, id, LifecycleFlag::Verified, body.value).await
}

async fn export(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Timesheet>> {
    auth_user.require_any(PAYROLL)?;
    set_status(&state, &auth_user, id, LifecycleFlag::Exported, body.value).await
}

async fn get_timesheet(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Query(query): Query<TimesheetQuery>,
) -> Result<Json<Timesheet>> {
    auth_user.require_any(REVIEWERS)?;
    let enrichments = match query.enrich.as_deref() {
        Some(kinds) => kinds
            .split(',')
            .filter(|kind| !kind.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Enrichment>>>()?,
        None => lifecycle::FULL.to_vec(),
    };
    let timesheet = lifecycle::load(&state.db, auth_user.company_id, id, &enrichments).await?;
    Ok(Json(timesheet))
}

async fn delete_timesheet(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth_user.require_any(MANAGERS)?;
    lifecycle::delete(&state.db, auth_user.company_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tasks(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Vec<Task>>> {
    auth_user.require_any(MANAGERS)?;
    Ok(Json(state.db.tasks(auth_user.company_id).await?))
}

async fn get_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Task>> {
    auth_user.require_any(MANAGERS)?;
    state
        .db
        .task(auth_user.company_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Task {id} not found")))
}

async fn add_task(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>)> {
    auth_user.require_any(MANAGERS)?;
    let task = state.db.add_task(auth_user.company_id, &body).await?;
    tracing::info!(task_id = task.id, job_code = %task.job_code, "Task added");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn add_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<CreateAssignment>,
) -> Result<(StatusCode, Json<Assignment>)> {
    auth_user.require_any(MANAGERS)?;
    let assignment = state.db.add_assignment(auth_user.company_id, &body).await?;
    tracing::info!(
        assignment_id = assignment.id,
        task_id = assignment.task_id,
        user_id = assignment.user_id,
        "Assignment added"
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn task_assignments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(task_id): Path<i64>,
    Query(query): Query<AssignmentQuery>,
) -> Result<Json<Vec<Assignment>>> {
    auth_user.require_any(MANAGERS)?;
    let filter = query.filter()?;
    Ok(Json(state.db.assignments_for_task(auth_user.company_id, task_id, &filter).await?))
}

async fn user_assignments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
    Query(query): Query<AssignmentQuery>,
) -> Result<Json<Vec<Assignment>>> {
    auth_user.require_any(MANAGERS)?;
    let filter = query.filter()?;
    Ok(Json(state.db.assignments_for_user(auth_user.company_id, user_id, &filter).await?))
}

async fn update_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<CreateAssignment>,
) -> Result<Json<Assignment>> {
    auth_user.require_any(MANAGERS)?;
    let assignment = state
        .db
        .update_assignment(auth_user.company_id, id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Assignment {id} not found")))?;
    tracing::info!(assignment_id = id, "Assignment updated");
    Ok(Json(assignment))
}

async fn delete_assignment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth_user.require_any(MANAGERS)?;
    if state.db.delete_assignments(auth_user.company_id, &[id]).await? == 0 {
        return Err(AppError::NotFound(format!("Assignment {id} not found")));
    }
    tracing::info!(assignment_id = id, "Assignment deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_users(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Vec<User>>> {
    auth_user.require_any(MANAGERS)?;
    Ok(Json(state.db.company_users(auth_user.company_id).await?))
}

async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<User>> {
    auth_user.require_any(MANAGERS)?;
    state
        .db
        .users(&[id])
        .await?
        .remove(&id)
        .filter(|user| user.company_id == auth_user.company_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
}

async fn add_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    auth_user.require_any(MANAGERS)?;
    check_password(&body.password)?;

    let roles = if body.roles.is_empty() {
        vec![Role::User]
    } else {
        body.roles
    };
    let hashed_pass = hash_password(&body.password)?;
    let user = state
        .db
        .add_user(
            auth_user.company_id,
            &NewUser {
                login: &body.login,
                hashed_pass: &hashed_pass,
                email: body.email.trim(),
                first_name: body.first_name.trim(),
                last_name: body.last_name.trim(),
                roles: &roles,
            },
        )
        .await?;

    tracing::info!(user_id = user.id, login = %user.login, "User added");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn add_supervisor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<SupervisorRequest>,
) -> Result<StatusCode> {
    auth_user.require_any(MANAGERS)?;
    state
        .db
        .add_supervisor(auth_user.company_id, body.user_id, body.supervisor_id, body.primary)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_supervisors(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Supervisor>>> {
    auth_user.require_any(MANAGERS)?;
    Ok(Json(state.db.supervisors(auth_user.company_id, user_id).await?))
}

async fn delete_supervisor(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((user_id, supervisor_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    auth_user.require_any(MANAGERS)?;
    let deleted = state
        .db
        .delete_supervisors(auth_user.company_id, user_id, &[supervisor_id])
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!(
            "User {supervisor_id} does not supervise user {user_id}"
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_pay_period(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<PayPeriodRequest>,
) -> Result<(StatusCode, Json<PayPeriod>)> {
    auth_user.require_any(MANAGERS)?;
    let pay_period = PayPeriod::new(auth_user.company_id, body.kind, body.begin, body.end)?;
    if state.db.add_pay_periods(std::slice::from_ref(&pay_period)).await? == 0 {
        return Err(AppError::Validation(format!(
            "A pay period beginning {} already exists",
            pay_period.begin()
        )));
    }
    tracing::info!(begin = %pay_period.begin(), kind = %pay_period.kind(), "Pay period added");
    Ok((StatusCode::CREATED, Json(pay_period)))
}
