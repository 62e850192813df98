use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::HolidayStore,
    error::{AppError, Result},
    middleware::auth::AuthUser,
    models::{holiday, Holiday, Role},
    AppState,
};

const MANAGERS: &[Role] = &[Role::Manager, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_holidays).post(add_holiday))
        .route("/common", get(common_holidays))
        .route("/validate", post(validate))
        .route(
            "/:id",
            get(get_holiday).put(update_holiday).delete(delete_holiday),
        )
}

#[derive(Debug, Deserialize)]
pub struct HolidayRequest {
    pub description: String,
    pub config: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub config: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<NaiveDate>,
}

fn check_rule(config: &str) -> Result<()> {
    if holiday::is_valid(config.trim()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Unrecognized holiday rule: {config}")))
    }
}

async fn list_holidays(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Vec<Holiday>>> {
    auth_user.require_any(MANAGERS)?;
    Ok(Json(state.db.holidays(auth_user.company_id).await?))
}

async fn common_holidays(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Vec<Holiday>>> {
    auth_user.require_any(MANAGERS)?;
    Ok(Json(state.db.common_holidays(auth_user.company_id).await?))
}

async fn validate(auth_user: AuthUser, Json(body): Json<ValidateRequest>) -> Result<Json<ValidateResponse>> {
    auth_user.require_any(MANAGERS)?;
    let response = match holiday::calculate(body.config.trim(), Utc::now().year()) {
        Ok(day) => ValidateResponse {
            valid: true,
            msg: None,
            day: Some(day),
        },
        Err(e) => ValidateResponse {
            valid: false,
            msg: Some(e.to_string()),
            day: None,
        },
    };
    Ok(Json(response))
}

async fn get_holiday(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Holiday>> {
    auth_user.require_any(MANAGERS)?;
    state
        .db
        .holiday(auth_user.company_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Holiday {id} not found")))
}

async fn add_holiday(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<HolidayRequest>,
) -> Result<(StatusCode, Json<Holiday>)> {
    auth_user.require_any(MANAGERS)?;
    check_rule(&body.config)?;
    let holiday = state
        .db
        .add_holiday(auth_user.company_id, &body.description, &body.config)
        .await?;
    tracing::info!(holiday_id = holiday.id, description = %holiday.description, "Holiday added");
    Ok((StatusCode::CREATED, Json(holiday)))
}

async fn update_holiday(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<HolidayRequest>,
) -> Result<Json<Holiday>> {
    auth_user.require_any(MANAGERS)?;
    check_rule(&body.config)?;
    let holiday = Holiday::new(id, auth_user.company_id, body.description, body.config)?;
    if !state.db.update_holiday(&holiday).await? {
        return Err(AppError::NotFound(format!("Holiday {id} not found")));
    }
    Ok(Json(holiday))
}

async fn delete_holiday(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    auth_user.require_any(MANAGERS)?;
    if state.db.delete_holidays(auth_user.company_id, &[id]).await? == 0 {
        return Err(AppError::NotFound(format!("Holiday {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
