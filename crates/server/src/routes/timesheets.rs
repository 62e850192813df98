use axum::{
    extract::{Path, State},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::parse_day;
use crate::{
    error::Result,
    middleware::auth::AuthUser,
    models::Timesheet,
    services::{
        lifecycle::{self, Direction},
        reconcile::SaveSummary,
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/current", get(current))
        .route("/next/:day", get(next))
        .route("/previous/:day", get(previous))
        .route("/custom/:day", get(custom))
        .route("/:id/save", post(save))
        .route("/:id/complete", post(complete))
        .route("/:id/fix", post(fix))
}

#[derive(Debug, Deserialize)]
pub struct TimesheetForm {
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub next: Option<Timesheet>,
}

async fn current(State(state): State<AppState>, auth_user: AuthUser) -> Result<Json<Timesheet>> {
    let today = Utc::now().date_naive();
    let timesheet = lifecycle::current(&state.db, auth_user.company_id, auth_user.id, today).await?;
    Ok(Json(timesheet))
}

async fn next(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(day): Path<String>,
) -> Result<Json<Timesheet>> {
    let begin = parse_day(&day)?;
    let timesheet =
        lifecycle::adjacent(&state.db, auth_user.company_id, auth_user.id, begin, Direction::Next).await?;
    Ok(Json(timesheet))
}

async fn previous(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(day): Path<String>,
) -> Result<Json<Timesheet>> {
    let begin = parse_day(&day)?;
    let timesheet =
        lifecycle::adjacent(&state.db, auth_user.company_id, auth_user.id, begin, Direction::Previous).await?;
    Ok(Json(timesheet))
}

async fn custom(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(day): Path<String>,
) -> Result<Json<Timesheet>> {
    let day = parse_day(&day)?;
    let timesheet = lifecycle::containing(&state.db, auth_user.company_id, auth_user.id, day).await?;
    Ok(Json(timesheet))
}

async fn save(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<TimesheetForm>,
) -> Result<Json<SaveSummary>> {
    tracing::debug!(timesheet_id = id, "Timesheet save request");
    let summary = lifecycle::save(&state.db, auth_user.company_id, auth_user.id, id, &form.data).await?;
    Ok(Json(summary))
}

async fn complete(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Form(form): Form<TimesheetForm>,
) -> Result<Json<CompleteResponse>> {
    tracing::debug!(timesheet_id = id, "Timesheet complete request");
    let next = lifecycle::complete(&state.db, auth_user.company_id, auth_user.id, id, &form.data).await?;
    Ok(Json(CompleteResponse { next }))
}

async fn fix(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<()>> {
    tracing::debug!(timesheet_id = id, "Timesheet fix request");
    lifecycle::reopen(&state.db, auth_user.company_id, auth_user.id, id).await?;
    Ok(Json(()))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{get, send};
    use crate::build_router;
    use crate::db::{BillStore, TimesheetStore};
    use crate::testing::{bearer, date, state, Fixture};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    // Test payloads carry no characters that need percent-encoding.
    fn post_form(uri: &str, token: &str, data: &str) -> Request<Body> {
        let body = format!("data={data}");
        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_requires_token() {
        let fx = Fixture::new().await;
        let app = build_router(state(&fx));
        let request = Request::get("/api/user/timesheet/current").body(Body::empty()).unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_next_and_previous() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let token = bearer(&fx, fx.user_id).await;

        let (status, json) = send(build_router(state(&fx)), get("/api/user/timesheet/next/20240603", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["begin"], "2024-06-10");
        assert_eq!(json["pay_period"]["type"], "WEEKLY");

        let (status, json) =
            send(build_router(state(&fx)), get("/api/user/timesheet/previous/20240603", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["begin"], "2024-05-27");

        let (status, _) = send(build_router(state(&fx)), get("/api/user/timesheet/next/2024-06-03", &token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(build_router(state(&fx)), get("/api/user/timesheet/next/20240604", &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_and_complete() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let task = fx.add_task("Development", false).await;
        let assignment = fx.add_assignment(task.id, fx.user_id, None, None).await;
        let ts = fx.db.ensure_timesheet(fx.company_id, fx.user_id, date(2024, 6, 3)).await.unwrap();
        let token = bearer(&fx, fx.user_id).await;

        let data = format!("{}_{}:20240603:8;{}_{}:20240604:6.5", task.id, assignment.id, task.id, assignment.id);
        let uri = format!("/api/user/timesheet/{}/save", ts.id);
        let (status, json) = send(build_router(state(&fx)), post_form(&uri, &token, &data)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "added": 2, "updated": 0, "deleted": 0 }));

        let bills = fx
            .db
            .bills_for_users(&[fx.user_id], date(2024, 6, 3), date(2024, 6, 9))
            .await
            .unwrap();
        assert_eq!(bills.len(), 2);

        let uri = format!("/api/user/timesheet/{}/complete", ts.id);
        let (status, json) = send(build_router(state(&fx)), post_form(&uri, &token, &data)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["next"]["begin"], "2024-06-10");
        assert_eq!(json["next"]["completed"], false);

        let (status, json) = send(build_router(state(&fx)), get("/api/user/timesheet/current", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["begin"], "2024-06-10");
    }

    #[tokio::test]
    async fn test_save_rejects_bad_data_and_other_users() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let ts = fx.db.ensure_timesheet(fx.company_id, fx.user_id, date(2024, 6, 3)).await.unwrap();
        let uri = format!("/api/user/timesheet/{}/save", ts.id);

        let token = bearer(&fx, fx.user_id).await;
        let (status, json) = send(build_router(state(&fx)), post_form(&uri, &token, "1_:junk:8")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid timesheet data"));

        let manager = bearer(&fx, fx.manager_id).await;
        let (status, _) = send(build_router(state(&fx)), post_form(&uri, &manager, "")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_save_rejects_day_outside_pay_period() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let task = fx.add_task("Development", false).await;
        let a = fx.add_assignment(task.id, fx.user_id, None, None).await;
        let ts = fx.db.ensure_timesheet(fx.company_id, fx.user_id, date(2024, 6, 3)).await.unwrap();
        let token = bearer(&fx, fx.user_id).await;
        let uri = format!("/api/user/timesheet/{}/save", ts.id);

        let data = format!("{t}_{a}:20240603:8;{t}_{a}:20250615:5", t = task.id, a = a.id);
        let (status, json) = send(build_router(state(&fx)), post_form(&uri, &token, &data)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("outside the pay period"));

        let bills = fx
            .db
            .bills_for_users(&[fx.user_id], date(2024, 1, 1), date(2025, 12, 31))
            .await
            .unwrap();
        assert!(bills.is_empty());
    }

    #[tokio::test]
    async fn test_fix_reopens() {
        let fx = Fixture::new().await;
        fx.with_weekly_pay_period().await;
        let ts = fx.db.ensure_timesheet(fx.company_id, fx.user_id, date(2024, 6, 3)).await.unwrap();
        let token = bearer(&fx, fx.user_id).await;

        let uri = format!("/api/user/timesheet/{}/complete", ts.id);
        send(build_router(state(&fx)), post_form(&uri, &token, "")).await;

        let uri = format!("/api/user/timesheet/{}/fix", ts.id);
        let request = Request::post(uri.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(build_router(state(&fx)), request).await;
        assert_eq!(status, StatusCode::OK);

        let ts = fx.db.timesheet(fx.company_id, ts.id).await.unwrap().unwrap();
        assert!(!ts.completed);
    }
}
