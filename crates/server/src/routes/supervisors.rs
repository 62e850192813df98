use axum::{extract::State, routing::get, Json, Router};

use crate::{
    db::UserStore, error::Result, middleware::auth::AuthUser, models::Supervisor, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/supervisors", get(list_supervisors))
}

async fn list_supervisors(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<Supervisor>>> {
    let supervisors = state.db.supervisors(auth_user.company_id, auth_user.id).await?;
    Ok(Json(supervisors))
}
