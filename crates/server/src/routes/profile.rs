use axum::{extract::State, routing::put, Json, Router};

use super::auth::{check_password, hash_password};
use crate::{
    db::{stores::ProfileUpdate, UserStore},
    error::Result,
    middleware::auth::AuthUser,
    models::{user::UpdateProfile, User},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", put(update_profile))
}

async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<UpdateProfile>,
) -> Result<Json<User>> {
    let hashed_pass = match body.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            check_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let user = state
        .db
        .update_profile(
            auth_user.id,
            &ProfileUpdate {
                login: &body.login,
                email: &body.email,
                first_name: &body.first_name,
                last_name: &body.last_name,
                hashed_pass: hashed_pass.as_deref(),
            },
        )
        .await?;

    tracing::info!(
        user_id = user.id,
        password_changed = hashed_pass.is_some(),
        "Profile updated"
    );
    Ok(Json(user))
}
