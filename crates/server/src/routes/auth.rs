use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{
    db::UserStore,
    error::{AppError, Result},
    models::{Role, User},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub company_id: i64,
    pub login: String,
    pub roles: Vec<Role>,
    pub exp: usize,
}

const MIN_PASSWORD_LEN: usize = 8;

pub fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(user: &User, secret: &str) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::days(7))
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id,
        company_id: user.company_id,
        login: user.login.clone(),
        roles: user.roles.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    tracing::debug!(login = %body.login, "Login attempt");

    let (user, hashed_pass) = state
        .db
        .credentials(body.login.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &hashed_pass)? {
        tracing::warn!(login = %user.login, "Invalid password");
        return Err(AppError::Unauthorized);
    }

    let token = create_token(&user, &state.config.jwt_secret)?;

    Ok(Json(AuthResponse { token, user }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{state, Fixture, PASSWORD};
    use crate::build_router;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_check_password() {
        assert!(check_password("hunter22").is_ok());
        assert!(matches!(check_password("hunter2"), Err(AppError::Validation(_))));
    }

    async fn post_login(fx: &Fixture, login: &str, password: &str) -> (StatusCode, serde_json::Value) {
        let app = build_router(state(fx));
        let body = serde_json::json!({ "login": login, "password": password }).to_string();
        let response = app
            .oneshot(
                Request::post("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let fx = Fixture::new().await;
        let (status, json) = post_login(&fx, "jdoe", PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!json["token"].as_str().unwrap().is_empty());
        assert_eq!(json["user"]["login"], "jdoe");
        assert_eq!(json["user"]["roles"][0], "USER");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let fx = Fixture::new().await;
        let (status, _) = post_login(&fx, "jdoe", "wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = post_login(&fx, "nobody", PASSWORD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
