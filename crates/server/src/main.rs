use std::net::SocketAddr;
use std::path::Path;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arctime_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env();

    // Initialize database
    let db = db::Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    if let Some(password) = config.admin_password.as_deref() {
        ensure_admin(&db, &config, password).await?;
    }

    let state = AppState {
        db,
        config: config.clone(),
    };
    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .nest("/user/timesheet", routes::timesheets::router())
        .nest("/user", routes::supervisors::router().merge(routes::profile::router()))
        .nest("/manager", routes::manager::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .merge(protected_routes);

    // Client-side routes fall back to index.html
    let static_dir = Path::new(&state.config.static_dir);
    let spa = ServeDir::new(static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .fallback_service(spa)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Creates a company and its first administrator unless the login exists.
async fn ensure_admin(db: &db::Database, config: &config::Config, password: &str) -> anyhow::Result<()> {
    use crate::db::{stores::NewUser, UserStore};
    use crate::models::Role;

    if db.credentials(&config.admin_login).await?.is_some() {
        return Ok(());
    }

    let company_id = db.add_company(&config.company_name).await?;
    let hashed_pass = routes::auth::hash_password(password)?;
    let admin = db
        .add_user(
            company_id,
            &NewUser {
                login: &config.admin_login,
                hashed_pass: &hashed_pass,
                email: &config.admin_email,
                first_name: "ArcTime",
                last_name: "Administrator",
                roles: &[Role::Admin, Role::Manager, Role::Payroll],
            },
        )
        .await?;

    tracing::info!(company_id, user_id = admin.id, login = %admin.login, "Created administrator");
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
}
