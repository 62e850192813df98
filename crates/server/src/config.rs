use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    /// Browser client assets, served for every non-API path.
    pub static_dir: String,
    /// With a password set, startup creates this administrator and their
    /// company when the login does not exist yet.
    pub admin_login: String,
    pub admin_password: Option<String>,
    pub admin_email: String,
    pub company_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/arctime.db?mode=rwc".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            admin_login: env::var("ADMIN_LOGIN").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@localhost".to_string()),
            company_name: env::var("COMPANY_NAME").unwrap_or_else(|_| "ArcTime".to_string()),
        }
    }
}
