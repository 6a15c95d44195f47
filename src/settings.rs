//! Runtime configuration read from the process environment (after `.env` is loaded).
//!
//! Every variable has a default except `ACCESS_TOKEN_SECRET`; the MongoDB
//! credentials are only required when the mongo backend is selected.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::security::{CookiePolicy, SameSite};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DB_NAME: &str = "carDoctor";
pub const DEFAULT_CLUSTER: &str = "cluster0.xeklkbf.mongodb.net";
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:5174"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend { Mongo, Memory }

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub db_name: String,
    /// JSON seed for the memory backend
    pub seed_path: Option<PathBuf>,
    pub token_secret: String,
    pub cookie: CookiePolicy,
    /// Require the session's `email` claim to match the cart owner in `GET /cart/{email}`.
    pub cart_owner_check: bool,
    pub cors_origins: Vec<String>,
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bool_var<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: bool) -> AppResult<bool> {
    match lookup(name) {
        None => Ok(default),
        Some(v) => parse_bool(&v).ok_or_else(|| AppError::config("invalid_env", format!("{} must be a boolean, got '{}'", name, v).as_str())),
    }
}

/// Build the Atlas connection string from user/password, percent-encoding both.
pub fn atlas_uri(user: &str, pass: &str, cluster: &str) -> String {
    format!(
        "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
        urlencoding::encode(user), urlencoding::encode(pass), cluster
    )
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Read settings through an arbitrary variable lookup (tests pass a map here).
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> AppResult<Self> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(p) => p.trim().parse::<u16>().map_err(|_| AppError::config("invalid_env", format!("PORT must be a port number, got '{}'", p).as_str()))?,
        };
        let backend = match lookup("STORE_BACKEND").map(|s| s.trim().to_lowercase()) {
            None => StoreBackend::Mongo,
            Some(s) if s == "mongo" || s == "mongodb" => StoreBackend::Mongo,
            Some(s) if s == "memory" => StoreBackend::Memory,
            Some(other) => return Err(AppError::config("invalid_env", format!("STORE_BACKEND must be 'mongo' or 'memory', got '{}'", other).as_str())),
        };
        let mongo_uri = match lookup("MONGODB_URI") {
            Some(uri) => Some(uri),
            None => match (lookup("DB_USER"), lookup("DB_PASS")) {
                (Some(user), Some(pass)) => {
                    let cluster = lookup("DB_CLUSTER").unwrap_or_else(|| DEFAULT_CLUSTER.to_string());
                    Some(atlas_uri(&user, &pass, &cluster))
                }
                _ => None,
            },
        };
        if backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(AppError::config("missing_env", "DB_USER and DB_PASS (or MONGODB_URI) are required for the mongo backend"));
        }
        let token_secret = lookup("ACCESS_TOKEN_SECRET")
            .ok_or_else(|| AppError::config("missing_env", "ACCESS_TOKEN_SECRET is required"))?;
        let same_site = match lookup("COOKIE_SAMESITE") {
            None => SameSite::Lax,
            Some(s) => SameSite::parse(&s).ok_or_else(|| AppError::config("invalid_env", format!("COOKIE_SAMESITE must be Strict, Lax or None, got '{}'", s).as_str()))?,
        };
        let cookie = CookiePolicy { secure: bool_var(&lookup, "COOKIE_SECURE", false)?, same_site };
        let cors_origins = match lookup("CORS_ORIGINS") {
            None => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            Some(list) => list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        };
        Ok(Self {
            port,
            backend,
            mongo_uri,
            db_name: lookup("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            seed_path: lookup("STORE_SEED").map(PathBuf::from),
            token_secret,
            cookie,
            cart_owner_check: bool_var(&lookup, "CART_OWNER_CHECK", true)?,
            cors_origins,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], self.port)) }
}
