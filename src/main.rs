//!
//! car_doctor server binary
//! ------------------------
//! Loads `.env`, initializes logging and configuration, then runs the HTTP API.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "car_doctor\n\nUSAGE:\n  car_doctor\n\nENVIRONMENT:\n  PORT                 HTTP port (default 5000)\n  STORE_BACKEND        mongo | memory (default mongo)\n  DB_USER, DB_PASS     MongoDB Atlas credentials\n  DB_CLUSTER           Atlas cluster host\n  MONGODB_URI          full connection string (overrides DB_USER/DB_PASS)\n  DB_NAME              database name (default carDoctor)\n  STORE_SEED           JSON seed file for the memory backend\n  ACCESS_TOKEN_SECRET  session token signing secret (required)\n  COOKIE_SECURE        mark the session cookie Secure (default false)\n  COOKIE_SAMESITE      Strict | Lax | None (default Lax)\n  CART_OWNER_CHECK     session email must match /cart/{email} (default true)\n  CORS_ORIGINS         comma-separated allowed origins\n  RUST_LOG             log filter (default info)\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // .env is optional; real environment variables take precedence
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = car_doctor::Settings::from_env().context("While loading configuration")?;
    info!(
        port = settings.port,
        backend = ?settings.backend,
        db_name = %settings.db_name,
        cookie_secure = settings.cookie.secure,
        cart_owner_check = settings.cart_owner_check,
        "car_doctor starting"
    );
    if !settings.cookie.secure {
        tracing::warn!("session cookie is not marked Secure; use COOKIE_SECURE=true behind https");
    }

    car_doctor::run(settings).await
}
