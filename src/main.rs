#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod bmi;
mod config;
mod db;
mod env;
mod error;
mod models;
mod records;
mod routes;
mod telemetry;
#[cfg(test)]
mod test;

use std::sync::Arc;
use std::time::Duration;

use api::{api_check_bmi, api_records, api_save_bmi, health};
use auth::{
    MemorySessionStore, SessionStore, Sessions, SqliteSessionStore, bad_request_api,
    internal_error_api, not_found_api, unauthorized_api, unprocessable_api,
};
use config::{AppConfig, SessionBackend};
use error::AppError;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{dashboard, index, login, logout, process_login, process_register, register};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let loaded_env = env::load_environment();
    let _telemetry_guard = init_tracing();

    match loaded_env {
        Ok(files) => info!(files = ?files, "Loaded environment files"),
        Err(e) => warn!("Failed to load environment files: {}", e),
    }

    let config = AppConfig::from_env()?;
    let pool = connect(&config.database_url).await?;

    info!("Running database migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        error!("Failed to run migrations: {}", e);
        return Err(AppError::from(e).into());
    }
    info!("Migrations completed successfully");

    let sessions = build_sessions(&config, &pool);
    spawn_session_sweeper(
        sessions.clone(),
        Duration::from_secs(config.session_sweep_interval_secs),
    );

    let _rocket = init_rocket(pool, sessions, config).launch().await?;

    Ok(())
}

async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options: SqliteConnectOptions = database_url.parse()?;
    let options = options.create_if_missing(true).foreign_keys(true);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

pub fn build_sessions(config: &AppConfig, pool: &SqlitePool) -> Sessions {
    let store: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Sqlite => Arc::new(SqliteSessionStore::new(pool.clone())),
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
    };

    info!(backend = ?config.session_backend, "Session store configured");
    Sessions::new(store, config.session_policy())
}

fn spawn_session_sweeper(sessions: Sessions, interval: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match sessions.sweep().await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(interval).await;
        }
    });
}

pub fn init_rocket(pool: SqlitePool, sessions: Sessions, config: AppConfig) -> Rocket<Build> {
    info!("Starting BMI tracker");

    rocket::build()
        .manage(pool)
        .manage(sessions)
        .manage(config)
        .mount(
            "/",
            routes![
                index,
                register,
                process_register,
                login,
                process_login,
                logout,
                dashboard,
            ],
        )
        .mount(
            "/api",
            routes![api_check_bmi, api_save_bmi, api_records, health],
        )
        .register(
            "/api",
            catchers![
                unauthorized_api,
                bad_request_api,
                unprocessable_api,
                not_found_api,
                internal_error_api,
            ],
        )
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
