use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use sqlx::pool::PoolConnection;
use sqlx::{Pool, Sqlite, SqliteConnection, SqlitePool};
use tracing::{error, info, instrument};

use crate::error::AppError;
use crate::models::{BmiRecord, DbBmiRecord, DbUser, DbUserSession, NewBmiRecord, User, UserSession};

/// A pooled connection scoped to one request. It goes back to the pool when
/// the guard is dropped, however the handler exits.
pub struct DbConn(pub PoolConnection<Sqlite>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConn {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match pool.acquire().await {
            Ok(conn) => Outcome::Success(DbConn(conn)),
            Err(err) => {
                error!(error = %err, "Failed to acquire database connection");
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
        }
    }
}

impl Deref for DbConn {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[instrument(skip(conn))]
pub async fn get_user(conn: &mut SqliteConnection, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(conn))]
pub async fn find_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<DbUser>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

/// Inserts a user row. The UNIQUE constraint on `username` is the source of
/// truth for duplicates, so a violation is reported as a conflict.
#[instrument(skip(conn, password_hash))]
pub async fn create_user(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let res = sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(AppError::from);

    match res {
        Ok(res) => Ok(res.last_insert_rowid()),
        Err(err) if err.is_unique_violation() => Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            username
        ))),
        Err(err) => Err(err),
    }
}

#[instrument(skip(conn, record), fields(bmi = record.bmi, category = %record.category))]
pub async fn insert_bmi_record(
    conn: &mut SqliteConnection,
    user_id: i64,
    record: &NewBmiRecord,
    recorded_at: DateTime<Utc>,
) -> Result<BmiRecord, AppError> {
    info!("Inserting BMI record");

    let res = sqlx::query(
        "INSERT INTO bmi_records (user_id, weight, height_cm, bmi, category, note, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(record.weight)
    .bind(record.height_cm)
    .bind(record.bmi)
    .bind(record.category.as_str())
    .bind(record.note.as_deref())
    .bind(recorded_at)
    .execute(&mut *conn)
    .await?;

    Ok(BmiRecord {
        id: res.last_insert_rowid(),
        user_id,
        weight: record.weight,
        height_cm: record.height_cm,
        bmi: record.bmi,
        category: record.category.to_string(),
        note: record.note.clone(),
        recorded_at,
    })
}

#[instrument(skip(conn))]
pub async fn list_bmi_records(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> Result<Vec<BmiRecord>, AppError> {
    info!("Listing BMI records");
    let rows = sqlx::query_as::<_, DbBmiRecord>(
        "SELECT id, user_id, weight, height_cm, bmi, category, note, recorded_at
         FROM bmi_records
         WHERE user_id = ?
         ORDER BY recorded_at DESC, id DESC
         LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(BmiRecord::from).collect())
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query(
        "INSERT INTO user_sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(token)
    .bind(Utc::now())
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
