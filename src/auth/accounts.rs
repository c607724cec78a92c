use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::Sessions;
use crate::db::{create_user, find_user_by_username, get_user};
use crate::error::AppError;
use crate::models::{User, UserSession};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(
        min = 1,
        max = 64,
        message = "Username must be between 1 and 64 characters"
    ))]
    pub username: String,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
        }
    }
}

#[instrument(skip(conn, password), fields(username = %username.trim()))]
pub async fn register(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
    cost: u32,
) -> Result<i64, AppError> {
    let credentials = Credentials::new(username, password);
    credentials.validate()?;

    if find_user_by_username(conn, &credentials.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            credentials.username
        )));
    }

    let password_hash = hash_password(&credentials.password, cost)?;
    let user_id = create_user(conn, &credentials.username, &password_hash).await?;

    info!(user_id, "User registered");
    Ok(user_id)
}

/// Verifies credentials and opens a session. Unknown usernames and wrong
/// passwords fail with the same message.
#[instrument(skip(conn, sessions, password), fields(username = %username.trim()))]
pub async fn login(
    conn: &mut SqliteConnection,
    sessions: &Sessions,
    username: &str,
    password: &str,
) -> Result<(User, UserSession), AppError> {
    let credentials = Credentials::new(username, password);

    let user = match find_user_by_username(conn, &credentials.username).await? {
        Some(user) if verify_password(&credentials.password, &user.password_hash) => user,
        _ => {
            warn!("Login rejected");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }
    };

    let session = sessions.start(user.id).await?;
    info!(user_id = user.id, "Authentication successful");

    Ok((User::from(user), session))
}

/// Drops the session binding. Store failures are logged, never surfaced.
#[instrument(skip_all)]
pub async fn logout(sessions: &Sessions, token: Option<&str>) {
    if let Some(token) = token {
        if let Err(err) = sessions.end(token).await {
            err.log_and_record("logout");
        }
    }
}

#[instrument(skip_all)]
pub async fn current_user(
    conn: &mut SqliteConnection,
    sessions: &Sessions,
    token: Option<&str>,
) -> Result<Option<User>, AppError> {
    let Some(token) = token else {
        return Ok(None);
    };

    let Some(user_id) = sessions.resolve(token).await? else {
        return Ok(None);
    };

    match get_user(conn, user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(AppError::NotFound(_)) => {
            warn!(user_id, "Session bound to a missing user");
            sessions.end(token).await?;
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
