use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bmi::BmiCategory;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BmiRecord {
    pub id: i64,
    pub user_id: i64,
    pub weight: f64,
    pub height_cm: f64,
    pub bmi: f64,
    pub category: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbBmiRecord {
    pub id: i64,
    pub user_id: i64,
    pub weight: f64,
    pub height_cm: f64,
    pub bmi: f64,
    pub category: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<DbBmiRecord> for BmiRecord {
    fn from(record: DbBmiRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            weight: record.weight,
            height_cm: record.height_cm,
            bmi: record.bmi,
            category: record.category,
            note: record.note,
            recorded_at: record.recorded_at,
        }
    }
}

/// A validated measurement ready to be written; `bmi` and `category` are
/// always the server's own computation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBmiRecord {
    pub weight: f64,
    pub height_cm: f64,
    pub bmi: f64,
    pub category: BmiCategory,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub user_id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            user_id: session.user_id,
            token: session.token,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

impl UserSession {
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}
