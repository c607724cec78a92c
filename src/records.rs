use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::bmi::{BmiCategory, Numeric, compute_bmi, require_number};
use crate::db::{insert_bmi_record, list_bmi_records};
use crate::error::AppError;
use crate::models::{BmiRecord, NewBmiRecord, User};

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Body of a save request. `bmi` must be present, but like `category` it is
/// only what the client thinks the value is; `weight` and `height_cm` decide
/// what gets stored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct BmiPayload {
    pub weight: Option<Numeric>,
    pub height_cm: Option<Numeric>,
    pub bmi: Option<Numeric>,
    pub category: Option<String>,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

impl BmiPayload {
    fn to_new_record(&self) -> Result<NewBmiRecord, AppError> {
        self.validate()?;

        let weight = require_number(self.weight.as_ref(), "weight")?;
        let height_cm = require_number(self.height_cm.as_ref(), "height_cm")?;
        let client_bmi = require_number(self.bmi.as_ref(), "bmi")?;

        let computed = compute_bmi(weight, height_cm)?;

        let client_category = self.category.as_deref().map(str::parse::<BmiCategory>);
        let category_matches = match client_category {
            Some(Ok(category)) => category == computed.category,
            Some(Err(_)) => false,
            None => true,
        };
        if client_bmi != computed.bmi || !category_matches {
            debug!(
                client_bmi,
                client_category = ?self.category,
                bmi = computed.bmi,
                category = %computed.category,
                "Client values differ from server computation, storing server values"
            );
        }

        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(String::from);

        Ok(NewBmiRecord {
            weight,
            height_cm,
            bmi: computed.bmi,
            category: computed.category,
            note,
        })
    }
}

/// Persists a measurement for `user`, stamped with the current time.
#[instrument(skip(conn, payload), fields(user_id = user.map(|u| u.id)))]
pub async fn save_record(
    conn: &mut SqliteConnection,
    user: Option<&User>,
    payload: &BmiPayload,
) -> Result<BmiRecord, AppError> {
    let Some(user) = user else {
        return Err(AppError::Authentication("Not authenticated".to_string()));
    };

    let record = payload.to_new_record()?;
    let saved = insert_bmi_record(conn, user.id, &record, Utc::now()).await?;

    info!(record_id = saved.id, "BMI record saved");
    Ok(saved)
}

/// The user's newest records first, at most `limit` of them.
#[instrument(skip(conn, user), fields(user_id = user.id))]
pub async fn list_records(
    conn: &mut SqliteConnection,
    user: &User,
    limit: i64,
) -> Result<Vec<BmiRecord>, AppError> {
    list_bmi_records(conn, user.id, limit.max(0)).await
}

#[derive(Debug, Serialize)]
pub struct LatestReading {
    pub bmi: f64,
    pub category: String,
    pub advice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub user: User,
    pub history: Vec<BmiRecord>,
    pub latest: Option<LatestReading>,
}

pub async fn dashboard(
    conn: &mut SqliteConnection,
    user: User,
    limit: i64,
) -> Result<DashboardView, AppError> {
    let history = list_records(conn, &user, limit).await?;
    let latest = history.first().map(|record| LatestReading {
        bmi: record.bmi,
        category: record.category.clone(),
        advice: record
            .category
            .parse::<BmiCategory>()
            .ok()
            .map(|category| category.advice()),
    });

    Ok(DashboardView {
        user,
        history,
        latest,
    })
}
