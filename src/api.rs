use rocket::State;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::bmi::{Numeric, compute_bmi, require_number};
use crate::auth::MaybeUser;
use crate::config::AppConfig;
use crate::db::DbConn;
use crate::error::AppError;
use crate::models::{BmiRecord, User};
use crate::records::{self, BmiPayload};

#[derive(Debug, Default, Deserialize)]
pub struct CheckBmiRequest {
    pub weight: Option<Numeric>,
    pub height_cm: Option<Numeric>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckBmiResponse {
    pub ok: bool,
    pub bmi: f64,
    pub category: String,
    pub advice: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveBmiResponse {
    pub ok: bool,
    pub record: BmiRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub ok: bool,
    pub records: Vec<BmiRecord>,
}

fn invalid_payload(err: json::Error<'_>) -> AppError {
    warn!(error = %err, "Rejected malformed JSON body");
    AppError::Validation("Invalid payload".to_string())
}

#[post("/check_bmi", data = "<body>")]
pub fn api_check_bmi(
    body: Result<Json<CheckBmiRequest>, json::Error<'_>>,
) -> Result<Json<CheckBmiResponse>, AppError> {
    let request = body.map_err(invalid_payload)?;

    let weight = require_number(request.weight.as_ref(), "weight")?;
    let height_cm = require_number(request.height_cm.as_ref(), "height_cm")?;
    let result = compute_bmi(weight, height_cm)?;

    Ok(Json(CheckBmiResponse {
        ok: true,
        bmi: result.bmi,
        category: result.category.to_string(),
        advice: result.category.advice().to_string(),
    }))
}

#[post("/save_bmi", data = "<body>")]
pub async fn api_save_bmi(
    user: MaybeUser,
    mut conn: DbConn,
    body: Result<Json<BmiPayload>, json::Error<'_>>,
) -> Result<Json<SaveBmiResponse>, AppError> {
    let user = user.0;

    // An anonymous caller gets 401 even when the body is also malformed.
    let payload = match (&user, body) {
        (None, _) => BmiPayload::default(),
        (Some(_), body) => body.map_err(invalid_payload)?.into_inner(),
    };

    let record = records::save_record(&mut conn, user.as_ref(), &payload).await?;

    Ok(Json(SaveBmiResponse { ok: true, record }))
}

#[get("/records?<limit>")]
pub async fn api_records(
    user: User,
    mut conn: DbConn,
    settings: &State<AppConfig>,
    limit: Option<i64>,
) -> Result<Json<RecordsResponse>, AppError> {
    let limit = limit
        .unwrap_or(settings.history_limit)
        .clamp(0, settings.history_limit);

    let records = records::list_records(&mut conn, &user, limit).await?;

    Ok(Json(RecordsResponse { ok: true, records }))
}

#[get("/health")]
pub fn health() -> Json<Value> {
    Json(json!({ "ok": true, "status": "OK" }))
}
