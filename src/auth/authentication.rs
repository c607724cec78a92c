use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::auth::accounts::current_user;
use crate::auth::session::{SESSION_COOKIE, Sessions};
use crate::models::User;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

/// The signed-in user if there is one. Unlike `Option<User>`, a failing
/// session store is an error here rather than an anonymous visitor.
pub struct MaybeUser(pub Option<User>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let outcome = authenticate(request)
            .instrument(tracing::info_span!("maybe_user_guard"))
            .await;

        match outcome {
            Outcome::Success(user) => Outcome::Success(MaybeUser(Some(user))),
            Outcome::Error((status, ())) if status != Status::Unauthorized => {
                Outcome::Error((status, ()))
            }
            _ => Outcome::Success(MaybeUser(None)),
        }
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let token = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    let Some(token) = token else {
        return Outcome::Error((Status::Unauthorized, ()));
    };

    let (pool, sessions) = match (
        request.rocket().state::<SqlitePool>(),
        request.rocket().state::<Sessions>(),
    ) {
        (Some(pool), Some(sessions)) => (pool, sessions),
        _ => {
            tracing::error!("Database pool or session store not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(error = %err, "Failed to acquire database connection");
            return Outcome::Error((Status::ServiceUnavailable, ()));
        }
    };

    match current_user(&mut conn, sessions, Some(&token)).await {
        Ok(Some(user)) => {
            tracing::info!(username = %user.username, "User authenticated via session token");
            Outcome::Success(user)
        }
        Ok(None) => {
            tracing::warn!("Invalid or expired session token");
            Outcome::Forward(Status::Unauthorized)
        }
        Err(err) => {
            err.log_and_record("user_auth_guard");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

fn api_error(status: Status, message: &str) -> Custom<Json<Value>> {
    Custom(status, Json(json!({ "ok": false, "error": message })))
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    api_error(Status::Unauthorized, "Not authenticated")
}

#[catch(400)]
pub fn bad_request_api(_req: &Request) -> Custom<Json<Value>> {
    api_error(Status::BadRequest, "Invalid payload")
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<Value>> {
    api_error(Status::BadRequest, "Invalid payload")
}

#[catch(404)]
pub fn not_found_api(_req: &Request) -> Custom<Json<Value>> {
    api_error(Status::NotFound, "Not found")
}

#[catch(500)]
pub fn internal_error_api(_req: &Request) -> Custom<Json<Value>> {
    api_error(Status::InternalServerError, "Internal server error")
}
