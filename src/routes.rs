use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket_dyn_templates::{Template, context};
use tracing::info;

use crate::auth::{self, MaybeUser, SESSION_COOKIE, Sessions};
use crate::config::AppConfig;
use crate::db::DbConn;
use crate::error::AppError;
use crate::records;

#[derive(FromForm)]
pub struct CredentialsForm {
    #[field(default = String::new())]
    username: String,
    #[field(default = String::new())]
    password: String,
}

fn flash_context(flash: Option<FlashMessage<'_>>) -> Option<(String, String)> {
    flash.map(|f| (f.kind().to_string(), f.message().to_string()))
}

#[get("/")]
pub fn index(user: MaybeUser, flash: Option<FlashMessage<'_>>) -> Template {
    let user = user.0;

    Template::render(
        "index",
        context! {
            title: "BMI Tracker",
            logged_in: user.is_some(),
            user: user,
            flash: flash_context(flash),
        },
    )
}

#[get("/register")]
pub fn register(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "register",
        context! {
            title: "Register - BMI Tracker",
            flash: flash_context(flash),
        },
    )
}

#[post("/register", data = "<form>")]
pub async fn process_register(
    mut conn: DbConn,
    settings: &State<AppConfig>,
    form: Form<CredentialsForm>,
) -> Result<Flash<Redirect>, Flash<Redirect>> {
    match auth::register(&mut conn, &form.username, &form.password, settings.bcrypt_cost).await {
        Ok(_) => Ok(Flash::success(
            Redirect::to(uri!(login)),
            "Account created. Please log in.",
        )),
        Err(err) => {
            err.log_and_record("register");
            let message = match err {
                AppError::Validation(_)
                    if form.username.trim().is_empty() || form.password.is_empty() =>
                {
                    "Please provide username and password".to_string()
                }
                AppError::Conflict(_) => "Username already taken.".to_string(),
                other => other.user_message(),
            };
            Err(Flash::error(Redirect::to(uri!(register)), message))
        }
    }
}

#[get("/login")]
pub fn login(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render(
        "login",
        context! {
            title: "Login - BMI Tracker",
            flash: flash_context(flash),
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    mut conn: DbConn,
    sessions: &State<Sessions>,
    form: Form<CredentialsForm>,
    cookies: &CookieJar<'_>,
) -> Result<Flash<Redirect>, Flash<Redirect>> {
    match auth::login(&mut conn, sessions, &form.username, &form.password).await {
        Ok((user, session)) => {
            let max_age = rocket::time::Duration::seconds(
                sessions.policy().ttl.num_seconds(),
            );
            cookies.add_private(
                Cookie::build((SESSION_COOKIE, session.token))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(max_age),
            );
            info!(username = %user.username, "Login successful");

            Ok(Flash::success(
                Redirect::to(uri!(dashboard)),
                "Logged in successfully.",
            ))
        }
        Err(err) => {
            err.log_and_record("login");
            let message = match err {
                AppError::Authentication(_) => "Invalid credentials.".to_string(),
                other => other.user_message(),
            };
            Err(Flash::error(Redirect::to(uri!(login)), message))
        }
    }
}

#[get("/logout")]
pub async fn logout(sessions: &State<Sessions>, cookies: &CookieJar<'_>) -> Flash<Redirect> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    auth::logout(sessions, token.as_deref()).await;
    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Flash::new(Redirect::to(uri!(index)), "info", "Logged out.")
}

#[derive(Responder)]
pub enum DashboardResponse {
    Page(Template),
    Login(Redirect),
    Failed(Flash<Redirect>),
}

#[get("/dashboard")]
pub async fn dashboard(
    user: MaybeUser,
    mut conn: DbConn,
    settings: &State<AppConfig>,
    flash: Option<FlashMessage<'_>>,
) -> DashboardResponse {
    let Some(user) = user.0 else {
        return DashboardResponse::Login(Redirect::to(uri!(login)));
    };

    match records::dashboard(&mut conn, user, settings.history_limit).await {
        Ok(view) => DashboardResponse::Page(Template::render(
            "dashboard",
            context! {
                title: "Dashboard - BMI Tracker",
                logged_in: true,
                user: view.user,
                history: view.history,
                latest: view.latest,
                flash: flash_context(flash),
            },
        )),
        Err(err) => {
            err.log_and_record("dashboard");
            DashboardResponse::Failed(Flash::error(
                Redirect::to(uri!(index)),
                "Could not load your dashboard. Please try again.",
            ))
        }
    }
}
