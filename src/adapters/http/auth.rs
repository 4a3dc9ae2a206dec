use axum_extra::extract::cookie::CookieJar;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
    domain::entities::role::Actor,
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Resolves the caller from the `access_token` cookie.
pub fn current_actor(jar: &CookieJar, app_state: &AppState) -> AppResult<Actor> {
    let Some(access_cookie) = jar.get(ACCESS_TOKEN_COOKIE) else {
        return Err(AppError::InvalidCredentials);
    };
    jwt::verify(access_cookie.value(), &app_state.config.jwt_secret)?.actor()
}
