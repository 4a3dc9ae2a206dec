use axum::{
    Router,
    extract::{Path, State},
    response::Response,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::current_actor, response},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{member_id}/renew", post(renew))
}

async fn renew(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(member_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let hint = app_state
        .subscription_use_cases
        .renew(&actor, member_id)
        .await?;
    Ok(response::ok(
        "Member can renew. Create a new subscription to continue.",
        hint,
    ))
}
