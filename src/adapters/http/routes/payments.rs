use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::current_actor, response},
    app_error::AppResult,
    domain::entities::payment_status::PaymentStatus,
    use_cases::payment::PaymentFilter,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_payments))
        .route("/{payment_id}/verify", post(verify_payment))
        .route("/{payment_id}/reject", post(reject_payment))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListPaymentsQuery {
    status: Option<PaymentStatus>,
    subscription_id: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RejectPayload {
    reason: String,
}

async fn list_payments(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ListPaymentsQuery>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let payments = app_state
        .payment_use_cases
        .list_payments(
            &actor,
            PaymentFilter {
                status: query.status,
                subscription_id: query.subscription_id,
            },
        )
        .await?;
    Ok(response::ok("Payments retrieved", payments))
}

async fn verify_payment(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let pair = app_state
        .verification_use_cases
        .verify_payment(&actor, payment_id)
        .await?;
    Ok(response::ok(
        "Payment verified and subscription activated",
        pair,
    ))
}

async fn reject_payment(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let pair = app_state
        .verification_use_cases
        .reject_payment(&actor, payment_id, &payload.reason)
        .await?;
    Ok(response::ok("Payment rejected", pair))
}
