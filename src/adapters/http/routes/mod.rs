pub mod members;
pub mod payments;
pub mod plans;
pub mod subscriptions;

use axum::{Router, response::IntoResponse, routing::get};

use crate::adapters::http::{app_state::AppState, response};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/plans", plans::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/payments", payments::router())
        .nest("/members", members::router())
}

async fn health() -> impl IntoResponse {
    response::ok("Service is healthy", serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::{TestServer, multipart::MultipartForm};
    use uuid::Uuid;

    use crate::{
        adapters::http::auth::ACCESS_TOKEN_COOKIE,
        domain::entities::{payment_status::PaymentStatus, subscription_status::SubscriptionStatus},
        test_utils::{
            FixedClock, TestAppStateBuilder, create_test_member, create_test_payment,
            create_test_plan, create_test_subscription, date, staff_actor,
        },
    };

    #[tokio::test]
    async fn stale_payment_cannot_open_a_second_membership() {
        let plan = create_test_plan(|_| {});
        let member = create_test_member(|_| {});
        let stale = create_test_subscription(member.id, &plan, |s| {
            s.start_date = date(2024, 1, 1);
            s.end_date = date(2024, 2, 1);
        });
        let stale_payment = create_test_payment(&stale, |_| {});
        let builder = TestAppStateBuilder::new()
            .with_clock(FixedClock::at(2024, 3, 1))
            .with_plan(plan.clone())
            .with_member(member.clone())
            .with_subscription(stale.clone())
            .with_payment(stale_payment.clone());
        let token = builder.token_for(&staff_actor());
        let (app_state, ledger) = builder.build_with_ledger();
        let server = TestServer::new(router().with_state(app_state)).unwrap();

        // The stale pending row ended before today, so it no longer blocks.
        let form = MultipartForm::new()
            .add_text("plan_id", plan.id.to_string())
            .add_text("user_id", member.id.to_string());
        let created = server
            .post("/subscriptions")
            .add_cookie(Cookie::new(ACCESS_TOKEN_COOKIE, token.clone()))
            .multipart(form)
            .await;
        created.assert_status(StatusCode::CREATED);
        let fresh_id = created.json::<serde_json::Value>()["data"]["subscription"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        server
            .post(&format!("/subscriptions/{}/activate", fresh_id))
            .add_cookie(Cookie::new(ACCESS_TOKEN_COOKIE, token.clone()))
            .await
            .assert_status(StatusCode::OK);

        let verify = server
            .post(&format!("/payments/{}/verify", stale_payment.id))
            .add_cookie(Cookie::new(ACCESS_TOKEN_COOKIE, token))
            .await;
        verify.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            verify.json::<serde_json::Value>()["code"],
            "DUPLICATE_ACTIVE_SUBSCRIPTION"
        );

        let today = date(2024, 3, 1);
        let open: Vec<Uuid> = ledger
            .subscriptions_for(member.id)
            .into_iter()
            .filter(|s| s.status.holds_membership(s.end_date, today))
            .map(|s| s.id)
            .collect();
        assert_eq!(open, vec![Uuid::parse_str(&fresh_id).unwrap()]);
        assert_eq!(
            ledger.subscription(stale.id).unwrap().status,
            SubscriptionStatus::Pending
        );
        assert_eq!(
            ledger.payment(stale_payment.id).unwrap().status,
            PaymentStatus::Pending
        );
    }
}
