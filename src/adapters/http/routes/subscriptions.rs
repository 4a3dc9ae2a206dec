use axum::{
    Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    response::Response,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::current_actor, response},
    app_error::{AppError, AppResult},
    application::ports::proof_storage::ProofUpload,
    domain::entities::{payment_method::PaymentMethod, subscription_status::SubscriptionStatus},
    use_cases::{
        payment::PaymentSubmission,
        subscription::{CreateSubscriptionInput, SubscriptionFilter},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route(
            "/{subscription_id}",
            get(get_subscription).delete(delete_subscription),
        )
        .route("/{subscription_id}/payments", post(submit_payment))
        .route("/{subscription_id}/payments/latest", get(get_latest_payment))
        .route("/{subscription_id}/activate", post(activate_subscription))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListSubscriptionsQuery {
    user_id: Option<Uuid>,
    status: Option<SubscriptionStatus>,
}

/// Fields accepted by the multipart subscription and payment forms.
#[derive(Debug, Default)]
struct PaymentForm {
    plan_id: Option<Uuid>,
    user_id: Option<Uuid>,
    payment_method: Option<PaymentMethod>,
    reference_number: Option<String>,
    proof: Option<ProofUpload>,
}

impl PaymentForm {
    async fn read(mut multipart: Multipart, allow_subscription_fields: bool) -> AppResult<Self> {
        let mut form = PaymentForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "payment_proof" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    // Browsers send an empty part when no file was picked.
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        form.proof = Some(ProofUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                "payment_method" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    if !text.trim().is_empty() {
                        form.payment_method =
                            Some(text.parse().map_err(AppError::InvalidInput)?);
                    }
                }
                "reference_number" => {
                    form.reference_number = Some(field.text().await.map_err(multipart_error)?);
                }
                "plan_id" if allow_subscription_fields => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.plan_id = Some(parse_uuid("plan_id", &text)?);
                }
                "user_id" if allow_subscription_fields => {
                    let text = field.text().await.map_err(multipart_error)?;
                    if !text.trim().is_empty() {
                        form.user_id = Some(parse_uuid("user_id", &text)?);
                    }
                }
                other => {
                    return Err(AppError::InvalidInput(format!("Unknown field: {}", other)));
                }
            }
        }
        Ok(form)
    }

    /// A form without a payment method carries no payment at all.
    fn into_submission(self) -> AppResult<Option<PaymentSubmission>> {
        match self.payment_method {
            Some(method) => Ok(Some(PaymentSubmission {
                method,
                reference_number: self.reference_number,
                proof: self.proof,
            })),
            None if self.proof.is_some() || self.reference_number.is_some() => Err(
                AppError::InvalidInput("payment_method is required with payment details".into()),
            ),
            None => Ok(None),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::InvalidInput(format!("Malformed form data: {}", e.body_text()))
}

fn parse_uuid(field: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} must be a valid id", field)))
}

async fn create_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let form = PaymentForm::read(multipart, true).await?;
    let plan_id = form
        .plan_id
        .ok_or_else(|| AppError::InvalidInput("plan_id is required".into()))?;
    let user_id = form.user_id;

    let created = app_state
        .subscription_use_cases
        .create_subscription(
            &actor,
            CreateSubscriptionInput {
                user_id,
                plan_id,
                payment: form.into_submission()?,
            },
        )
        .await?;

    let message = if created.payment.is_some() {
        "Subscription created. Your payment is awaiting verification."
    } else {
        "Subscription created. Record a payment to activate it."
    };
    Ok(response::created(message, created))
}

async fn list_subscriptions(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ListSubscriptionsQuery>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let subscriptions = app_state
        .subscription_use_cases
        .list_subscriptions(
            &actor,
            SubscriptionFilter {
                user_id: query.user_id,
                status: query.status,
            },
        )
        .await?;
    Ok(response::ok("Subscriptions retrieved", subscriptions))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let subscription = app_state
        .subscription_use_cases
        .get_subscription(&actor, subscription_id)
        .await?;
    Ok(response::ok("Subscription retrieved", subscription))
}

async fn delete_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    app_state
        .subscription_use_cases
        .delete_subscription(&actor, subscription_id)
        .await?;
    Ok(response::ok("Subscription deleted", serde_json::Value::Null))
}

async fn submit_payment(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(subscription_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let submission = PaymentForm::read(multipart, false)
        .await?
        .into_submission()?
        .ok_or_else(|| AppError::InvalidInput("payment_method is required".into()))?;

    let payment = app_state
        .payment_use_cases
        .submit_payment(&actor, subscription_id, submission)
        .await?;
    Ok(response::created(
        "Payment submitted and awaiting verification",
        payment,
    ))
}

async fn get_latest_payment(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let payment = app_state
        .payment_use_cases
        .get_latest(&actor, subscription_id)
        .await?;
    Ok(response::ok("Latest payment retrieved", payment))
}

async fn activate_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Response> {
    let actor = current_actor(&jar, &app_state)?;
    let pair = app_state
        .verification_use_cases
        .record_manual_payment_and_activate(&actor, subscription_id)
        .await?;
    Ok(response::ok(
        "Payment recorded and subscription activated",
        pair,
    ))
}
