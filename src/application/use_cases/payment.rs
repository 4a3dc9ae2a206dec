use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::Rng;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            audit_log::{self, AuditAction, AuditLog},
            clock::Clock,
            proof_storage::{ProofRef, ProofStorage, ProofUpload, discard_best_effort},
        },
        use_cases::subscription::SubscriptionRepo,
        validators::is_valid_reference_number,
    },
    domain::entities::{
        payment_method::PaymentMethod, payment_status::PaymentStatus, role::Actor,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentProfile {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub reference_number: String,
    pub payment_proof: Option<String>,
    pub proof_sha256: Option<String>,
    pub status: PaymentStatus,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A payment row about to be inserted for a known subscription.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub reference_number: String,
    pub payment_proof: Option<String>,
    pub proof_sha256: Option<String>,
    pub status: PaymentStatus,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<NaiveDateTime>,
}

/// What a member hands over when paying for a subscription.
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub proof: Option<ProofUpload>,
}

impl PaymentSubmission {
    /// Checks the submission against the payment rules without touching storage.
    pub fn validate(&self, amount_cents: i64) -> AppResult<()> {
        if !self.method.is_member_selectable() {
            return Err(AppError::InvalidInput(format!(
                "Payment method '{}' cannot be submitted",
                self.method
            )));
        }
        if amount_cents <= 0 {
            return Err(AppError::InvalidInput(
                "Payment amount must be greater than zero".into(),
            ));
        }
        if self.method.requires_proof() && self.proof.is_none() {
            return Err(AppError::InvalidInput(
                "Payment proof is required for online payments".into(),
            ));
        }
        match self.reference_number.as_deref() {
            Some(reference) if !reference.trim().is_empty() => {
                if !is_valid_reference_number(reference) {
                    return Err(AppError::InvalidInput(
                        "Reference number must be at most 100 characters".into(),
                    ));
                }
            }
            _ if self.method.requires_reference() => {
                return Err(AppError::InvalidInput(
                    "Reference number is required for GCash payments".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Reference stored with the payment. Cash references are always generated,
    /// bank references only when the member left the field blank.
    pub fn resolve_reference(&self, now: NaiveDateTime) -> String {
        let supplied = self
            .reference_number
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        match (self.method, supplied) {
            (PaymentMethod::Cash, _) | (_, None) => {
                let suffix = rand::thread_rng().gen_range(1000..=9999).to_string();
                generated_reference(self.method, now, &suffix)
            }
            (_, Some(reference)) => reference.to_string(),
        }
    }

    /// Builds the pending payment row. Call after `validate` and after the proof
    /// has been stored.
    pub fn into_new_payment(
        self,
        user_id: Uuid,
        amount_cents: i64,
        proof: Option<&ProofRef>,
        now: NaiveDateTime,
    ) -> NewPayment {
        NewPayment {
            user_id,
            amount_cents,
            payment_method: self.method,
            reference_number: self.resolve_reference(now),
            payment_proof: proof.map(|p| p.path.clone()),
            proof_sha256: proof.map(|p| p.sha256.clone()),
            status: PaymentStatus::Pending,
            verified_by: None,
            verified_at: None,
        }
    }
}

/// `<PREFIX>-<unix seconds>-<suffix>`, e.g. `CASH-1705276800-4821`.
pub fn generated_reference(method: PaymentMethod, now: NaiveDateTime, suffix: &str) -> String {
    format!(
        "{}-{}-{}",
        method.reference_prefix(),
        now.and_utc().timestamp(),
        suffix
    )
}

/// Stores the submission's proof, if any. Returns the submission with the
/// upload consumed so the bytes are not held any longer than needed.
pub(crate) async fn store_submission_proof(
    storage: &dyn ProofStorage,
    mut submission: PaymentSubmission,
) -> AppResult<(PaymentSubmission, Option<ProofRef>)> {
    let proof = match submission.proof.take() {
        Some(upload) => Some(storage.store_proof(upload).await?),
        None => None,
    };
    Ok((submission, proof))
}

/// Read side of the accounts the gym receives online payments into.
#[async_trait]
pub trait ReceivingAccountRepo: Send + Sync {
    async fn has_active_account(&self, method: PaymentMethod) -> AppResult<bool>;
}

/// Refuses online methods the gym currently has no account open for.
pub(crate) async fn ensure_method_accepted(
    accounts: &dyn ReceivingAccountRepo,
    method: PaymentMethod,
) -> AppResult<()> {
    if method.needs_receiving_account() && !accounts.has_active_account(method).await? {
        tracing::warn!(method = %method, "No active receiving account for payment method");
        return Err(AppError::InvalidInput(format!(
            "Payment method '{}' is not accepting payments right now",
            method
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub subscription_id: Option<Uuid>,
}

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn get_latest_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Option<PaymentProfile>>;
    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<PaymentProfile>>;
    /// Inserts the first payment of a pending subscription while holding its row
    /// lock. Fails with `AlreadyProcessed` if the subscription left `pending` or
    /// already has a pending payment.
    async fn attach_to_pending_subscription(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<PaymentProfile>;
}

#[derive(Clone)]
pub struct PaymentUseCases {
    payment_repo: Arc<dyn PaymentRepo>,
    subscription_repo: Arc<dyn SubscriptionRepo>,
    accounts: Arc<dyn ReceivingAccountRepo>,
    proof_storage: Arc<dyn ProofStorage>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl PaymentUseCases {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepo>,
        subscription_repo: Arc<dyn SubscriptionRepo>,
        accounts: Arc<dyn ReceivingAccountRepo>,
        proof_storage: Arc<dyn ProofStorage>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payment_repo,
            subscription_repo,
            accounts,
            proof_storage,
            audit,
            clock,
        }
    }

    /// Attaches a first payment to a pending subscription that was created
    /// without one. The amount is the subscription's price snapshot.
    #[instrument(skip(self, submission), fields(method = %submission.method))]
    pub async fn submit_payment(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
        submission: PaymentSubmission,
    ) -> AppResult<PaymentProfile> {
        let subscription = self
            .subscription_repo
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        actor.require_self_or_staff(subscription.user_id)?;

        if !subscription.status.awaits_verification() {
            return Err(AppError::AlreadyProcessed);
        }
        submission.validate(subscription.amount_cents)?;
        ensure_method_accepted(self.accounts.as_ref(), submission.method).await?;

        let (submission, proof) =
            store_submission_proof(self.proof_storage.as_ref(), submission).await?;
        let new_payment = submission.into_new_payment(
            subscription.user_id,
            subscription.amount_cents,
            proof.as_ref(),
            self.clock.now(),
        );

        let payment = match self
            .payment_repo
            .attach_to_pending_subscription(subscription_id, &new_payment)
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                if let Some(proof) = &proof {
                    discard_best_effort(self.proof_storage.as_ref(), proof).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription_id,
            "Payment submitted"
        );
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PaymentSubmitted,
            Some(payment.id),
            &format!(
                "Submitted {} payment {} for subscription {}",
                payment.payment_method, payment.reference_number, subscription_id
            ),
        )
        .await;
        Ok(payment)
    }

    /// The most recent payment drives activation, so that is the one callers see.
    #[instrument(skip(self))]
    pub async fn get_latest(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
    ) -> AppResult<PaymentProfile> {
        let subscription = self
            .subscription_repo
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        actor.require_self_or_staff(subscription.user_id)?;

        self.payment_repo
            .get_latest_for_subscription(subscription_id)
            .await?
            .ok_or(AppError::PaymentNotFound)
    }

    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        actor: &Actor,
        filter: PaymentFilter,
    ) -> AppResult<Vec<PaymentProfile>> {
        actor.require_staff_or_admin()?;
        self.payment_repo.list(&filter).await
    }
}
