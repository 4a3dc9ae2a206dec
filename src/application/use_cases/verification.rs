//! Moves a pending subscription and its payment into a terminal state.
//!
//! Decisions are planned from the rows the repository has locked and applied in
//! the same transaction. Of two concurrent decisions on one payment, the second
//! sees the first one's result and fails with `AlreadyProcessed`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            audit_log::{self, AuditAction, AuditLog},
            clock::Clock,
        },
        use_cases::{
            payment::{NewPayment, PaymentProfile, generated_reference},
            subscription::SubscriptionProfile,
        },
        validators::is_valid_rejection_reason,
    },
    domain::entities::{
        membership_period::period_end, payment_method::PaymentMethod,
        payment_status::PaymentStatus, role::Actor, subscription_status::SubscriptionStatus,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Verify,
    Reject { reason: String },
}

/// New status and dates for a subscription leaving `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTransition {
    pub status: SubscriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Changes to apply to a locked payment and its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub payment_status: PaymentStatus,
    pub verified_by: Uuid,
    pub verified_at: NaiveDateTime,
    pub rejection_reason: Option<String>,
    /// `None` leaves the subscription untouched.
    pub subscription: Option<MembershipTransition>,
}

/// A verified staff payment plus the activation it pays for.
#[derive(Debug, Clone)]
pub struct ManualActivation {
    pub payment: NewPayment,
    pub transition: MembershipTransition,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettledPair {
    pub payment: PaymentProfile,
    pub subscription: SubscriptionProfile,
}

/// A subscription read while holding its row lock and the member's lock.
#[derive(Debug, Clone)]
pub struct LockedSubscription {
    pub subscription: SubscriptionProfile,
    pub has_pending_payment: bool,
    /// The member's other `pending` and `active` subscriptions, whatever their dates.
    pub siblings: Vec<SubscriptionProfile>,
}

impl LockedSubscription {
    /// Activating on `today` must not give the member a second open subscription.
    pub fn ensure_sole_membership(&self, today: NaiveDate) -> AppResult<()> {
        match self
            .siblings
            .iter()
            .find(|s| s.status.holds_membership(s.end_date, today))
        {
            Some(open) => {
                tracing::warn!(
                    subscription_id = %self.subscription.id,
                    open_subscription_id = %open.id,
                    user_id = %self.subscription.user_id,
                    "Refusing activation: member already holds an open subscription"
                );
                Err(AppError::DuplicateActiveSubscription)
            }
            None => Ok(()),
        }
    }
}

pub type SettlementPlanner =
    Box<dyn FnOnce(&PaymentProfile, &LockedSubscription) -> AppResult<Settlement> + Send>;

pub type ActivationPlanner =
    Box<dyn FnOnce(&LockedSubscription) -> AppResult<ManualActivation> + Send>;

#[async_trait]
pub trait SettlementRepo: Send + Sync {
    /// Locks the member, the payment's subscription and the payment, asks
    /// `planner` what to do and applies the result in the same transaction. A
    /// planner error rolls back.
    ///
    /// Fails with `PaymentNotFound` for an unknown (or meanwhile deleted)
    /// payment and with `SubscriptionInconsistent` when the payment outlives
    /// its subscription.
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        planner: SettlementPlanner,
    ) -> AppResult<SettledPair>;

    /// Locks the member and the subscription, asks `planner` for the payment to
    /// insert and the activation to apply, and commits both together.
    async fn activate_with_manual_payment(
        &self,
        subscription_id: Uuid,
        planner: ActivationPlanner,
    ) -> AppResult<SettledPair>;
}

/// The membership window for an activation on `today`, using the duration
/// captured when the subscription was created.
pub fn activation_window(
    today: NaiveDate,
    duration_months: i32,
) -> AppResult<MembershipTransition> {
    let end_date = period_end(today, duration_months).ok_or_else(|| {
        AppError::Internal(format!(
            "Cannot compute membership end for {} months",
            duration_months
        ))
    })?;
    Ok(MembershipTransition {
        status: SubscriptionStatus::Active,
        start_date: today,
        end_date,
    })
}

/// Maps a payment whose subscription could not be locked. The payment is gone
/// too when the subscription was deleted in the meantime.
pub fn missing_subscription_error(
    payment_id: Uuid,
    subscription_id: Uuid,
    payment_still_exists: bool,
) -> AppError {
    if !payment_still_exists {
        return AppError::PaymentNotFound;
    }
    tracing::error!(
        payment_id = %payment_id,
        subscription_id = %subscription_id,
        "Payment references a missing subscription"
    );
    AppError::SubscriptionInconsistent
}

pub fn plan_settlement(
    decision: &Decision,
    payment: &PaymentProfile,
    locked: &LockedSubscription,
    verifier: Uuid,
    now: NaiveDateTime,
) -> AppResult<Settlement> {
    if payment.status.is_terminal() {
        return Err(AppError::AlreadyProcessed);
    }

    let subscription = &locked.subscription;
    let pending = subscription.status.awaits_verification();
    let settlement = match decision {
        Decision::Verify => Settlement {
            payment_status: PaymentStatus::Verified,
            verified_by: verifier,
            verified_at: now,
            rejection_reason: None,
            subscription: if pending {
                locked.ensure_sole_membership(now.date())?;
                Some(activation_window(now.date(), subscription.duration_months)?)
            } else {
                None
            },
        },
        Decision::Reject { reason } => Settlement {
            payment_status: PaymentStatus::Rejected,
            verified_by: verifier,
            verified_at: now,
            rejection_reason: Some(reason.clone()),
            subscription: pending.then(|| MembershipTransition {
                status: SubscriptionStatus::Cancelled,
                start_date: subscription.start_date,
                end_date: subscription.end_date,
            }),
        },
    };
    Ok(settlement)
}

pub fn plan_manual_activation(
    locked: &LockedSubscription,
    verifier: Uuid,
    now: NaiveDateTime,
) -> AppResult<ManualActivation> {
    let subscription = &locked.subscription;
    if !subscription.status.awaits_verification() || locked.has_pending_payment {
        return Err(AppError::AlreadyProcessed);
    }
    locked.ensure_sole_membership(now.date())?;

    let short_id = subscription.id.simple().to_string()[..8].to_string();
    let payment = NewPayment {
        user_id: subscription.user_id,
        amount_cents: subscription.amount_cents,
        payment_method: PaymentMethod::Admin,
        reference_number: generated_reference(PaymentMethod::Admin, now, &short_id),
        payment_proof: None,
        proof_sha256: None,
        status: PaymentStatus::Verified,
        verified_by: Some(verifier),
        verified_at: Some(now),
    };
    Ok(ManualActivation {
        payment,
        transition: activation_window(now.date(), subscription.duration_months)?,
    })
}

#[derive(Clone)]
pub struct VerificationUseCases {
    settlement_repo: Arc<dyn SettlementRepo>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl VerificationUseCases {
    pub fn new(
        settlement_repo: Arc<dyn SettlementRepo>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settlement_repo,
            audit,
            clock,
        }
    }

    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        verifier: &Actor,
        payment_id: Uuid,
    ) -> AppResult<SettledPair> {
        verifier.require_staff_or_admin()?;
        let pair = self.settle(verifier, payment_id, Decision::Verify).await?;

        tracing::info!(
            payment_id = %payment_id,
            subscription_id = %pair.subscription.id,
            subscription_status = %pair.subscription.status,
            "Payment verified"
        );
        audit_log::record(
            self.audit.as_ref(),
            verifier.id,
            AuditAction::PaymentVerified,
            Some(payment_id),
            &format!(
                "Verified payment {} for subscription {}",
                pair.payment.reference_number, pair.subscription.id
            ),
        )
        .await;
        Ok(pair)
    }

    /// Rejects a pending payment. The reason is stored exactly as given.
    #[instrument(skip(self, reason))]
    pub async fn reject_payment(
        &self,
        verifier: &Actor,
        payment_id: Uuid,
        reason: &str,
    ) -> AppResult<SettledPair> {
        verifier.require_staff_or_admin()?;
        if !is_valid_rejection_reason(reason) {
            return Err(AppError::InvalidInput(
                "Rejection reason is required and must be at most 500 characters".into(),
            ));
        }

        let decision = Decision::Reject {
            reason: reason.to_string(),
        };
        let pair = self.settle(verifier, payment_id, decision).await?;

        tracing::info!(
            payment_id = %payment_id,
            subscription_id = %pair.subscription.id,
            "Payment rejected"
        );
        audit_log::record(
            self.audit.as_ref(),
            verifier.id,
            AuditAction::PaymentRejected,
            Some(payment_id),
            &format!(
                "Rejected payment {}: {}",
                pair.payment.reference_number, reason
            ),
        )
        .await;
        Ok(pair)
    }

    /// Settles a pending subscription paid at the desk: records a verified
    /// `admin` payment and activates the subscription in one step.
    #[instrument(skip(self))]
    pub async fn record_manual_payment_and_activate(
        &self,
        verifier: &Actor,
        subscription_id: Uuid,
    ) -> AppResult<SettledPair> {
        verifier.require_staff_or_admin()?;

        let verifier_id = verifier.id;
        let now = self.clock.now();
        let pair = self
            .settlement_repo
            .activate_with_manual_payment(
                subscription_id,
                Box::new(move |locked: &LockedSubscription| {
                    plan_manual_activation(locked, verifier_id, now)
                }),
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription_id,
            payment_id = %pair.payment.id,
            "Subscription activated with manual payment"
        );
        audit_log::record(
            self.audit.as_ref(),
            verifier.id,
            AuditAction::SubscriptionActivated,
            Some(subscription_id),
            &format!(
                "Recorded payment {} and activated subscription until {}",
                pair.payment.reference_number, pair.subscription.end_date
            ),
        )
        .await;
        Ok(pair)
    }

    async fn settle(
        &self,
        verifier: &Actor,
        payment_id: Uuid,
        decision: Decision,
    ) -> AppResult<SettledPair> {
        let verifier_id = verifier.id;
        let now = self.clock.now();
        self.settlement_repo
            .settle_payment(
                payment_id,
                Box::new(move |payment: &PaymentProfile, locked: &LockedSubscription| {
                    plan_settlement(&decision, payment, locked, verifier_id, now)
                }),
            )
            .await
    }
}
