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
            proof_storage::{ProofStorage, discard_best_effort},
        },
        use_cases::{
            payment::{
                NewPayment, PaymentProfile, PaymentSubmission, ReceivingAccountRepo,
                ensure_method_accepted, store_submission_proof,
            },
            plan_catalog::PlanRepo,
        },
    },
    domain::entities::{
        membership_period::period_end,
        role::{Actor, Role},
        subscription_status::SubscriptionStatus,
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    /// Plan price at the time the subscription was created.
    pub amount_cents: i64,
    /// Plan duration at the time the subscription was created.
    pub duration_months: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount_cents: i64,
    pub duration_months: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
}

/// Read-only view of a member owned by the identity service.
#[derive(Debug, Clone, Serialize)]
pub struct MemberProfile {
    pub id: Uuid,
    pub role: Role,
    pub is_verified: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    /// Defaults to the caller. Only staff and admins may name someone else.
    pub user_id: Option<Uuid>,
    pub plan_id: Uuid,
    pub payment: Option<PaymentSubmission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedSubscription {
    pub subscription: SubscriptionProfile,
    pub payment: Option<PaymentProfile>,
}

/// Where the caller should go next after a renewal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewalHint {
    pub member_id: Uuid,
    pub next_step: String,
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>>;
    async fn list(&self, filter: &SubscriptionFilter) -> AppResult<Vec<SubscriptionProfile>>;
    async fn has_pending_for_user(&self, user_id: Uuid) -> AppResult<bool>;
    /// Inserts a pending subscription and, optionally, its first payment in one
    /// transaction. Serialized per user; fails with `DuplicateActiveSubscription`
    /// when the user already holds an open subscription as of `today`.
    async fn create_with_payment(
        &self,
        subscription: &NewSubscription,
        payment: Option<&NewPayment>,
        today: NaiveDate,
    ) -> AppResult<CreatedSubscription>;
    /// Deletes the subscription and its payments under a row lock. Fails with
    /// `ActiveSubscriptionProtected` when the subscription is active.
    async fn delete_unless_active(&self, id: Uuid) -> AppResult<SubscriptionProfile>;
    /// Marks active subscriptions that ended before `today` as expired.
    async fn expire_lapsed(&self, today: NaiveDate) -> AppResult<u64>;
}

#[async_trait]
pub trait MemberRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<MemberProfile>>;
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    plan_repo: Arc<dyn PlanRepo>,
    member_repo: Arc<dyn MemberRepo>,
    accounts: Arc<dyn ReceivingAccountRepo>,
    proof_storage: Arc<dyn ProofStorage>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionUseCases {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        plan_repo: Arc<dyn PlanRepo>,
        member_repo: Arc<dyn MemberRepo>,
        accounts: Arc<dyn ReceivingAccountRepo>,
        proof_storage: Arc<dyn ProofStorage>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            member_repo,
            accounts,
            proof_storage,
            audit,
            clock,
        }
    }

    /// Creates a pending subscription priced from the plan. Members subscribe
    /// themselves and must pay in the same step; staff and admins may open a
    /// payment-less subscription for any member and settle it later.
    #[instrument(skip(self, input), fields(plan_id = %input.plan_id))]
    pub async fn create_subscription(
        &self,
        actor: &Actor,
        input: CreateSubscriptionInput,
    ) -> AppResult<CreatedSubscription> {
        let user_id = input.user_id.unwrap_or(actor.id);
        actor.require_self_or_staff(user_id)?;
        if !actor.role.is_staff_or_admin() && input.payment.is_none() {
            return Err(AppError::InvalidInput(
                "A payment is required to subscribe".into(),
            ));
        }

        let plan = self
            .plan_repo
            .get_by_id(input.plan_id)
            .await?
            .filter(|p| p.is_active())
            .ok_or(AppError::PlanNotFound)?;

        self.member_repo
            .get_by_id(user_id)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or(AppError::MemberNotFound)?;

        if let Some(payment) = &input.payment {
            payment.validate(plan.price_cents)?;
            ensure_method_accepted(self.accounts.as_ref(), payment.method).await?;
        }

        let now = self.clock.now();
        let today = now.date();
        let end_date = period_end(today, plan.duration_months).ok_or_else(|| {
            AppError::Internal(format!(
                "Plan {} has an unusable duration of {} months",
                plan.id, plan.duration_months
            ))
        })?;
        let new_subscription = NewSubscription {
            user_id,
            plan_id: plan.id,
            start_date: today,
            end_date,
            amount_cents: plan.price_cents,
            duration_months: plan.duration_months,
        };

        // The proof lands on disk before the transaction opens.
        let (new_payment, proof) = match input.payment {
            Some(submission) => {
                let (submission, proof) =
                    store_submission_proof(self.proof_storage.as_ref(), submission).await?;
                let payment =
                    submission.into_new_payment(user_id, plan.price_cents, proof.as_ref(), now);
                (Some(payment), proof)
            }
            None => (None, None),
        };

        let created = match self
            .subscription_repo
            .create_with_payment(&new_subscription, new_payment.as_ref(), today)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                if let Some(proof) = &proof {
                    discard_best_effort(self.proof_storage.as_ref(), proof).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            subscription_id = %created.subscription.id,
            user_id = %user_id,
            with_payment = created.payment.is_some(),
            "Subscription created"
        );
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::SubscriptionCreated,
            Some(created.subscription.id),
            &format!("Created subscription to {} for member {}", plan.name, user_id),
        )
        .await;
        Ok(created)
    }

    /// Checks that a member can start a renewal. Nothing is written; the caller
    /// follows the hint to create the new subscription.
    #[instrument(skip(self))]
    pub async fn renew(&self, actor: &Actor, member_id: Uuid) -> AppResult<RenewalHint> {
        actor.require_staff_or_admin()?;

        let member = self
            .member_repo
            .get_by_id(member_id)
            .await?
            .filter(|m| !m.is_deleted)
            .ok_or(AppError::MemberNotFound)?;
        if !member.is_verified {
            return Err(AppError::MemberNotVerified);
        }
        if self.subscription_repo.has_pending_for_user(member_id).await? {
            return Err(AppError::PendingSubscriptionExists);
        }

        Ok(RenewalHint {
            member_id,
            next_step: format!("POST /api/subscriptions with user_id={}", member_id),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_subscription(&self, actor: &Actor, subscription_id: Uuid) -> AppResult<()> {
        actor.require_any(&[Role::Admin])?;

        let deleted = self
            .subscription_repo
            .delete_unless_active(subscription_id)
            .await?;

        tracing::info!(
            subscription_id = %subscription_id,
            user_id = %deleted.user_id,
            "Subscription deleted"
        );
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::SubscriptionDeleted,
            Some(subscription_id),
            &format!(
                "Deleted {} subscription of member {}",
                deleted.status, deleted.user_id
            ),
        )
        .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_subscription(
        &self,
        actor: &Actor,
        subscription_id: Uuid,
    ) -> AppResult<SubscriptionProfile> {
        let subscription = self
            .subscription_repo
            .get_by_id(subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        actor.require_self_or_staff(subscription.user_id)?;
        Ok(subscription)
    }

    /// Members are always scoped to their own subscriptions.
    #[instrument(skip(self))]
    pub async fn list_subscriptions(
        &self,
        actor: &Actor,
        mut filter: SubscriptionFilter,
    ) -> AppResult<Vec<SubscriptionProfile>> {
        if actor.has_role(Role::Member) {
            filter.user_id = Some(actor.id);
        }
        self.subscription_repo.list(&filter).await
    }

    #[instrument(skip(self))]
    pub async fn expire_lapsed(&self) -> AppResult<u64> {
        let expired = self
            .subscription_repo
            .expire_lapsed(self.clock.today())
            .await?;
        if expired > 0 {
            tracing::info!(count = expired, "Expired lapsed subscriptions");
        }
        Ok(expired)
    }
}
