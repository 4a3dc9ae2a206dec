//! In-memory implementation of every ledger repository trait.
//!
//! All state sits behind one `Mutex`, so each trait call is atomic the same
//! way a Postgres transaction is.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment::{
            NewPayment, PaymentFilter, PaymentProfile, PaymentRepo, ReceivingAccountRepo,
        },
        plan_catalog::{PlanInput, PlanProfile, PlanRepo, PlanUsage, UsageGuard},
        subscription::{
            CreatedSubscription, MemberProfile, MemberRepo, NewSubscription, SubscriptionFilter,
            SubscriptionProfile, SubscriptionRepo,
        },
        verification::{
            ActivationPlanner, LockedSubscription, MembershipTransition, SettledPair,
            SettlementPlanner, SettlementRepo, missing_subscription_error,
        },
    },
    domain::entities::{
        payment_method::PaymentMethod, payment_status::PaymentStatus,
        subscription_status::SubscriptionStatus,
    },
};

#[derive(Default)]
struct LedgerState {
    plans: HashMap<Uuid, PlanProfile>,
    subscriptions: HashMap<Uuid, SubscriptionProfile>,
    /// Insertion order doubles as creation order.
    payments: Vec<PaymentProfile>,
    members: HashMap<Uuid, MemberProfile>,
    /// Methods with no open receiving account. Everything is open by default.
    closed_accounts: HashSet<PaymentMethod>,
}

impl LedgerState {
    fn plan_usage(&self, plan_id: Uuid) -> PlanUsage {
        let mut usage = PlanUsage {
            active: 0,
            total: 0,
        };
        for subscription in self.subscriptions.values().filter(|s| s.plan_id == plan_id) {
            usage.total += 1;
            if subscription.status == SubscriptionStatus::Active {
                usage.active += 1;
            }
        }
        usage
    }

    /// Mirrors the plan row lock: the plan must exist and pass `guard`.
    fn guard_plan(&self, plan_id: Uuid, guard: UsageGuard) -> AppResult<()> {
        if !self.plans.contains_key(&plan_id) {
            return Err(AppError::PlanNotFound);
        }
        guard(&self.plan_usage(plan_id))
    }

    fn has_pending_payment(&self, subscription_id: Uuid) -> bool {
        self.payments
            .iter()
            .any(|p| p.subscription_id == subscription_id && p.status == PaymentStatus::Pending)
    }

    fn locked_subscription(&self, subscription_id: Uuid) -> Option<LockedSubscription> {
        let subscription = self.subscriptions.get(&subscription_id)?.clone();
        let siblings = self
            .subscriptions
            .values()
            .filter(|s| {
                s.user_id == subscription.user_id
                    && s.id != subscription_id
                    && matches!(
                        s.status,
                        SubscriptionStatus::Pending | SubscriptionStatus::Active
                    )
            })
            .cloned()
            .collect();
        Some(LockedSubscription {
            has_pending_payment: self.has_pending_payment(subscription_id),
            subscription,
            siblings,
        })
    }

    fn push_payment(&mut self, subscription_id: Uuid, payment: &NewPayment) -> PaymentProfile {
        let now = now();
        let profile = PaymentProfile {
            id: Uuid::new_v4(),
            subscription_id,
            user_id: payment.user_id,
            amount_cents: payment.amount_cents,
            payment_method: payment.payment_method,
            reference_number: payment.reference_number.clone(),
            payment_proof: payment.payment_proof.clone(),
            proof_sha256: payment.proof_sha256.clone(),
            status: payment.status,
            verified_by: payment.verified_by,
            verified_at: payment.verified_at,
            rejection_reason: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.payments.push(profile.clone());
        profile
    }

    fn apply_transition(
        &mut self,
        subscription_id: Uuid,
        transition: &MembershipTransition,
    ) -> AppResult<SubscriptionProfile> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(AppError::SubscriptionInconsistent)?;
        subscription.status = transition.status;
        subscription.start_date = transition.start_date;
        subscription.end_date = transition.end_date;
        subscription.updated_at = Some(now());
        Ok(subscription.clone())
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plan(&self, plan: PlanProfile) {
        self.state.lock().unwrap().plans.insert(plan.id, plan);
    }

    pub fn insert_subscription(&self, subscription: SubscriptionProfile) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn insert_payment(&self, payment: PaymentProfile) {
        self.state.lock().unwrap().payments.push(payment);
    }

    pub fn insert_member(&self, member: MemberProfile) {
        self.state.lock().unwrap().members.insert(member.id, member);
    }

    pub fn plan(&self, id: Uuid) -> Option<PlanProfile> {
        self.state.lock().unwrap().plans.get(&id).cloned()
    }

    pub fn subscription(&self, id: Uuid) -> Option<SubscriptionProfile> {
        self.state.lock().unwrap().subscriptions.get(&id).cloned()
    }

    pub fn payment(&self, id: Uuid) -> Option<PaymentProfile> {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn payments_for(&self, subscription_id: Uuid) -> Vec<PaymentProfile> {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    pub fn subscriptions_for(&self, user_id: Uuid) -> Vec<SubscriptionProfile> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Changes a subscription's status directly, as a concurrent writer would.
    pub fn set_subscription_status(&self, id: Uuid, status: SubscriptionStatus) {
        if let Some(subscription) = self.state.lock().unwrap().subscriptions.get_mut(&id) {
            subscription.status = status;
        }
    }

    pub fn close_receiving_account(&self, method: PaymentMethod) {
        self.state.lock().unwrap().closed_accounts.insert(method);
    }

    /// Edits a plan behind the catalog's back, e.g. to check snapshot semantics.
    pub fn update_plan_duration(&self, plan_id: Uuid, duration_months: i32) {
        if let Some(plan) = self.state.lock().unwrap().plans.get_mut(&plan_id) {
            plan.duration_months = duration_months;
        }
    }
}

#[async_trait]
impl PlanRepo for InMemoryLedger {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>> {
        Ok(self.plan(id))
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PlanProfile>> {
        let state = self.state.lock().unwrap();
        let mut plans: Vec<PlanProfile> = state
            .plans
            .values()
            .filter(|p| include_inactive || p.is_active())
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            (a.deleted_at.is_some(), a.price_cents, &a.name)
                .cmp(&(b.deleted_at.is_some(), b.price_cents, &b.name))
        });
        Ok(plans)
    }

    async fn create(&self, created_by: Uuid, input: &PlanInput) -> AppResult<PlanProfile> {
        let now = now();
        let plan = PlanProfile {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            price_cents: input.price_cents,
            duration_months: input.duration_months,
            features: input.features.clone(),
            created_by: Some(created_by),
            created_at: Some(now),
            updated_at: Some(now),
            deleted_at: None,
        };
        self.insert_plan(plan.clone());
        Ok(plan)
    }

    async fn update(
        &self,
        id: Uuid,
        input: &PlanInput,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile> {
        let mut state = self.state.lock().unwrap();
        state.guard_plan(id, guard)?;
        let plan = state.plans.get_mut(&id).ok_or(AppError::PlanNotFound)?;
        plan.name = input.name.clone();
        plan.price_cents = input.price_cents;
        plan.duration_months = input.duration_months;
        plan.features = input.features.clone();
        plan.updated_at = Some(now());
        Ok(plan.clone())
    }

    async fn set_deleted_at(
        &self,
        id: Uuid,
        deleted_at: Option<NaiveDateTime>,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile> {
        let mut state = self.state.lock().unwrap();
        state.guard_plan(id, guard)?;
        let plan = state.plans.get_mut(&id).ok_or(AppError::PlanNotFound)?;
        plan.deleted_at = deleted_at;
        plan.updated_at = Some(now());
        Ok(plan.clone())
    }

    async fn delete(&self, id: Uuid, guard: UsageGuard) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.guard_plan(id, guard)?;
        state.plans.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for InMemoryLedger {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.subscription(id))
    }

    async fn list(&self, filter: &SubscriptionFilter) -> AppResult<Vec<SubscriptionProfile>> {
        let state = self.state.lock().unwrap();
        let mut subscriptions: Vec<SubscriptionProfile> = state
            .subscriptions
            .values()
            .filter(|s| filter.user_id.is_none_or(|id| s.user_id == id))
            .filter(|s| filter.status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscriptions)
    }

    async fn has_pending_for_user(&self, user_id: Uuid) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .any(|s| s.user_id == user_id && s.status == SubscriptionStatus::Pending))
    }

    async fn create_with_payment(
        &self,
        subscription: &NewSubscription,
        payment: Option<&NewPayment>,
        today: NaiveDate,
    ) -> AppResult<CreatedSubscription> {
        let mut state = self.state.lock().unwrap();

        let has_open = state.subscriptions.values().any(|s| {
            s.user_id == subscription.user_id && s.status.holds_membership(s.end_date, today)
        });
        if has_open {
            return Err(AppError::DuplicateActiveSubscription);
        }

        let now = now();
        let created = SubscriptionProfile {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            plan_id: subscription.plan_id,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            status: SubscriptionStatus::Pending,
            amount_cents: subscription.amount_cents,
            duration_months: subscription.duration_months,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.subscriptions.insert(created.id, created.clone());
        let payment = payment.map(|p| state.push_payment(created.id, p));

        Ok(CreatedSubscription {
            subscription: created,
            payment,
        })
    }

    async fn delete_unless_active(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut state = self.state.lock().unwrap();
        let subscription = state
            .subscriptions
            .get(&id)
            .cloned()
            .ok_or(AppError::SubscriptionNotFound)?;
        if subscription.status == SubscriptionStatus::Active {
            return Err(AppError::ActiveSubscriptionProtected);
        }

        state.payments.retain(|p| p.subscription_id != id);
        state.subscriptions.remove(&id);
        Ok(subscription)
    }

    async fn expire_lapsed(&self, today: NaiveDate) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut expired = 0;
        for subscription in state.subscriptions.values_mut() {
            if subscription.status == SubscriptionStatus::Active && subscription.end_date < today {
                subscription.status = SubscriptionStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl PaymentRepo for InMemoryLedger {
    async fn get_latest_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Option<PaymentProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .rev()
            .find(|p| p.subscription_id == subscription_id)
            .cloned())
    }

    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<PaymentProfile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .rev()
            .filter(|p| filter.status.is_none_or(|st| p.status == st))
            .filter(|p| filter.subscription_id.is_none_or(|id| p.subscription_id == id))
            .cloned()
            .collect())
    }

    async fn attach_to_pending_subscription(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<PaymentProfile> {
        let mut state = self.state.lock().unwrap();
        let subscription = state
            .subscriptions
            .get(&subscription_id)
            .ok_or(AppError::SubscriptionNotFound)?;
        if !subscription.status.awaits_verification() || state.has_pending_payment(subscription_id)
        {
            return Err(AppError::AlreadyProcessed);
        }
        Ok(state.push_payment(subscription_id, payment))
    }
}

#[async_trait]
impl SettlementRepo for InMemoryLedger {
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        planner: SettlementPlanner,
    ) -> AppResult<SettledPair> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or(AppError::PaymentNotFound)?;
        let subscription_id = state.payments[index].subscription_id;
        let locked = state
            .locked_subscription(subscription_id)
            .ok_or_else(|| missing_subscription_error(payment_id, subscription_id, true))?;

        let settlement = planner(&state.payments[index], &locked)?;

        let subscription = match &settlement.subscription {
            Some(transition) => state.apply_transition(subscription_id, transition)?,
            None => locked.subscription,
        };
        let payment = &mut state.payments[index];
        payment.status = settlement.payment_status;
        payment.verified_by = Some(settlement.verified_by);
        payment.verified_at = Some(settlement.verified_at);
        payment.rejection_reason = settlement.rejection_reason;
        payment.updated_at = Some(now());

        Ok(SettledPair {
            payment: payment.clone(),
            subscription,
        })
    }

    async fn activate_with_manual_payment(
        &self,
        subscription_id: Uuid,
        planner: ActivationPlanner,
    ) -> AppResult<SettledPair> {
        let mut state = self.state.lock().unwrap();
        let locked = state
            .locked_subscription(subscription_id)
            .ok_or(AppError::SubscriptionNotFound)?;

        let activation = planner(&locked)?;

        let payment = state.push_payment(subscription_id, &activation.payment);
        let subscription = state.apply_transition(subscription_id, &activation.transition)?;
        Ok(SettledPair {
            payment,
            subscription,
        })
    }
}

#[async_trait]
impl MemberRepo for InMemoryLedger {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<MemberProfile>> {
        Ok(self.state.lock().unwrap().members.get(&id).cloned())
    }
}

#[async_trait]
impl ReceivingAccountRepo for InMemoryLedger {
    async fn has_active_account(&self, method: PaymentMethod) -> AppResult<bool> {
        Ok(!self.state.lock().unwrap().closed_accounts.contains(&method))
    }
}
