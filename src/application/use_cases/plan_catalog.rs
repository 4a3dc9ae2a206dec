use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
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
        validators::{is_valid_feature, is_valid_plan_name, normalize_features},
    },
    domain::entities::{
        membership_period::{MAX_DURATION_MONTHS, MIN_DURATION_MONTHS, is_valid_duration},
        role::{Actor, Role},
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct PlanProfile {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub duration_months: i32,
    pub features: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub deleted_at: Option<NaiveDateTime>,
}

impl PlanProfile {
    /// Deactivated plans stay in the catalog for history but cannot be subscribed to.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A validated, normalized plan definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanInput {
    pub name: String,
    pub price_cents: i64,
    pub duration_months: i32,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub duration_months: Option<i32>,
    pub features: Option<Vec<String>>,
}

/// Subscriptions on a plan, counted while the plan row is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanUsage {
    pub active: i64,
    pub total: i64,
}

/// Decides from the locked plan's usage whether a write may go ahead.
pub type UsageGuard = Box<dyn FnOnce(&PlanUsage) -> AppResult<()> + Send>;

/// Plan writes lock the plan row, count its subscriptions, run the guard and
/// write in one transaction. Activations hold the plan row in share mode, so
/// no subscription on the plan turns active between the guard and the write.
#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>>;
    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PlanProfile>>;
    async fn create(&self, created_by: Uuid, input: &PlanInput) -> AppResult<PlanProfile>;
    async fn update(
        &self,
        id: Uuid,
        input: &PlanInput,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile>;
    async fn set_deleted_at(
        &self,
        id: Uuid,
        deleted_at: Option<NaiveDateTime>,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile>;
    async fn delete(&self, id: Uuid, guard: UsageGuard) -> AppResult<()>;
}

/// Refuses the write while any subscription on the plan is active.
pub fn refuse_while_active(verb: &'static str) -> UsageGuard {
    Box::new(move |usage: &PlanUsage| {
        if usage.active > 0 {
            return Err(AppError::PlanInUse(format!(
                "Cannot {} plan: it has {} active subscription(s)",
                verb, usage.active
            )));
        }
        Ok(())
    })
}

/// Refuses a hard delete once anyone ever subscribed to the plan.
pub fn refuse_if_ever_used() -> UsageGuard {
    Box::new(|usage: &PlanUsage| {
        if usage.total > 0 {
            return Err(AppError::PlanInUse(format!(
                "Cannot delete plan: it has {} subscription(s). Deactivate it instead.",
                usage.total
            )));
        }
        Ok(())
    })
}

/// Checks and normalizes a plan definition before anything is written.
pub fn validate_plan(
    name: &str,
    price_cents: i64,
    duration_months: i32,
    features: &[String],
) -> AppResult<PlanInput> {
    if !is_valid_plan_name(name) {
        return Err(AppError::InvalidInput(
            "Plan name is required and must be at most 100 characters".into(),
        ));
    }
    if price_cents < 0 {
        return Err(AppError::InvalidInput("Price cannot be negative".into()));
    }
    if !is_valid_duration(duration_months) {
        return Err(AppError::InvalidInput(format!(
            "Duration must be between {} and {} months",
            MIN_DURATION_MONTHS, MAX_DURATION_MONTHS
        )));
    }
    let features = normalize_features(features);
    if let Some(long) = features.iter().find(|f| !is_valid_feature(f)) {
        return Err(AppError::InvalidInput(format!(
            "Feature is too long: {}",
            long.chars().take(40).collect::<String>()
        )));
    }

    Ok(PlanInput {
        name: name.trim().to_string(),
        price_cents,
        duration_months,
        features,
    })
}

#[derive(Clone)]
pub struct PlanCatalogUseCases {
    plan_repo: Arc<dyn PlanRepo>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl PlanCatalogUseCases {
    pub fn new(
        plan_repo: Arc<dyn PlanRepo>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            plan_repo,
            audit,
            clock,
        }
    }

    /// Members only ever see plans that can be subscribed to.
    #[instrument(skip(self))]
    pub async fn list_plans(
        &self,
        actor: &Actor,
        include_inactive: bool,
    ) -> AppResult<Vec<PlanProfile>> {
        let include_inactive = include_inactive && actor.role.is_staff_or_admin();
        self.plan_repo.list(include_inactive).await
    }

    #[instrument(skip(self))]
    pub async fn get_plan(&self, actor: &Actor, plan_id: Uuid) -> AppResult<PlanProfile> {
        let plan = self.load(plan_id).await?;
        if !plan.is_active() && !actor.role.is_staff_or_admin() {
            return Err(AppError::PlanNotFound);
        }
        Ok(plan)
    }

    #[instrument(skip(self, input))]
    pub async fn create_plan(&self, actor: &Actor, input: PlanInput) -> AppResult<PlanProfile> {
        actor.require_staff_or_admin()?;
        let input = validate_plan(
            &input.name,
            input.price_cents,
            input.duration_months,
            &input.features,
        )?;

        let plan = self.plan_repo.create(actor.id, &input).await?;
        tracing::info!(plan_id = %plan.id, name = %plan.name, "Plan created");

        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PlanCreated,
            Some(plan.id),
            &format!("Created plan {}", plan.name),
        )
        .await;
        Ok(plan)
    }

    /// Applies a partial update. Plans backing an active subscription are frozen.
    #[instrument(skip(self, changes))]
    pub async fn update_plan(
        &self,
        actor: &Actor,
        plan_id: Uuid,
        changes: UpdatePlanInput,
    ) -> AppResult<PlanProfile> {
        actor.require_staff_or_admin()?;
        let current = self.load(plan_id).await?;

        let input = validate_plan(
            changes.name.as_deref().unwrap_or(&current.name),
            changes.price_cents.unwrap_or(current.price_cents),
            changes.duration_months.unwrap_or(current.duration_months),
            changes.features.as_deref().unwrap_or(&current.features),
        )?;

        let plan = self
            .plan_repo
            .update(plan_id, &input, refuse_while_active("edit"))
            .await?;
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PlanUpdated,
            Some(plan.id),
            &format!("Updated plan {}", plan.name),
        )
        .await;
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn deactivate_plan(&self, actor: &Actor, plan_id: Uuid) -> AppResult<PlanProfile> {
        actor.require_staff_or_admin()?;
        let current = self.load(plan_id).await?;
        if !current.is_active() {
            return Ok(current);
        }

        let plan = self
            .plan_repo
            .set_deleted_at(
                plan_id,
                Some(self.clock.now()),
                refuse_while_active("deactivate"),
            )
            .await?;
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PlanDeactivated,
            Some(plan.id),
            &format!("Deactivated plan {}", plan.name),
        )
        .await;
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn reactivate_plan(&self, actor: &Actor, plan_id: Uuid) -> AppResult<PlanProfile> {
        actor.require_staff_or_admin()?;
        let current = self.load(plan_id).await?;
        if current.is_active() {
            return Ok(current);
        }

        let plan = self
            .plan_repo
            .set_deleted_at(plan_id, None, Box::new(|_: &PlanUsage| Ok(())))
            .await?;
        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PlanReactivated,
            Some(plan.id),
            &format!("Reactivated plan {}", plan.name),
        )
        .await;
        Ok(plan)
    }

    /// Hard delete, only for plans nobody ever subscribed to.
    #[instrument(skip(self))]
    pub async fn delete_plan(&self, actor: &Actor, plan_id: Uuid) -> AppResult<()> {
        actor.require_any(&[Role::Admin])?;
        let plan = self.load(plan_id).await?;

        self.plan_repo
            .delete(plan_id, refuse_if_ever_used())
            .await?;
        tracing::info!(plan_id = %plan_id, "Plan deleted");

        audit_log::record(
            self.audit.as_ref(),
            actor.id,
            AuditAction::PlanDeleted,
            Some(plan_id),
            &format!("Deleted plan {}", plan.name),
        )
        .await;
        Ok(())
    }

    async fn load(&self, plan_id: Uuid) -> AppResult<PlanProfile> {
        self.plan_repo
            .get_by_id(plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)
    }
}
