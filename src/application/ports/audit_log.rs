use async_trait::async_trait;
use uuid::Uuid;

use crate::app_error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    SubscriptionCreated,
    SubscriptionDeleted,
    SubscriptionActivated,
    PaymentSubmitted,
    PaymentVerified,
    PaymentRejected,
    PlanCreated,
    PlanUpdated,
    PlanDeactivated,
    PlanReactivated,
    PlanDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SubscriptionCreated => "subscription_created",
            AuditAction::SubscriptionDeleted => "subscription_deleted",
            AuditAction::SubscriptionActivated => "subscription_activated",
            AuditAction::PaymentSubmitted => "payment_submitted",
            AuditAction::PaymentVerified => "payment_verified",
            AuditAction::PaymentRejected => "payment_rejected",
            AuditAction::PlanCreated => "plan_created",
            AuditAction::PlanUpdated => "plan_updated",
            AuditAction::PlanDeactivated => "plan_deactivated",
            AuditAction::PlanReactivated => "plan_reactivated",
            AuditAction::PlanDeleted => "plan_deleted",
        }
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log_action(
        &self,
        actor_id: Uuid,
        action: AuditAction,
        target_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<()>;
}

/// Writes an audit entry after a committed change. A failing audit sink never
/// undoes the change it describes, so errors are only logged.
pub async fn record(
    audit: &dyn AuditLog,
    actor_id: Uuid,
    action: AuditAction,
    target_id: Option<Uuid>,
    description: &str,
) {
    if let Err(e) = audit
        .log_action(actor_id, action, target_id, description)
        .await
    {
        tracing::warn!(
            actor_id = %actor_id,
            action = action.as_str(),
            error = ?e,
            "Failed to write audit log entry"
        );
    }
}
