use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::audit_log::{AuditAction, AuditLog},
};

#[async_trait]
impl AuditLog for PostgresPersistence {
    async fn log_action(
        &self,
        actor_id: Uuid,
        action: AuditAction,
        target_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO admin_logs (id, admin_id, action_type, target_id, description)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(Uuid::new_v4())
        .bind(actor_id)
        .bind(action.as_str())
        .bind(target_id)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
