use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::payment::ReceivingAccountRepo,
    domain::entities::payment_method::PaymentMethod,
};

#[async_trait]
impl ReceivingAccountRepo for PostgresPersistence {
    async fn has_active_account(&self, method: PaymentMethod) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM payment_accounts
                   WHERE account_type = $1 AND is_active AND deleted_at IS NULL
               )"#,
        )
        .bind(method)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }
}
