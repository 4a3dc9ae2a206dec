use async_trait::async_trait;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{
        PostgresPersistence,
        subscription::{has_pending_payment, lock_subscription},
    },
    app_error::{AppError, AppResult},
    application::use_cases::payment::{NewPayment, PaymentFilter, PaymentProfile, PaymentRepo},
};

pub(super) fn row_to_profile(row: sqlx::postgres::PgRow) -> PaymentProfile {
    PaymentProfile {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        user_id: row.get("user_id"),
        amount_cents: row.get("amount_cents"),
        payment_method: row.get("payment_method"),
        reference_number: row.get("reference_number"),
        payment_proof: row.get("payment_proof"),
        proof_sha256: row.get("proof_sha256"),
        status: row.get("status"),
        verified_by: row.get("verified_by"),
        verified_at: row.get("verified_at"),
        rejection_reason: row.get("rejection_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) const SELECT_COLS: &str = r#"
    id, subscription_id, user_id, amount_cents, payment_method, reference_number,
    payment_proof, proof_sha256, status, verified_by, verified_at, rejection_reason,
    created_at, updated_at
"#;

pub(super) async fn insert_payment(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    payment: &NewPayment,
) -> AppResult<PaymentProfile> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO payments
               (id, subscription_id, user_id, amount_cents, payment_method, reference_number,
                payment_proof, proof_sha256, status, verified_by, verified_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
           RETURNING {}"#,
        SELECT_COLS
    ))
    .bind(Uuid::new_v4())
    .bind(subscription_id)
    .bind(payment.user_id)
    .bind(payment.amount_cents)
    .bind(payment.payment_method)
    .bind(&payment.reference_number)
    .bind(&payment.payment_proof)
    .bind(&payment.proof_sha256)
    .bind(payment.status)
    .bind(payment.verified_by)
    .bind(payment.verified_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row_to_profile(row))
}

#[async_trait]
impl PaymentRepo for PostgresPersistence {
    async fn get_latest_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> AppResult<Option<PaymentProfile>> {
        let row = sqlx::query(&format!(
            r#"SELECT {} FROM payments
               WHERE subscription_id = $1
               ORDER BY created_at DESC
               LIMIT 1"#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list(&self, filter: &PaymentFilter) -> AppResult<Vec<PaymentProfile>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM payments
               WHERE ($1::payment_status IS NULL OR status = $1)
                 AND ($2::uuid IS NULL OR subscription_id = $2)
               ORDER BY created_at DESC"#,
            SELECT_COLS
        ))
        .bind(filter.status)
        .bind(filter.subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn attach_to_pending_subscription(
        &self,
        subscription_id: Uuid,
        payment: &NewPayment,
    ) -> AppResult<PaymentProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let subscription = lock_subscription(&mut tx, subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        if !subscription.status.awaits_verification()
            || has_pending_payment(&mut tx, subscription_id).await?
        {
            return Err(AppError::AlreadyProcessed);
        }

        let created = insert_payment(&mut tx, subscription_id, payment).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(created)
    }
}
