use async_trait::async_trait;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{
        PostgresPersistence,
        payment::{self, insert_payment},
        subscription::{apply_transition, lock_for_activation, lock_member},
    },
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment::PaymentProfile,
        verification::{
            ActivationPlanner, SettledPair, Settlement, SettlementPlanner, SettlementRepo,
            missing_subscription_error,
        },
    },
};

async fn lock_payment(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<PaymentProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
        payment::SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row.map(payment::row_to_profile))
}

async fn apply_settlement(
    conn: &mut PgConnection,
    id: Uuid,
    settlement: &Settlement,
) -> AppResult<PaymentProfile> {
    let row = sqlx::query(&format!(
        r#"UPDATE payments
           SET status = $2, verified_by = $3, verified_at = $4, rejection_reason = $5,
               updated_at = NOW()
           WHERE id = $1
           RETURNING {}"#,
        payment::SELECT_COLS
    ))
    .bind(id)
    .bind(settlement.payment_status)
    .bind(settlement.verified_by)
    .bind(settlement.verified_at)
    .bind(&settlement.rejection_reason)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(payment::row_to_profile(row))
}

#[async_trait]
impl SettlementRepo for PostgresPersistence {
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        planner: SettlementPlanner,
    ) -> AppResult<SettledPair> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Lock order: member, subscription, plan, payment. The owner is read
        // unlocked first; it never changes for a subscription.
        let row = sqlx::query(
            r#"SELECT p.subscription_id, s.user_id
               FROM payments p
               LEFT JOIN subscriptions s ON s.id = p.subscription_id
               WHERE p.id = $1"#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::PaymentNotFound)?;
        let subscription_id: Uuid = row.get("subscription_id");
        let user_id: Option<Uuid> = row.get("user_id");

        if let Some(user_id) = user_id {
            lock_member(&mut tx, user_id).await?;
        }

        let Some(locked) = lock_for_activation(&mut tx, subscription_id).await? else {
            let still_exists = lock_payment(&mut tx, payment_id).await?.is_some();
            return Err(missing_subscription_error(
                payment_id,
                subscription_id,
                still_exists,
            ));
        };
        let payment = lock_payment(&mut tx, payment_id)
            .await?
            .ok_or(AppError::PaymentNotFound)?;

        let settlement = planner(&payment, &locked)?;

        let payment = apply_settlement(&mut tx, payment_id, &settlement).await?;
        let subscription = match &settlement.subscription {
            Some(transition) => apply_transition(&mut tx, subscription_id, transition).await?,
            None => locked.subscription,
        };

        tx.commit().await.map_err(AppError::from)?;
        Ok(SettledPair {
            payment,
            subscription,
        })
    }

    async fn activate_with_manual_payment(
        &self,
        subscription_id: Uuid,
        planner: ActivationPlanner,
    ) -> AppResult<SettledPair> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::SubscriptionNotFound)?;
        lock_member(&mut tx, user_id).await?;

        let locked = lock_for_activation(&mut tx, subscription_id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;

        let activation = planner(&locked)?;

        let payment = insert_payment(&mut tx, subscription_id, &activation.payment).await?;
        let subscription =
            apply_transition(&mut tx, subscription_id, &activation.transition).await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(SettledPair {
            payment,
            subscription,
        })
    }
}
