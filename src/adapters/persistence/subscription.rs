use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, payment::insert_payment},
    app_error::{AppError, AppResult},
    application::use_cases::{
        payment::NewPayment,
        subscription::{
            CreatedSubscription, NewSubscription, SubscriptionFilter, SubscriptionProfile,
            SubscriptionRepo,
        },
        verification::{LockedSubscription, MembershipTransition},
    },
    domain::entities::subscription_status::SubscriptionStatus,
};

pub(super) fn row_to_profile(row: sqlx::postgres::PgRow) -> SubscriptionProfile {
    SubscriptionProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        plan_id: row.get("plan_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: row.get("status"),
        amount_cents: row.get("amount_cents"),
        duration_months: row.get("duration_months"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) const SELECT_COLS: &str = r#"
    id, user_id, plan_id, start_date, end_date, status,
    amount_cents, duration_months, created_at, updated_at
"#;

/// Serializes every write that can open a subscription for `user_id`: creation
/// and activation. Taken before any row lock.
pub(super) async fn lock_member(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(AppError::from)?;
    Ok(())
}

/// Loads a subscription and holds its row lock until the transaction ends.
pub(super) async fn lock_subscription(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<Option<SubscriptionProfile>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM subscriptions WHERE id = $1 FOR UPDATE",
        SELECT_COLS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row.map(row_to_profile))
}

pub(super) async fn has_pending_payment(
    conn: &mut PgConnection,
    subscription_id: Uuid,
) -> AppResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE subscription_id = $1 AND status = 'pending')",
    )
    .bind(subscription_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(exists)
}

/// Locks a subscription for activation. Also holds its plan row in share mode
/// so the plan cannot be edited until the activation commits. Call with the
/// member lock held.
pub(super) async fn lock_for_activation(
    conn: &mut PgConnection,
    id: Uuid,
) -> AppResult<Option<LockedSubscription>> {
    let Some(subscription) = lock_subscription(conn, id).await? else {
        return Ok(None);
    };

    sqlx::query("SELECT id FROM plans WHERE id = $1 FOR SHARE")
        .bind(subscription.plan_id)
        .execute(&mut *conn)
        .await
        .map_err(AppError::from)?;

    let pending_payment = has_pending_payment(conn, id).await?;
    let siblings = sqlx::query(&format!(
        r#"SELECT {} FROM subscriptions
           WHERE user_id = $1 AND id <> $2 AND status IN ('pending', 'active')"#,
        SELECT_COLS
    ))
    .bind(subscription.user_id)
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(AppError::from)?
    .into_iter()
    .map(row_to_profile)
    .collect();

    Ok(Some(LockedSubscription {
        subscription,
        has_pending_payment: pending_payment,
        siblings,
    }))
}

pub(super) async fn apply_transition(
    conn: &mut PgConnection,
    id: Uuid,
    transition: &MembershipTransition,
) -> AppResult<SubscriptionProfile> {
    let row = sqlx::query(&format!(
        r#"UPDATE subscriptions
           SET status = $2, start_date = $3, end_date = $4, updated_at = NOW()
           WHERE id = $1
           RETURNING {}"#,
        SELECT_COLS
    ))
    .bind(id)
    .bind(transition.status)
    .bind(transition.start_date)
    .bind(transition.end_date)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(row_to_profile(row))
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list(&self, filter: &SubscriptionFilter) -> AppResult<Vec<SubscriptionProfile>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM subscriptions
               WHERE ($1::uuid IS NULL OR user_id = $1)
                 AND ($2::subscription_status IS NULL OR status = $2)
               ORDER BY created_at DESC"#,
            SELECT_COLS
        ))
        .bind(filter.user_id)
        .bind(filter.status)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn has_pending_for_user(&self, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND status = 'pending')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists)
    }

    async fn create_with_payment(
        &self,
        subscription: &NewSubscription,
        payment: Option<&NewPayment>,
        today: NaiveDate,
    ) -> AppResult<CreatedSubscription> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Holds even when the member has no rows yet to lock.
        lock_member(&mut tx, subscription.user_id).await?;

        let open = sqlx::query(
            r#"SELECT id FROM subscriptions
               WHERE user_id = $1 AND status IN ('pending', 'active') AND end_date >= $2
               FOR UPDATE"#,
        )
        .bind(subscription.user_id)
        .bind(today)
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if !open.is_empty() {
            return Err(AppError::DuplicateActiveSubscription);
        }

        let row = sqlx::query(&format!(
            r#"INSERT INTO subscriptions
                   (id, user_id, plan_id, start_date, end_date, status, amount_cents, duration_months)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(subscription.user_id)
        .bind(subscription.plan_id)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(SubscriptionStatus::Pending)
        .bind(subscription.amount_cents)
        .bind(subscription.duration_months)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;
        let created = row_to_profile(row);

        let payment = match payment {
            Some(payment) => Some(insert_payment(&mut tx, created.id, payment).await?),
            None => None,
        };

        tx.commit().await.map_err(AppError::from)?;
        Ok(CreatedSubscription {
            subscription: created,
            payment,
        })
    }

    async fn delete_unless_active(&self, id: Uuid) -> AppResult<SubscriptionProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let subscription = lock_subscription(&mut tx, id)
            .await?
            .ok_or(AppError::SubscriptionNotFound)?;
        if subscription.status == SubscriptionStatus::Active {
            return Err(AppError::ActiveSubscriptionProtected);
        }

        sqlx::query("DELETE FROM payments WHERE subscription_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(subscription)
    }

    async fn expire_lapsed(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"UPDATE subscriptions SET status = 'expired', updated_at = NOW()
               WHERE status = 'active' AND end_date < $1"#,
        )
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
