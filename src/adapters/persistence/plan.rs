use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::plan_catalog::{
        PlanInput, PlanProfile, PlanRepo, PlanUsage, UsageGuard,
    },
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PlanProfile {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let features: Vec<String> =
        parse_json_with_fallback(&features_json, "features", "plan", &id.to_string());

    PlanProfile {
        id,
        name: row.get("name"),
        price_cents: row.get("price_cents"),
        duration_months: row.get("duration_months"),
        features,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, price_cents, duration_months, features,
    created_by, created_at, updated_at, deleted_at
"#;

/// Locks the plan row for update and counts its subscriptions. Activations
/// take the same row in share mode, so the counts hold until commit.
async fn lock_plan_usage(conn: &mut PgConnection, id: Uuid) -> AppResult<PlanUsage> {
    sqlx::query("SELECT id FROM plans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::PlanNotFound)?;

    let row = sqlx::query(
        r#"SELECT COUNT(*) FILTER (WHERE status = 'active') AS active, COUNT(*) AS total
           FROM subscriptions
           WHERE plan_id = $1"#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(AppError::from)?;
    Ok(PlanUsage {
        active: row.get("active"),
        total: row.get("total"),
    })
}

fn features_json(features: &[String]) -> AppResult<serde_json::Value> {
    serde_json::to_value(features)
        .map_err(|e| AppError::Internal(format!("Failed to serialize plan features: {e}")))
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PlanProfile>> {
        let row = sqlx::query(&format!("SELECT {} FROM plans WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list(&self, include_inactive: bool) -> AppResult<Vec<PlanProfile>> {
        let query = if include_inactive {
            format!(
                "SELECT {} FROM plans ORDER BY deleted_at NULLS FIRST, price_cents, name",
                SELECT_COLS
            )
        } else {
            format!(
                "SELECT {} FROM plans WHERE deleted_at IS NULL ORDER BY price_cents, name",
                SELECT_COLS
            )
        };
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn create(&self, created_by: Uuid, input: &PlanInput) -> AppResult<PlanProfile> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO plans (id, name, price_cents, duration_months, features, created_by)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.price_cents)
        .bind(input.duration_months)
        .bind(features_json(&input.features)?)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn update(
        &self,
        id: Uuid,
        input: &PlanInput,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        guard(&lock_plan_usage(&mut tx, id).await?)?;

        let row = sqlx::query(&format!(
            r#"UPDATE plans
               SET name = $2, price_cents = $3, duration_months = $4, features = $5,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.price_cents)
        .bind(input.duration_months)
        .bind(features_json(&input.features)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn set_deleted_at(
        &self,
        id: Uuid,
        deleted_at: Option<NaiveDateTime>,
        guard: UsageGuard,
    ) -> AppResult<PlanProfile> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        guard(&lock_plan_usage(&mut tx, id).await?)?;

        let row = sqlx::query(&format!(
            "UPDATE plans SET deleted_at = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            SELECT_COLS
        ))
        .bind(id)
        .bind(deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn delete(&self, id: Uuid, guard: UsageGuard) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        guard(&lock_plan_usage(&mut tx, id).await?)?;

        sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }
}
