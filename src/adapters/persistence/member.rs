use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{MemberProfile, MemberRepo},
    domain::entities::role::Role,
};

// Member as stored by the identity service.
#[derive(sqlx::FromRow, Debug)]
struct MemberDb {
    id: Uuid,
    role: Role,
    is_verified: bool,
    is_deleted: bool,
}

impl From<MemberDb> for MemberProfile {
    fn from(m: MemberDb) -> Self {
        MemberProfile {
            id: m.id,
            role: m.role,
            is_verified: m.is_verified,
            is_deleted: m.is_deleted,
        }
    }
}

#[async_trait]
impl MemberRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<MemberProfile>> {
        let member = sqlx::query_as::<_, MemberDb>(
            r#"SELECT id, role, is_verified, deleted_at IS NOT NULL AS is_deleted
               FROM members WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(member.map(MemberProfile::from))
    }
}
