use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Member => "member",
        }
    }

    /// Admins and staff can verify payments and manage members' subscriptions.
    pub fn is_staff_or_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "member" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn require_any(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_staff_or_admin(&self) -> AppResult<()> {
        self.require_any(&[Role::Admin, Role::Staff])
    }

    /// Members may only act on their own records; staff and admins on anyone's.
    pub fn require_self_or_staff(&self, owner_id: Uuid) -> AppResult<()> {
        if self.role.is_staff_or_admin() || self.id == owner_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}
