use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::role::{Actor, Role};

/// Access token claims. Tokens are minted by the identity service; this
/// service only verifies them and reads the caller's id and role.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn actor(&self) -> AppResult<Actor> {
        let id = Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidCredentials)?;
        Ok(Actor::new(id, self.role))
    }
}

/// Mints a token the way the identity service does. Only tests need one.
#[cfg(test)]
pub fn issue(
    user_id: Uuid,
    role: Role,
    secret: &secrecy::SecretString,
    ttl: time::Duration,
) -> AppResult<String> {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use time::OffsetDateTime;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let exp = now + ttl.whole_seconds();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now,
        exp,
    };
    let header = Header::new(Algorithm::HS256);
    encode(
        &header,
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        AppError::InvalidCredentials
    })
}
