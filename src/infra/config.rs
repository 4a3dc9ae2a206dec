use std::{net::SocketAddr, path::PathBuf};

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;

pub const DEFAULT_MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

pub struct AppConfig {
    /// Shared with the identity service that mints access tokens.
    pub jwt_secret: SecretString,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Directory payment proofs are written to.
    pub upload_dir: PathBuf,
    pub max_proof_bytes: usize,
    /// How often lapsed active subscriptions are marked expired.
    pub expiry_sweep_secs: u64,
    /// Destination of the JSON log layer.
    pub log_file: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let database_url: String = get_env("DATABASE_URL");

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|e| anyhow::anyhow!("CORS_ORIGIN must be a valid header value: {e}"))?;
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 5);
        let upload_dir: String = get_env_default("UPLOAD_DIR", "uploads/payments".to_string());
        let max_proof_bytes: usize = get_env_default("MAX_PROOF_BYTES", DEFAULT_MAX_PROOF_BYTES);
        let expiry_sweep_secs: u64 = get_env_default("EXPIRY_SWEEP_SECS", 3600);
        let log_file: String = get_env_default("LOG_FILE", "app.log".to_string());

        if max_proof_bytes == 0 {
            anyhow::bail!("MAX_PROOF_BYTES must be greater than zero");
        }
        if expiry_sweep_secs == 0 {
            anyhow::bail!("EXPIRY_SWEEP_SECS must be greater than zero");
        }

        Ok(Self {
            jwt_secret,
            cors_origin,
            bind_addr,
            database_url,
            db_max_connections,
            upload_dir: PathBuf::from(upload_dir),
            max_proof_bytes,
            expiry_sweep_secs,
            log_file,
        })
    }
}
