//! Doubles for the clock, audit log and proof storage ports.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::{
        audit_log::{AuditAction, AuditLog},
        clock::Clock,
        proof_storage::{ProofRef, ProofStorage, ProofUpload},
    },
};

use super::date;

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Midnight on the given day.
    pub fn at(y: i32, m: u32, d: u32) -> Self {
        Self(date(y, m, d).and_hms_opt(0, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub target_id: Option<Uuid>,
    pub description: String,
}

/// Audit log that keeps every entry in memory for assertions.
#[derive(Default)]
pub struct RecordingAuditLog {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action)
            .collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn log_action(
        &self,
        actor_id: Uuid,
        action: AuditAction,
        target_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<()> {
        self.entries.lock().unwrap().push(AuditEntry {
            actor_id,
            action,
            target_id,
            description: description.to_string(),
        });
        Ok(())
    }
}

/// Proof storage that keeps file bytes in memory.
#[derive(Default)]
pub struct InMemoryProofStorage {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    discarded: Mutex<usize>,
}

impl InMemoryProofStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proofs currently held (discarded ones are gone).
    pub fn stored_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn discarded_count(&self) -> usize {
        *self.discarded.lock().unwrap()
    }
}

#[async_trait]
impl ProofStorage for InMemoryProofStorage {
    async fn store_proof(&self, upload: ProofUpload) -> AppResult<ProofRef> {
        let ext = upload
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let path = format!("payment_{}.{}", Uuid::new_v4().simple(), ext);
        let sha256 = hex::encode(Sha256::digest(&upload.bytes));

        self.files.lock().unwrap().insert(path.clone(), upload.bytes);
        Ok(ProofRef { path, sha256 })
    }

    async fn discard(&self, proof: &ProofRef) -> AppResult<()> {
        if self.files.lock().unwrap().remove(&proof.path).is_some() {
            *self.discarded.lock().unwrap() += 1;
        }
        Ok(())
    }
}
