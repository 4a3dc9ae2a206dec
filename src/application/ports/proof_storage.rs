use async_trait::async_trait;
use serde::Serialize;

use crate::app_error::AppResult;

/// An uploaded payment proof as received from the caller.
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Durable handle to a stored proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofRef {
    pub path: String,
    pub sha256: String,
}

#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Validates type and size, then persists the file under a generated name.
    async fn store_proof(&self, upload: ProofUpload) -> AppResult<ProofRef>;

    /// Removes a proof whose owning transaction did not commit.
    async fn discard(&self, proof: &ProofRef) -> AppResult<()>;
}

/// Discards a stored proof, logging instead of failing. Used on rollback paths
/// where the original error is the one the caller needs to see.
pub async fn discard_best_effort(storage: &dyn ProofStorage, proof: &ProofRef) {
    if let Err(e) = storage.discard(proof).await {
        tracing::warn!(proof = %proof.path, error = ?e, "Failed to discard orphaned payment proof");
    }
}
