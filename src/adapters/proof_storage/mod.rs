use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::proof_storage::{ProofRef, ProofStorage, ProofUpload},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProofKind {
    Jpeg,
    Png,
    Pdf,
}

impl ProofKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(ProofKind::Jpeg),
            "png" => Some(ProofKind::Png),
            "pdf" => Some(ProofKind::Pdf),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.split(';').next().unwrap_or_default().trim() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ProofKind::Jpeg),
            "image/png" => Some(ProofKind::Png),
            "application/pdf" => Some(ProofKind::Pdf),
            _ => None,
        }
    }

    /// Identifies the file from its leading bytes.
    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ProofKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ProofKind::Png)
        } else if bytes.starts_with(b"%PDF-") {
            Some(ProofKind::Pdf)
        } else {
            None
        }
    }
}

/// Stores payment proofs as files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalProofStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalProofStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the lowercased extension once the upload passes the type and size gate.
    fn validate(&self, upload: &ProofUpload) -> AppResult<String> {
        let invalid_type =
            || AppError::InvalidInput("Only JPG, JPEG, PNG and PDF files are allowed".into());

        let ext = Path::new(&upload.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(invalid_type)?;
        let kind = ProofKind::from_extension(&ext).ok_or_else(invalid_type)?;

        if upload.bytes.is_empty() {
            return Err(AppError::InvalidInput("Payment proof file is empty".into()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::InvalidInput(format!(
                "Payment proof must be at most {} MB",
                self.max_bytes / (1024 * 1024)
            )));
        }

        if let Some(content_type) = upload.content_type.as_deref()
            && content_type != "application/octet-stream"
            && ProofKind::from_content_type(content_type) != Some(kind)
        {
            return Err(invalid_type());
        }
        if ProofKind::sniff(&upload.bytes) != Some(kind) {
            return Err(AppError::InvalidInput(
                "File content does not match its extension".into(),
            ));
        }
        Ok(ext)
    }

    /// Only bare file names this storage generated are accepted back.
    fn resolve(&self, proof: &ProofRef) -> AppResult<PathBuf> {
        let name = proof.path.as_str();
        let is_plain = !name.is_empty()
            && !name.contains(['/', '\\'])
            && name != "."
            && name != ".."
            && name.starts_with("payment_");
        if !is_plain {
            return Err(AppError::ProofStorage(format!(
                "Refusing to touch proof outside storage root: {}",
                name
            )));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ProofStorage for LocalProofStorage {
    async fn store_proof(&self, upload: ProofUpload) -> AppResult<ProofRef> {
        let ext = self.validate(&upload)?;

        let file_name = format!("payment_{}.{}", Uuid::new_v4().simple(), ext);
        let sha256 = hex::encode(Sha256::digest(&upload.bytes));

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::ProofStorage(format!("Failed to create upload dir: {e}")))?;
        tokio::fs::write(self.root.join(&file_name), &upload.bytes)
            .await
            .map_err(|e| AppError::ProofStorage(format!("Failed to write proof: {e}")))?;

        tracing::debug!(
            proof = %file_name,
            bytes = upload.bytes.len(),
            sha256 = %sha256,
            "Stored payment proof"
        );
        Ok(ProofRef {
            path: file_name,
            sha256,
        })
    }

    async fn discard(&self, proof: &ProofRef) -> AppResult<()> {
        let path = self.resolve(proof)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::ProofStorage(format!(
                "Failed to remove proof {}: {e}",
                proof.path
            ))),
        }
    }
}
