use crate::errors::CoreError;
use crate::models::snapshot::PortfolioSnapshot;

use super::encryption::{self, KdfParams};
use super::format::{BackupFile, BACKUP_VERSION};

/// Password-protected export of a [`PortfolioSnapshot`].
pub struct BackupManager;

impl BackupManager {
    /// Encrypt a snapshot into portable backup bytes.
    ///
    /// Flow: snapshot → bincode → AES-256-GCM(Argon2id(password)) → CPTB bytes
    pub fn export(snapshot: &PortfolioSnapshot, password: &str) -> Result<Vec<u8>, CoreError> {
        Self::export_with_params(snapshot, password, KdfParams::default())
    }

    /// Same as [`BackupManager::export`] with explicit KDF costs.
    pub fn export_with_params(
        snapshot: &PortfolioSnapshot,
        password: &str,
        kdf_params: KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        if password.is_empty() {
            return Err(CoreError::InvalidInput(
                "Backup password must not be empty".into(),
            ));
        }
        kdf_params.validate()?;

        let plaintext = bincode::serialize(snapshot)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshot: {e}")))?;
        let sealed = encryption::seal(&plaintext, password, &kdf_params)?;

        Ok(BackupFile {
            version: BACKUP_VERSION,
            kdf_params,
            sealed,
        }
        .to_bytes())
    }

    /// Decrypt backup bytes back into a snapshot. The snapshot still has to
    /// pass import validation before it replaces anything.
    pub fn import(data: &[u8], password: &str) -> Result<PortfolioSnapshot, CoreError> {
        let file = BackupFile::parse(data)?;
        let plaintext = encryption::open(&file.sealed, password, &file.kdf_params)?;
        bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize snapshot: {e}")))
    }
}
