use super::encryption::{KdfParams, Sealed, NONCE_LEN, SALT_LEN};
use crate::errors::CoreError;

/// Magic bytes at the start of every encrypted backup.
pub const MAGIC: &[u8; 4] = b"CPTB";

pub const BACKUP_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf(12) + salt(16) + nonce(12) + length(8)
pub const HEADER_LEN: usize = 4 + 2 + 12 + SALT_LEN + NONCE_LEN + 8;

/// Encrypted backup container.
///
/// ```text
/// [CPTB][version u16 LE][memory u32][time u32][parallelism u32]
/// [salt 16B][nonce 12B][ciphertext length u64 LE][ciphertext]
/// ```
#[derive(Debug, Clone)]
pub struct BackupFile {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub sealed: Sealed,
}

impl BackupFile {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.sealed.ciphertext.len());
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.memory_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf_params.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.sealed.salt);
        buf.extend_from_slice(&self.sealed.nonce);
        buf.extend_from_slice(&(self.sealed.ciphertext.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.sealed.ciphertext);
        buf
    }

    /// Parse and sanity-check a backup. Does not decrypt.
    pub fn parse(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::InvalidFileFormat(
                "Data too short to be a backup".into(),
            ));
        }
        if &data[..4] != MAGIC {
            return Err(CoreError::InvalidFileFormat(
                "Missing backup magic bytes".into(),
            ));
        }

        let mut reader = Reader { data, pos: 4 };
        let version = u16::from_le_bytes(reader.take()?);
        if version == 0 || version > BACKUP_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let kdf_params = KdfParams {
            memory_cost: u32::from_le_bytes(reader.take()?),
            time_cost: u32::from_le_bytes(reader.take()?),
            parallelism: u32::from_le_bytes(reader.take()?),
        };
        kdf_params.validate()?;

        let salt: [u8; SALT_LEN] = reader.take()?;
        let nonce: [u8; NONCE_LEN] = reader.take()?;
        let len = u64::from_le_bytes(reader.take()?) as usize;

        let rest = &data[reader.pos..];
        if rest.len() < len {
            return Err(CoreError::InvalidFileFormat(format!(
                "Backup truncated: expected {len} bytes of ciphertext, got {}",
                rest.len()
            )));
        }

        Ok(Self {
            version,
            kdf_params,
            sealed: Sealed {
                salt,
                nonce,
                ciphertext: rest[..len].to_vec(),
            },
        })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], CoreError> {
        let end = self.pos + N;
        let bytes: [u8; N] = self
            .data
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CoreError::InvalidFileFormat("Backup header truncated".into()))?;
        self.pos = end;
        Ok(bytes)
    }
}
