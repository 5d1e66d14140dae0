//! Envelope encryption for packaged export bundles
//!
//! Pattern:
//! 1. Generate a random 256-bit data encryption key (DEK) per export
//! 2. Encrypt the bundle with the DEK using AES-256-GCM
//! 3. Wrap the DEK with the tenant master key (KEK), IV prefixed
//! 4. Store ciphertext, IV and wrapped DEK as one length-prefixed blob
//!
//! Master-key rotation is generation-numbered: bundles record which key
//! generation wrapped their DEK, and the provider keeps the previous
//! generation available so archived artifacts stay decryptable through
//! their retention window. Any master-key or wrap failure is fatal to the
//! job; there is no fallback to unencrypted storage.

use crate::config::KmsConfig;
use crate::domain::errors::CryptoError;
use crate::domain::ids::ExportJobId;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

const GCM_IV_LENGTH: usize = 12;
const DEK_LENGTH: usize = 32;
const ALGORITHM: &str = "AES-256-GCM";

/// Encrypted export bundle plus envelope metadata
#[derive(Debug, Clone)]
pub struct EncryptedBundle {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; GCM_IV_LENGTH],
    /// DEK wrapped by the master key, with the wrap IV prefixed
    pub wrapped_dek: Vec<u8>,
    /// Master key generation that wrapped the DEK
    pub key_generation: u32,
    /// SHA-256 of the plaintext, verified after decryption
    pub sha256_hash: String,
    pub algorithm: &'static str,
    pub encrypted_at: DateTime<Utc>,
    pub plaintext_size: usize,
}

impl EncryptedBundle {
    /// Serializes to the storage blob format:
    /// `{generation:u32}{iv_len:u32}{iv}{dek_len:u32}{wrapped_dek}{ciphertext}`
    /// (big-endian lengths). The SHA-256 hash is stored in audit metadata,
    /// not in the blob.
    pub fn to_storage_format(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            4 + 4 + self.iv.len() + 4 + self.wrapped_dek.len() + self.ciphertext.len(),
        );
        out.extend_from_slice(&self.key_generation.to_be_bytes());
        out.extend_from_slice(&(self.iv.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&(self.wrapped_dek.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.wrapped_dek);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parses the storage blob format. The hash must be supplied from audit
    /// metadata by the caller for post-decryption verification.
    pub fn from_storage_format(
        storage: &[u8],
        sha256_hash: String,
    ) -> Result<Self, CryptoError> {
        let truncated = || CryptoError::InvalidBundleFormat("blob truncated".to_string());
        let mut cursor = 0usize;

        let read_u32 = |data: &[u8], at: usize| -> Result<u32, CryptoError> {
            let end = at.checked_add(4).ok_or_else(truncated)?;
            let bytes = data.get(at..end).ok_or_else(truncated)?;
            Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };

        let key_generation = read_u32(storage, cursor)?;
        cursor += 4;

        let iv_len = read_u32(storage, cursor)? as usize;
        cursor += 4;
        if iv_len != GCM_IV_LENGTH {
            return Err(CryptoError::InvalidBundleFormat(format!(
                "unexpected IV length {iv_len}"
            )));
        }
        let iv_bytes = storage.get(cursor..cursor + iv_len).ok_or_else(truncated)?;
        let mut iv = [0u8; GCM_IV_LENGTH];
        iv.copy_from_slice(iv_bytes);
        cursor += iv_len;

        let dek_len = read_u32(storage, cursor)? as usize;
        cursor += 4;
        let wrapped_dek = storage
            .get(cursor..cursor + dek_len)
            .ok_or_else(truncated)?
            .to_vec();
        cursor += dek_len;

        let ciphertext = storage.get(cursor..).ok_or_else(truncated)?.to_vec();

        Ok(Self {
            plaintext_size: 0,
            ciphertext,
            iv,
            wrapped_dek,
            key_generation,
            sha256_hash,
            algorithm: ALGORITHM,
            encrypted_at: Utc::now(),
        })
    }
}

/// Master key material for one generation
struct MasterKey {
    generation: u32,
    key: [u8; DEK_LENGTH],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Envelope encryption service backed by generation-numbered master keys
pub struct KmsEncryptionService {
    current: MasterKey,
    previous: Option<MasterKey>,
}

impl KmsEncryptionService {
    /// Builds the service from validated KMS configuration.
    pub fn from_config(config: &KmsConfig) -> Result<Self, CryptoError> {
        let current = MasterKey {
            generation: config.current_generation,
            key: decode_key_hex(config.master_key.expose_secret().as_ref())?,
        };
        let previous = match &config.previous_key {
            Some(previous) if config.current_generation > 1 => Some(MasterKey {
                generation: config.current_generation - 1,
                key: decode_key_hex(previous.expose_secret().as_ref())?,
            }),
            _ => None,
        };
        Ok(Self { current, previous })
    }

    /// Encrypts an export bundle under a fresh DEK wrapped by the current
    /// master key generation.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        job_id: ExportJobId,
    ) -> Result<EncryptedBundle, CryptoError> {
        let started = std::time::Instant::now();

        let mut dek = [0u8; DEK_LENGTH];
        OsRng.fill_bytes(&mut dek);

        let mut iv = [0u8; GCM_IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let wrapped_dek = self.wrap_dek(&dek)?;
        dek.zeroize();

        let sha256_hash = sha256_hex(plaintext);

        tracing::info!(
            job_id = %job_id,
            plaintext_bytes = plaintext.len(),
            ciphertext_bytes = ciphertext.len(),
            key_generation = self.current.generation,
            duration_ms = started.elapsed().as_millis() as u64,
            "Export bundle encrypted"
        );

        Ok(EncryptedBundle {
            plaintext_size: plaintext.len(),
            ciphertext,
            iv,
            wrapped_dek,
            key_generation: self.current.generation,
            sha256_hash,
            algorithm: ALGORITHM,
            encrypted_at: Utc::now(),
        })
    }

    /// Decrypts a bundle, resolving the master key by generation and
    /// verifying the plaintext hash.
    pub fn decrypt(&self, bundle: &EncryptedBundle) -> Result<Vec<u8>, CryptoError> {
        let master = self.key_for_generation(bundle.key_generation)?;

        let mut dek = self.unwrap_dek(&bundle.wrapped_dek, master)?;
        let cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        dek.zeroize();

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&bundle.iv), bundle.ciphertext.as_ref())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        if sha256_hex(&plaintext) != bundle.sha256_hash {
            return Err(CryptoError::IntegrityCheckFailed);
        }

        Ok(plaintext)
    }

    fn key_for_generation(&self, generation: u32) -> Result<&MasterKey, CryptoError> {
        if generation == self.current.generation {
            return Ok(&self.current);
        }
        if let Some(previous) = &self.previous {
            if generation == previous.generation {
                return Ok(previous);
            }
        }
        Err(CryptoError::UnknownKeyGeneration(generation))
    }

    /// Wraps the DEK with the current master key; the wrap IV is prefixed.
    fn wrap_dek(&self, dek: &[u8; DEK_LENGTH]) -> Result<Vec<u8>, CryptoError> {
        let mut wrap_iv = [0u8; GCM_IV_LENGTH];
        OsRng.fill_bytes(&mut wrap_iv);

        let kek = Aes256Gcm::new_from_slice(&self.current.key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let wrapped = kek
            .encrypt(Nonce::from_slice(&wrap_iv), dek.as_ref())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(GCM_IV_LENGTH + wrapped.len());
        out.extend_from_slice(&wrap_iv);
        out.extend_from_slice(&wrapped);
        Ok(out)
    }

    fn unwrap_dek(
        &self,
        wrapped_dek: &[u8],
        master: &MasterKey,
    ) -> Result<[u8; DEK_LENGTH], CryptoError> {
        if wrapped_dek.len() <= GCM_IV_LENGTH {
            return Err(CryptoError::InvalidBundleFormat(
                "wrapped data key too short".to_string(),
            ));
        }
        let (wrap_iv, wrapped) = wrapped_dek.split_at(GCM_IV_LENGTH);

        let kek = Aes256Gcm::new_from_slice(&master.key)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        let mut dek_bytes = kek
            .decrypt(Nonce::from_slice(wrap_iv), wrapped)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        if dek_bytes.len() != DEK_LENGTH {
            dek_bytes.zeroize();
            return Err(CryptoError::InvalidBundleFormat(
                "unwrapped data key has wrong length".to_string(),
            ));
        }
        let mut dek = [0u8; DEK_LENGTH];
        dek.copy_from_slice(&dek_bytes);
        dek_bytes.zeroize();
        Ok(dek)
    }
}

/// Hex-encoded SHA-256 of raw bytes
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

pub(crate) fn decode_key_hex(hex: &str) -> Result<[u8; DEK_LENGTH], CryptoError> {
    if hex.len() != DEK_LENGTH * 2 {
        return Err(CryptoError::MasterKeyUnavailable(format!(
            "master key must be {} hex characters, got {}",
            DEK_LENGTH * 2,
            hex.len()
        )));
    }
    let mut out = [0u8; DEK_LENGTH];
    for (i, slot) in out.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *slot = u8::from_str_radix(pair, 16).map_err(|_| {
            CryptoError::MasterKeyUnavailable("master key contains non-hex characters".to_string())
        })?;
    }
    Ok(out)
}
