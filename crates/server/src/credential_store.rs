//! Generic credential store trait for encrypted JSON-file-backed records.
//!
//! Provides a [`CredentialStore`] trait with associated types and default method
//! implementations for list/get/add/delete. Shared encryption helpers
//! (`encrypt_password`, `decrypt_password`, `load_or_generate_key`) and
//! `slugify` live here too.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

/// Env var holding a 64-hex-char AES-256 key; overrides the key file.
pub(crate) const ENCRYPTION_KEY_ENV: &str = "SMARTD_ENCRYPTION_KEY";

/// Errors produced by the JSON-file stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Crypto(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
}

// ── Encryption helpers ────────────────────────────────────────────

/// Encrypt a password using AES-256-GCM. Returns "iv:tag:ciphertext" in hex.
pub(crate) fn encrypt_password(key: &[u8; 32], plaintext: &str) -> Result<String, StoreError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::Crypto(format!("Failed to create cipher: {}", e)))?;

    let mut iv_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut iv_bytes);
    let nonce = Nonce::from_slice(&iv_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| StoreError::Crypto(format!("Encryption failed: {}", e)))?;

    // AES-GCM appends the 16-byte tag to the ciphertext.
    let tag_offset = ciphertext.len() - 16;
    let ct = &ciphertext[..tag_offset];
    let tag = &ciphertext[tag_offset..];

    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv_bytes),
        hex::encode(tag),
        hex::encode(ct)
    ))
}

/// Decrypt a password from "iv:tag:ciphertext" hex format.
pub(crate) fn decrypt_password(key: &[u8; 32], encrypted: &str) -> Result<String, StoreError> {
    let parts: Vec<&str> = encrypted.splitn(3, ':').collect();
    if parts.len() != 3 {
        return Err(StoreError::Crypto(
            "Invalid encrypted password format (expected iv:tag:ciphertext)".to_string(),
        ));
    }

    let decode = |s: &str| hex::decode(s).map_err(|e| StoreError::Crypto(format!("Invalid hex: {}", e)));
    let iv_bytes = decode(parts[0])?;
    let tag_bytes = decode(parts[1])?;
    let ct_bytes = decode(parts[2])?;

    if iv_bytes.len() != 12 || tag_bytes.len() != 16 {
        return Err(StoreError::Crypto("Invalid IV or tag length".to_string()));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| StoreError::Crypto(format!("Failed to create cipher: {}", e)))?;
    let nonce = Nonce::from_slice(&iv_bytes);

    let mut combined = ct_bytes;
    combined.extend_from_slice(&tag_bytes);

    let plaintext = cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|e| StoreError::Crypto(format!("Decryption failed: {}", e)))?;

    String::from_utf8(plaintext).map_err(|e| StoreError::Crypto(e.to_string()))
}

// ── Key management ────────────────────────────────────────────────

fn parse_key(hex_key: &str, source: &str) -> Result<[u8; 32], StoreError> {
    let key_bytes = hex::decode(hex_key.trim())
        .map_err(|e| StoreError::Crypto(format!("{} is not valid hex: {}", source, e)))?;
    if key_bytes.len() != 32 {
        return Err(StoreError::Crypto(format!(
            "{} must be 64 hex characters (32 bytes), got {} bytes",
            source,
            key_bytes.len()
        )));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&key_bytes);
    Ok(key)
}

/// Load encryption key from `SMARTD_ENCRYPTION_KEY` or auto-generate
/// in `{data_dir}/.conn_key`.
pub(crate) fn load_or_generate_key(data_dir: &Path) -> Result<[u8; 32], StoreError> {
    if let Ok(env_key) = std::env::var(ENCRYPTION_KEY_ENV) {
        let key = parse_key(&env_key, ENCRYPTION_KEY_ENV)?;
        info!("Using encryption key from {} env var", ENCRYPTION_KEY_ENV);
        return Ok(key);
    }

    let key_path = data_dir.join(".conn_key");
    if key_path.exists() {
        let hex_key = std::fs::read_to_string(&key_path)?;
        let key = parse_key(&hex_key, &key_path.display().to_string())?;
        info!("Loaded encryption key from {}", key_path.display());
        return Ok(key);
    }

    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&key_path, hex::encode(key))?;
    info!("Generated new encryption key at {}", key_path.display());
    Ok(key)
}

// ── Slug generation ──────────────────────────────────────────────

/// Lowercase, replace non-alphanumeric with `-`, collapse consecutive
/// dashes, trim leading/trailing dashes.
pub(crate) fn slugify(name: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = false;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            result.push(c);
            last_was_dash = false;
        } else {
            if !last_was_dash && !result.is_empty() {
                result.push('-');
            }
            last_was_dash = true;
        }
    }
    if result.ends_with('-') {
        result.pop();
    }
    result
}

// ── JSON file helpers ────────────────────────────────────────────

/// Read a JSON array file, treating a missing file as empty.
pub(crate) fn read_json_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Write records via a temp file + rename so readers never see a torn file.
pub(crate) fn write_json_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ── CredentialStore trait ──────────────────────────────────────────

/// Generic trait for encrypted JSON-file-backed credential stores.
///
/// - `Config`: full internal record with decrypted secrets
/// - `Safe`: API-facing version with masked secrets
/// - `Input`: creation payload
/// - `Stored`: on-disk encrypted form (serialized to JSON)
pub(crate) trait CredentialStore {
    type Config: Clone;
    type Safe: Clone + Serialize;
    type Input;
    type Stored: Serialize + DeserializeOwned + Clone;

    /// Path to the JSON file backing this store.
    fn store_path(&self) -> PathBuf;

    /// Human-readable type name for log messages.
    fn type_name() -> &'static str;

    fn generate_id(input: &Self::Input) -> String;

    fn stored_id(stored: &Self::Stored) -> &str;

    fn encrypt_record(
        &self,
        id: &str,
        input: &Self::Input,
        created_at: &str,
        updated_at: &str,
    ) -> Result<Self::Stored, StoreError>;

    fn decrypt_record(&self, stored: &Self::Stored) -> Result<Self::Config, StoreError>;

    fn config_to_safe(config: &Self::Config) -> Self::Safe;

    /// Build a safe fallback directly from a stored record when decryption fails.
    fn stored_to_fallback_safe(stored: &Self::Stored) -> Self::Safe;

    // ── Default implementations ──────────────────────────────────

    fn load_stored(&self) -> Result<Vec<Self::Stored>, StoreError> {
        read_json_records(&self.store_path())
    }

    fn save_stored(&self, records: &[Self::Stored]) -> Result<(), StoreError> {
        write_json_records(&self.store_path(), records)
    }

    /// Get a single record by ID with decrypted secrets (internal use).
    fn get(&self, id: &str) -> Result<Option<Self::Config>, StoreError> {
        let stored = self.load_stored()?;
        match stored.iter().find(|s| Self::stored_id(s) == id) {
            Some(s) => Ok(Some(self.decrypt_record(s)?)),
            None => Ok(None),
        }
    }

    /// Add a new record. Returns the created record (safe).
    fn add(&self, input: &Self::Input) -> Result<Self::Safe, StoreError> {
        let mut stored = self.load_stored()?;
        let id = Self::generate_id(input);

        if stored.iter().any(|s| Self::stored_id(s) == id) {
            return Err(StoreError::Conflict(format!(
                "{} with id '{}' already exists",
                Self::type_name(),
                id
            )));
        }

        // Fixed-width timestamps so records sort lexically by creation time.
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        let record = self.encrypt_record(&id, input, &now, &now)?;
        stored.push(record.clone());
        self.save_stored(&stored)?;

        let config = self.decrypt_record(&record)?;
        info!("Added {} '{}'", Self::type_name(), id);
        Ok(Self::config_to_safe(&config))
    }

    /// Delete a record by ID. Returns true if it existed.
    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut stored = self.load_stored()?;
        let len_before = stored.len();
        stored.retain(|s| Self::stored_id(s) != id);
        if stored.len() == len_before {
            return Ok(false);
        }
        self.save_stored(&stored)?;
        info!("Deleted {} '{}'", Self::type_name(), id);
        Ok(true)
    }
}
