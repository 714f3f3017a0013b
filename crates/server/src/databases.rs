//! Saved Neo4j databases with AES-256-GCM encryption at rest.
//!
//! Every user owns a list of databases stored in `{DATA_DIR}/databases.json`.
//! Server passwords are encrypted with the key from `SMARTD_ENCRYPTION_KEY`
//! or the auto-generated `{DATA_DIR}/.conn_key`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use smartd_connector::ConnectionTarget;

use crate::credential_store::{
    self, encrypt_password, load_or_generate_key, slugify, CredentialStore, StoreError,
};

/// Full database record with decrypted password (internal use only).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub id: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DatabaseConfig {
    /// Connection parameters for this database.
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget {
            uri: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// JSON-safe version with masked password.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DatabaseSafe {
    pub id: String,
    pub url: String,
    pub username: String,
    pub password: &'static str,
    pub created_at: String,
    pub updated_at: String,
}

/// A database to remember for `owner`, already validated.
#[derive(Debug, Clone)]
pub struct DatabaseInput {
    pub owner: String,
    pub target: ConnectionTarget,
}

/// On-disk format: passwords stored as encrypted hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredDatabase {
    id: String,
    owner: String,
    url: String,
    username: String,
    encrypted_password: String, // iv:tag:ciphertext in hex
    created_at: String,
    updated_at: String,
}

pub struct DatabaseStore {
    data_dir: PathBuf,
    key: [u8; 32],
}

impl DatabaseStore {
    /// Create a new store, loading or generating the encryption key.
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        let key = load_or_generate_key(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            key,
        })
    }

    /// Databases saved by `owner`, oldest first.
    pub fn list_for(&self, owner: &str) -> Result<Vec<DatabaseSafe>, StoreError> {
        let mut stored = self.load_stored()?;
        stored.retain(|s| s.owner == owner);
        stored.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stored.iter().map(Self::stored_to_fallback_safe).collect())
    }

    /// Number of saved databases across all owners. Nothing is decrypted.
    pub fn count_all(&self) -> Result<usize, StoreError> {
        Ok(self.load_stored()?.len())
    }

    /// The database `owner` saved under `url`, with its password decrypted.
    pub fn find(&self, owner: &str, url: &str) -> Result<Option<DatabaseConfig>, StoreError> {
        self.get(&database_id(owner, url))
    }

    /// URL of the most recently added database of `owner`. Nothing is
    /// decrypted, so this works even when the stored secret is unreadable.
    pub fn latest_url_for(&self, owner: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .load_stored()?
            .into_iter()
            .filter(|s| s.owner == owner)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .map(|s| s.url))
    }

    /// Save a database for its owner. Fails with `Conflict` if the owner
    /// already has one at the same URL.
    pub fn add_for(&self, input: &DatabaseInput) -> Result<DatabaseSafe, StoreError> {
        self.add(input).map_err(|e| match e {
            StoreError::Conflict(_) => StoreError::Conflict("This database is already added.".to_string()),
            other => other,
        })
    }

    pub fn delete_for(&self, owner: &str, url: &str) -> Result<bool, StoreError> {
        self.delete(&database_id(owner, url))
    }
}

/// Stable id for an (owner, url) pair: the owner's slug plus a short digest.
fn database_id(owner: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_bytes());
    hasher.update([0u8]);
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", slugify(owner), &digest[..12])
}

impl CredentialStore for DatabaseStore {
    type Config = DatabaseConfig;
    type Safe = DatabaseSafe;
    type Input = DatabaseInput;
    type Stored = StoredDatabase;

    fn store_path(&self) -> PathBuf {
        self.data_dir.join("databases.json")
    }

    fn type_name() -> &'static str {
        "database"
    }

    fn generate_id(input: &Self::Input) -> String {
        database_id(&input.owner, &input.target.uri)
    }

    fn stored_id(stored: &Self::Stored) -> &str {
        &stored.id
    }

    fn encrypt_record(
        &self,
        id: &str,
        input: &Self::Input,
        created_at: &str,
        updated_at: &str,
    ) -> Result<Self::Stored, StoreError> {
        let encrypted_password = encrypt_password(&self.key, &input.target.password)?;
        Ok(StoredDatabase {
            id: id.to_string(),
            owner: input.owner.clone(),
            url: input.target.uri.clone(),
            username: input.target.username.clone(),
            encrypted_password,
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
        })
    }

    fn decrypt_record(&self, stored: &Self::Stored) -> Result<Self::Config, StoreError> {
        let password = credential_store::decrypt_password(&self.key, &stored.encrypted_password)?;
        Ok(DatabaseConfig {
            id: stored.id.clone(),
            url: stored.url.clone(),
            username: stored.username.clone(),
            password,
            created_at: stored.created_at.clone(),
            updated_at: stored.updated_at.clone(),
        })
    }

    fn config_to_safe(config: &Self::Config) -> Self::Safe {
        DatabaseSafe {
            id: config.id.clone(),
            url: config.url.clone(),
            username: config.username.clone(),
            password: "********",
            created_at: config.created_at.clone(),
            updated_at: config.updated_at.clone(),
        }
    }

    fn stored_to_fallback_safe(stored: &Self::Stored) -> Self::Safe {
        DatabaseSafe {
            id: stored.id.clone(),
            url: stored.url.clone(),
            username: stored.username.clone(),
            password: "********",
            created_at: stored.created_at.clone(),
            updated_at: stored.updated_at.clone(),
        }
    }
}
