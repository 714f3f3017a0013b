//! Local user accounts stored in `{DATA_DIR}/users.json`.
//!
//! Passwords are kept as Argon2id hashes in PHC string format; the
//! plaintext never touches disk.

use std::path::{Path, PathBuf};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::credential_store::{read_json_records, write_json_records, StoreError};

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    username: String,
    password_hash: String,
    date_joined: String,
    #[serde(default)]
    last_login: Option<String>,
}

pub struct UserStore {
    data_dir: PathBuf,
}

impl UserStore {
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn store_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    fn load(&self) -> Result<Vec<StoredUser>, StoreError> {
        read_json_records(&self.store_path())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }

    pub fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.iter().any(|u| u.username == username))
    }

    /// Register a new account. The caller is expected to have run
    /// [`validate_signup`] first.
    pub fn create(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let mut users = self.load()?;
        if users.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict(
                "A user with that username already exists.".to_string(),
            ));
        }
        users.push(StoredUser {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            date_joined: chrono::Utc::now().to_rfc3339(),
            last_login: None,
        });
        write_json_records(&self.store_path(), &users)?;
        info!("Created user '{}'", username);
        Ok(())
    }

    /// Check a username/password pair. Unknown users simply fail to verify.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        Ok(self
            .load()?
            .iter()
            .find(|u| u.username == username)
            .is_some_and(|u| verify_password(&u.password_hash, password)))
    }

    /// Remove an account. Returns true if it existed.
    pub fn delete(&self, username: &str) -> Result<bool, StoreError> {
        let mut users = self.load()?;
        let before = users.len();
        users.retain(|u| u.username != username);
        if users.len() == before {
            return Ok(false);
        }
        write_json_records(&self.store_path(), &users)?;
        info!("Deleted user '{}'", username);
        Ok(true)
    }

    pub fn record_login(&self, username: &str) -> Result<(), StoreError> {
        let mut users = self.load()?;
        if let Some(user) = users.iter_mut().find(|u| u.username == username) {
            user.last_login = Some(chrono::Utc::now().to_rfc3339());
            write_json_records(&self.store_path(), &users)?;
        }
        Ok(())
    }
}

/// Reject usernames and passwords the account system will not accept.
pub fn validate_signup(username: &str, password: &str) -> Result<(), StoreError> {
    if username.is_empty() {
        return Err(StoreError::Invalid("Username is required.".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(StoreError::Invalid(format!(
            "Username must be at most {} characters.",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(StoreError::Invalid(
            "Username may contain only letters, digits and @/./+/-/_ characters.".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StoreError::Invalid(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Crypto(format!("Failed to hash password: {}", e)))
}

fn verify_password(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path()).unwrap();

        store.create("alice", "correct horse").unwrap();
        assert!(store.exists("alice").unwrap());
        assert!(store.verify("alice", "correct horse").unwrap());
        assert!(!store.verify("alice", "wrong horse!").unwrap());
        assert!(!store.verify("bob", "correct horse").unwrap());

        let raw = std::fs::read_to_string(tmp.path().join("users.json")).unwrap();
        assert!(!raw.contains("correct horse"));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path()).unwrap();
        store.create("alice", "password1").unwrap();
        assert!(matches!(
            store.create("alice", "password2"),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        let a = hash_password("password1").unwrap();
        let b = hash_password("password1").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_password(&a, "password1"));
        assert!(verify_password(&b, "password1"));
        assert!(!verify_password(&a, "password2"));
        assert!(!verify_password("not-a-hash", "password1"));
    }

    #[test]
    fn test_stored_hash_is_argon2() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path()).unwrap();
        store.create("alice", "password1").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("users.json")).unwrap()).unwrap();
        let hash = raw[0]["password_hash"].as_str().unwrap();
        assert!(hash.starts_with("$argon2id$"), "{}", hash);
    }

    #[test]
    fn test_delete_user() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path()).unwrap();
        store.create("alice", "password1").unwrap();
        store.create("bob", "password2").unwrap();

        assert!(store.delete("alice").unwrap());
        assert!(!store.delete("alice").unwrap());
        assert!(!store.exists("alice").unwrap());
        assert!(store.verify("bob", "password2").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_record_login_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UserStore::new(tmp.path()).unwrap();
        store.create("alice", "password1").unwrap();
        store.record_login("alice").unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("users.json")).unwrap();
        assert!(raw.contains("last_login"));
        assert!(!raw.contains("\"last_login\": null"));
    }

    #[test]
    fn test_signup_validation() {
        assert!(validate_signup("alice", "longenough").is_ok());
        assert!(validate_signup("a.b+c@d-e_f", "longenough").is_ok());
        assert!(validate_signup("", "longenough").is_err());
        assert!(validate_signup("has space", "longenough").is_err());
        assert!(validate_signup(&"x".repeat(151), "longenough").is_err());
        assert!(validate_signup(&"x".repeat(150), "longenough").is_ok());
        assert!(validate_signup("alice", "short").is_err());
    }
}
