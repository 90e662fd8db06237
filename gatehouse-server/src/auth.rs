//! Account collaborators used by the login and registration routes
//!
//! Provides traits for:
//! - Account lookup and creation ([`UserDirectory`])
//! - Password hashing ([`PasswordHasher`])
//!
//! with an in-memory directory, an Argon2 hasher, and a mock hasher for
//! testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use gatehouse_core::Role;

/// First number handed out by [`AccountNames`]
const FIRST_ACCOUNT_NUMBER: u64 = 900_001;

/// A stored account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Error from the account directory
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("email already registered: {0}")]
    EmailExists(String),

    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Account storage (testable)
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look an account up by email; `None` if there is no such account
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Store a new account. Fails with [`DirectoryError::EmailExists`] on a
    /// duplicate email.
    async fn create(&self, record: UserRecord) -> Result<(), DirectoryError>;
}

/// Directory kept in process memory
#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(email).cloned())
    }

    async fn create(&self, record: UserRecord) -> Result<(), DirectoryError> {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(&record.email) {
            return Err(DirectoryError::EmailExists(record.email));
        }
        users.insert(record.email.clone(), record);
        Ok(())
    }
}

/// Password hashing failure
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub String);

/// Opaque password hashing capability
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// `true` if `password` matches `hash`. Malformed hashes never match.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher backed by the `argon2` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        use argon2::password_hash::rand_core::OsRng;
        use argon2::password_hash::{PasswordHasher as _, SaltString};
        use argon2::Argon2;

        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};
        use argon2::Argon2;

        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is malformed");
                false
            }
        }
    }
}

/// Cheap reversible "hasher" for testing
#[derive(Debug, Default, Clone, Copy)]
pub struct MockHasher;

impl PasswordHasher for MockHasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        Ok(format!("mock${}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("mock$") == Some(password)
    }
}

/// Sequential display names for new accounts: `user_900001`, `user_900002`, ...
#[derive(Debug)]
pub struct AccountNames {
    next: AtomicU64,
}

impl AccountNames {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(FIRST_ACCOUNT_NUMBER),
        }
    }

    pub fn next_name(&self) -> String {
        format!("user_{}", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for AccountNames {
    fn default() -> Self {
        Self::new()
    }
}
