//! Password hashing.
//!
//! Passwords are hashed with bcrypt at a fixed work factor. Hashing is
//! deliberately slow, so the async [`PasswordHasher`] runs it on the
//! blocking pool behind a semaphore to keep it from starving request
//! handling.

use std::sync::Arc;

use tokio::sync::Semaphore;

/// Default bcrypt cost.
pub const DEFAULT_COST: u32 = 10;

/// Default maximum number of concurrent hashing jobs.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Errors from password hashing and verification.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Hashing failed (e.g. cost out of range)
    #[error("failed to hash password: {0}")]
    Hash(#[source] bcrypt::BcryptError),

    /// The stored hash is not a valid bcrypt hash
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(#[source] bcrypt::BcryptError),

    /// The blocking task could not run to completion
    #[error("hashing worker failed: {0}")]
    Worker(String),
}

/// Hash `plaintext` with a fresh salt.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, CredentialError> {
    bcrypt::hash(plaintext, cost).map_err(CredentialError::Hash)
}

/// Check `plaintext` against a stored bcrypt hash.
///
/// Returns `Ok(false)` on mismatch. Only a malformed stored hash is an
/// error.
pub fn verify_password(plaintext: &str, hash: &str) -> Result<bool, CredentialError> {
    bcrypt::verify(plaintext, hash).map_err(CredentialError::MalformedHash)
}

/// Async password hashing with bounded parallelism.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    permits: Arc<Semaphore>,
}

impl PasswordHasher {
    /// Create a hasher with the given cost and concurrency limit.
    ///
    /// A limit of zero is treated as one.
    pub fn new(cost: u32, max_concurrent: usize) -> Self {
        Self {
            cost,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Returns the configured bcrypt cost.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password off the async executor.
    pub async fn hash(&self, plaintext: String) -> Result<String, CredentialError> {
        let cost = self.cost;
        self.run(move || hash_password(&plaintext, cost)).await
    }

    /// Verify a password off the async executor.
    pub async fn verify(&self, plaintext: String, hash: String) -> Result<bool, CredentialError> {
        self.run(move || verify_password(&plaintext, &hash)).await
    }

    async fn run<T, F>(&self, job: F) -> Result<T, CredentialError>
    where
        F: FnOnce() -> Result<T, CredentialError> + Send + 'static,
        T: Send + 'static,
    {
        // The permit moves into the blocking job so it is held until the
        // job finishes, even if the caller is cancelled first.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CredentialError::Worker(e.to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| CredentialError::Worker(e.to_string()))?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST, DEFAULT_MAX_CONCURRENT)
    }
}
