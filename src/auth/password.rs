//! Password hashing and credential policy.
//!
//! bcrypt is deliberately slow, so hashing and verification run on the
//! blocking pool instead of stalling the async executor.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::json;
use thiserror::Error;
use tokio::task;

use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Task(#[from] task::JoinError),
}

impl From<PasswordError> for AuthError {
    fn from(error: PasswordError) -> Self {
        AuthError::Internal(error.to_string())
    }
}

/// Adaptive, salted one-way hasher.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the account does not exist, so both login
    // failure paths pay the same bcrypt cost.
    dummy_digest: Arc<str>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        let dummy_digest = bcrypt::hash(uuid::Uuid::new_v4().to_string(), cost)?;
        Ok(Self {
            cost,
            dummy_digest: Arc::from(dummy_digest),
        })
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_owned();
        let cost = self.cost;
        let digest = task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(digest)
    }

    /// Returns `false` for a mismatch, a malformed digest or a failed task.
    /// Never errors.
    pub async fn verify(&self, password: &str, digest: &str) -> bool {
        let password = password.to_owned();
        let digest = digest.to_owned();
        match task::spawn_blocking(move || bcrypt::verify(password, &digest)).await {
            Ok(Ok(matches)) => matches,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Stored password digest could not be parsed");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "Password verification task failed");
                false
            }
        }
    }

    /// Burn one verification against the dummy digest. Always `false`.
    pub async fn verify_dummy(&self, password: &str) -> bool {
        let digest = Arc::clone(&self.dummy_digest);
        self.verify(password, &digest).await;
        false
    }
}

/// Registration password policy: at least 8 characters with an uppercase
/// letter, a lowercase letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.push("must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        violations.push("must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        violations.push("must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("must contain at least one digit");
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(AuthError::validation(
            "Password does not meet strength requirements",
            json!({ "password": violations }),
        ))
    }
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalise and syntactically validate an email for a new account.
pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let normalized = normalize_email(email);
    if EMAIL_PATTERN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(AuthError::validation(
            "Invalid email address",
            json!({ "email": "must be a valid email address" }),
        ))
    }
}
