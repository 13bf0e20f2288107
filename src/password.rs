//! Password hashing with bcrypt.
//!
//! Hashing is CPU-bound, so both directions run on the blocking thread pool
//! instead of stalling the request executor. Callers hash exactly once per
//! password mutation (registration or an explicit password change); re-saving
//! a principal never rehashes.

use anyhow::{Context, Result};

/// Bcrypt cost factor. Each call salts independently, so two hashes of the
/// same plaintext never match.
pub const HASH_COST: u32 = 10;

/// Hash a plaintext password for storage.
///
/// # Errors
///
/// Returns an error if bcrypt fails or the blocking task is cancelled; the
/// caller treats this as a fatal persistence error.
pub async fn hash(plaintext: &str) -> Result<String> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, HASH_COST))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")
}

/// Check a plaintext password against a stored digest.
///
/// Verification failures of any kind (including a malformed digest) are
/// reported as a non-match so the authentication path never branches on the
/// failure reason.
pub async fn verify(plaintext: &str, digest: &str) -> bool {
    let plaintext = plaintext.to_string();
    let digest = digest.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verify_accepts_matching_password() -> Result<()> {
        let digest = hash("secret1").await?;
        assert!(verify("secret1", &digest).await);
        Ok(())
    }

    #[tokio::test]
    async fn verify_rejects_wrong_password() -> Result<()> {
        let digest = hash("secret1").await?;
        assert!(!verify("not-the-password", &digest).await);
        Ok(())
    }

    #[tokio::test]
    async fn hashes_are_salted_per_call() -> Result<()> {
        let first = hash("secret1").await?;
        let second = hash("secret1").await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_digest_is_a_non_match() {
        assert!(!verify("secret1", "not-a-bcrypt-digest").await);
    }
}
