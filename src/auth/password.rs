// Password hashing. bcrypt is CPU-bound, so both directions run on the blocking pool.

use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub async fn hash_password(plain: &str, cost: u32) -> Result<String, PasswordError> {
    let plain = plain.to_owned();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost)).await??;
    Ok(hashed)
}

/// Check `candidate` against a stored credential. Rows written before hashing
/// was introduced hold the plaintext; those are compared by digest.
pub async fn verify_password(candidate: &str, stored: &str) -> Result<bool, PasswordError> {
    if !is_bcrypt_hash(stored) {
        return Ok(digest(candidate) == digest(stored));
    }
    let candidate = candidate.to_owned();
    let stored = stored.to_owned();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &stored)).await??;
    Ok(verified)
}

pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.len() == 60 && ["$2a$", "$2b$", "$2y$"].iter().any(|p| stored.starts_with(p))
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verifies_hashed_passwords() {
        let hashed = hash_password("s3cret", 4).await.unwrap();
        assert!(is_bcrypt_hash(&hashed));
        assert!(verify_password("s3cret", &hashed).await.unwrap());
        assert!(!verify_password("wrong", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn accepts_legacy_plaintext_rows() {
        assert!(verify_password("agentpass1", "agentpass1").await.unwrap());
        assert!(!verify_password("agentpass1", "agentpass2").await.unwrap());
        assert!(!verify_password("", "agentpass1").await.unwrap());
    }
}
