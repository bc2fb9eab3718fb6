use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;

use crate::error::{AppError, Result};

/// SecretHasher
///
/// The opaque `hash(secret) -> digest` / `verify(secret, digest) -> bool` capability
/// the credential store relies on. Digests are self-describing PHC strings, so the
/// verifier never needs to know which parameters produced them.
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String>;

    /// Returns false for a mismatch and for a digest that cannot be parsed.
    fn verify(&self, secret: &str, digest: &str) -> bool;
}

/// HasherState
///
/// The shared hasher handle stored in the application state.
pub type HasherState = Arc<dyn SecretHasher>;

/// Argon2Hasher
///
/// Argon2id with a fresh random salt per digest.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Uses the crate's recommended default cost parameters.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Minimal memory/time cost. Only suitable for tests, where hashing speed
    /// matters more than brute-force resistance.
    pub fn low_cost() -> Self {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
            .unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.argon2
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_the_hashed_secret() {
        let hasher = Argon2Hasher::low_cost();
        let digest = hasher.hash("abc123").unwrap();

        assert!(hasher.verify("abc123", &digest));
        assert!(!hasher.verify("abc124", &digest));
        assert!(!digest.contains("abc123"));
    }

    #[test]
    fn digests_are_salted() {
        let hasher = Argon2Hasher::low_cost();
        let first = hasher.hash("same-secret").unwrap();
        let second = hasher.hash("same-secret").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("same-secret", &second));
    }

    #[test]
    fn garbage_digest_never_verifies() {
        let hasher = Argon2Hasher::low_cost();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn default_cost_digest_verifies_with_low_cost_hasher() {
        // Parameters travel inside the digest.
        let digest = Argon2Hasher::low_cost().hash("pw-123456").unwrap();
        assert!(Argon2Hasher::new().verify("pw-123456", &digest));
    }
}
