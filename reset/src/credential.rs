//! Credential mutation.
//!
//! The mutator is the only component that sees a plaintext credential. It
//! checks the password policy, derives an Argon2id PHC string and writes it
//! through the caller's transaction. Plaintext never reaches a log line or
//! storage.

use crate::config::HashCost;
use crate::error::{ResetError, Result};
use crate::model::AccountId;
use crate::policy::PasswordPolicy;
use crate::providers::ResetTransaction;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

/// Validates, hashes and stores new credentials.
#[derive(Debug, Clone)]
pub struct CredentialMutator {
    policy: PasswordPolicy,
    params: Params,
}

impl CredentialMutator {
    /// Create a mutator.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::HashingFailed` if the cost parameters are out of
    /// Argon2's accepted range.
    pub fn new(policy: PasswordPolicy, cost: HashCost) -> Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| ResetError::HashingFailed(format!("Invalid parameters: {e}")))?;
        Ok(Self { policy, params })
    }

    /// Policy enforced by this mutator.
    #[must_use]
    pub const fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Check the candidate against the policy without hashing.
    ///
    /// # Errors
    ///
    /// Returns `ResetError::CredentialRejected` listing every violated rule.
    pub fn validate(&self, candidate: &str) -> Result<()> {
        self.policy
            .check(candidate)
            .map_err(|violations| ResetError::CredentialRejected { violations })
    }

    /// Validate and hash a credential.
    ///
    /// # Errors
    ///
    /// - policy failure → `ResetError::CredentialRejected`
    /// - hashing failure → `ResetError::HashingFailed`
    pub fn hash(&self, candidate: &str) -> Result<String> {
        self.validate(candidate)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(candidate.as_bytes(), &salt)
            .map_err(|e| ResetError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Store an already validated hash on `account_id` inside `tx`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors; the caller's transaction is then dropped.
    pub async fn store<T: ResetTransaction>(
        &self,
        tx: &mut T,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<()> {
        tx.store_password_hash(account_id, password_hash).await?;
        tracing::debug!(account_id = %account_id, "Credential hash staged");
        Ok(())
    }

    /// Check `candidate` against a stored PHC string.
    ///
    /// Returns `false` for malformed hashes instead of failing.
    #[must_use]
    pub fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        self.argon2()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn mutator() -> CredentialMutator {
        CredentialMutator::new(
            PasswordPolicy::default(),
            HashCost {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let mutator = mutator();
        let hash = mutator.hash("Aa1!aa23").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("Aa1!aa23"));
        assert!(mutator.verify("Aa1!aa23", &hash));
        assert!(!mutator.verify("Aa1!aa24", &hash));
    }

    #[test]
    fn test_hash_refuses_weak_credential() {
        let err = mutator().hash("password").unwrap_err();
        assert!(matches!(err, ResetError::CredentialRejected { .. }));
    }

    #[test]
    fn test_salts_differ() {
        let mutator = mutator();
        let first = mutator.hash("Aa1!aa23").unwrap();
        let second = mutator.hash("Aa1!aa23").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_malformed_hash() {
        assert!(!mutator().verify("Aa1!aa23", "not-a-phc-string"));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = CredentialMutator::new(
            PasswordPolicy::default(),
            HashCost {
                memory_kib: 1,
                iterations: 0,
                parallelism: 1,
            },
        );
        assert!(matches!(result, Err(ResetError::HashingFailed(_))));
    }
}
