//! Password hashing and verification.
//!
//! Argon2id is the only algorithm new hashes are written with. The
//! legacy unsalted sha256-hex format is verified only when the user
//! record explicitly says so (`password_algo`), and callers upgrade
//! such hashes after a successful verification. No format sniffing.

use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn argon2_with_cost(memory_kib: u32) -> Result<Argon2<'static>, anyhow::Error> {
    let params = Params::new(memory_kib, Params::DEFAULT_T_COST, Params::DEFAULT_P_COST, None)
        .map_err(|e| anyhow::anyhow!("Invalid argon2 params: {}", e))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password using Argon2id.
///
/// `memory_kib` is the configured cost factor; salt is generated and
/// embedded in the hash string.
pub fn hash_password(
    password: &Password,
    memory_kib: u32,
) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = argon2_with_cost(memory_kib)?;
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against an argon2 hash.
///
/// Returns Ok(()) if password matches, Err otherwise. Cost parameters
/// are read from the stored hash.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

/// Verify a password against a legacy unsalted sha256-hex hash, in
/// constant time. Only reachable for records whose `password_algo` is
/// `legacy_sha256`.
pub fn verify_legacy_sha256(password: &Password, stored_hex: &str) -> bool {
    let digest = Sha256::digest(password.as_str().as_bytes());
    let Ok(stored) = hex::decode(stored_hex) else {
        return false;
    };
    digest.as_slice().ct_eq(stored.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST_KIB: u32 = 8;

    #[test]
    fn hash_and_verify_round_trip() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password, TEST_COST_KIB).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(verify_password(&password, &hash).is_ok());
    }

    #[test]
    fn wrong_password_fails_verification() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password, TEST_COST_KIB).expect("Failed to hash password");

        let wrong = Password::new("wrongPassword".to_string());
        assert!(verify_password(&wrong, &hash).is_err());
    }

    #[test]
    fn same_password_produces_different_hashes() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash1 = hash_password(&password, TEST_COST_KIB).unwrap();
        let hash2 = hash_password(&password, TEST_COST_KIB).unwrap();

        assert_ne!(hash1.as_str(), hash2.as_str());
        assert!(verify_password(&password, &hash1).is_ok());
        assert!(verify_password(&password, &hash2).is_ok());
    }

    #[test]
    fn legacy_sha256_verification() {
        let password = Password::new("hunter2".to_string());
        let stored = hex::encode(Sha256::digest(b"hunter2"));

        assert!(verify_legacy_sha256(&password, &stored));
        assert!(!verify_legacy_sha256(
            &Password::new("hunter3".to_string()),
            &stored
        ));
        assert!(!verify_legacy_sha256(&password, "not-hex"));
    }

    #[test]
    fn password_debug_does_not_leak() {
        let password = Password::new("topsecret".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
