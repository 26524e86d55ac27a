use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{AppError, AppResult};

/// Hash an app-lock PIN for storage. PINs never touch the DB in cleartext.
pub fn hash_pin(pin: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash PIN: {}", e)))
}

pub fn verify_pin(pin: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt PIN hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_pin("123456").unwrap();
        assert_ne!(hash, "123456");
        assert!(verify_pin("123456", &hash).unwrap());
        assert!(!verify_pin("654321", &hash).unwrap());
    }

    #[test]
    fn same_pin_hashes_differently() {
        let h1 = hash_pin("000000").unwrap();
        let h2 = hash_pin("000000").unwrap();
        assert_ne!(h1, h2);
    }
}
