use thiserror::Error;

use crate::validation::random_string;

pub use bcrypt::DEFAULT_COST;

pub const TEMPORARY_PASSWORD_LEN: usize = 12;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must be at least 6 characters")]
    TooShort,
    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hashes a plaintext password with bcrypt at the given cost.
pub fn hash_password_with_cost(plain: &str, cost: u32) -> Result<String, PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort);
    }
    Ok(bcrypt::hash(plain, cost)?)
}

pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    hash_password_with_cost(plain, DEFAULT_COST)
}

/// Returns `false` for mismatches and for hashes that are not valid bcrypt strings.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}

pub fn generate_temporary_password() -> String {
    random_string(TEMPORARY_PASSWORD_LEN)
}
