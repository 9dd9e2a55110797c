//! Token generation and password hashing

use rand::RngCore;

use shared::AppError;
use shared::util::now_millis;

/// Activation token lifetime: 7 days.
pub const TOKEN_TTL_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Generate a fresh activation token with its expiry timestamp.
///
/// 256 bits from the OS RNG, hex-encoded (64 characters).
pub fn generate_activation_token() -> (String, i64) {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    (hex::encode(buf), now_millis() + TOKEN_TTL_MILLIS)
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;
    use argon2::{Argon2, PasswordHasher};
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}
