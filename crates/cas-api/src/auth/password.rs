use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use cas_core::AppError;
use rand_core::OsRng;
use std::sync::OnceLock;

static UNKNOWN_MEMBER_HASH: OnceLock<String> = OnceLock::new();

/// Hash a member password with argon2 and a random salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored argon2 hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}

/// Hash checked when no member matches the email, so unknown and known
/// accounts cost the same argon2 work
fn unknown_member_hash() -> Result<&'static str, AppError> {
    if let Some(hash) = UNKNOWN_MEMBER_HASH.get() {
        return Ok(hash);
    }
    let hash = hash_password("cas-unknown-member")?;
    Ok(UNKNOWN_MEMBER_HASH.get_or_init(|| hash))
}

/// Run a full verification for an email with no account. Always false.
pub async fn verify_unknown_member_blocking(password: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let hash = unknown_member_hash()?;
        verify_password(&password, hash).map(|_| false)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}
