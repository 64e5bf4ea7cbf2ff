use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

/// Verified against when the account does not exist, so a miss costs
/// as much as a wrong password. Uses the default argon2id parameters and
/// matches no password.
const DECOY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$aMExuwJDiwQr5woX0MRmMw$dIg7zJyzVy4u0XugRofIuH4zfJ2BoN8peyp7UaqDMA8";

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Argon2 compares digests in constant time.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Spend one verification's worth of work on a login for an unknown email.
pub fn verify_decoy(plain: &str) {
    if let Err(e) = verify_password(plain, DECOY_HASH) {
        error!(error = %e, "decoy verification failed");
    }
}

/// `hash_password` on the blocking pool; argon2 is deliberately slow.
pub async fn hash_password_async(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain)).await?
}

pub async fn verify_password_async(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash)).await?
}

pub async fn verify_decoy_async(plain: String) {
    let _ = tokio::task::spawn_blocking(move || verify_decoy(&plain)).await;
}
