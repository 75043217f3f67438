use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Hash a password into a PHC string (algorithm, parameters and salt embedded).
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AppError::Processing
        })?
        .to_string();
    Ok(hash)
}

/// Check `plain` against a stored PHC hash.
///
/// Argon2 compares the derived output in constant time. A mismatch is
/// `Unauthorized`; a hash that cannot be parsed is `Processing` because it
/// means the stored record is damaged, not that the caller is wrong.
pub fn verify_password(plain: &str, hash: &str) -> AppResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        AppError::Processing
    })?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(AppError::Unauthorized),
        Err(e) => {
            error!(error = %e, "argon2 verify_password error");
            Err(AppError::Processing)
        }
    }
}

pub fn validate_password_policy(plain: &str) -> AppResult<()> {
    let len = plain.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

lazy_static! {
    static ref DUMMY_HASH: Option<String> = hash_password("accountd-dummy-password").ok();
}

/// Build the dummy hash now rather than on the first unknown-email login.
/// Returns whether one is available.
pub fn prepare_dummy_hash() -> bool {
    DUMMY_HASH.is_some()
}

/// Spend one verification's worth of work without a real account, so that
/// an unknown email takes as long to reject as a wrong password.
pub fn burn_verification(plain: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}
