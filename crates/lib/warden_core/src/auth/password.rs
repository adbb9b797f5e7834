//! Password hashing via bcrypt.

use std::sync::OnceLock;

use tracing::warn;

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 12;

/// bcrypt ignores input past this many bytes.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Digest used to burn comparable CPU time when the account does not exist.
static DUMMY_DIGEST: OnceLock<String> = OnceLock::new();

/// Hash a password with bcrypt (cost 12).
///
/// Passwords longer than [`MAX_PASSWORD_BYTES`] are rejected rather than
/// silently truncated.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::Validation(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// Returns `false` on mismatch and on a digest bcrypt cannot parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if password.len() > MAX_PASSWORD_BYTES {
        return false;
    }
    match bcrypt::verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "stored password digest could not be verified");
            false
        }
    }
}

/// Run a full verification against a throwaway digest. Always `false`.
pub fn verify_against_dummy(password: &str) -> bool {
    let digest = DUMMY_DIGEST.get_or_init(|| {
        hash_password("warden-unknown-account").unwrap_or_default()
    });
    if digest.is_empty() {
        return false;
    }
    let _ = bcrypt::verify(password, digest);
    false
}
