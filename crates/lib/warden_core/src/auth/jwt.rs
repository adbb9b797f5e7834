//! JWT signing and verification (HS256).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::AuthError;

/// HMAC key pair derived from one shared secret.
#[derive(Clone)]
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    /// Build keys from a secret. An empty secret is a configuration error.
    pub fn from_secret(name: &str, secret: &SecretString) -> Result<Self, AuthError> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.is_empty() {
            return Err(AuthError::Configuration(format!("{name} is empty")));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        })
    }
}

/// Sign `claims` with HS256.
pub fn sign<T: Serialize>(claims: &T, keys: &SigningKeys) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
        .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify a token's signature (and expiry when `check_exp` is set).
///
/// Every failure collapses into `InvalidOrExpiredToken`; callers never learn
/// whether the token was tampered with or merely stale.
pub fn verify<T: DeserializeOwned>(
    token: &str,
    keys: &SigningKeys,
    check_exp: bool,
) -> Result<T, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = check_exp;
    validation.set_required_spec_claims(&["exp", "sub"]);
    decode::<T>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidOrExpiredToken)
}
