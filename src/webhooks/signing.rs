use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
#[error("invalid signing key: {0}")]
pub struct SigningError(String);

/// `sha256=<hex HMAC-SHA256(secret, payload)>`
pub fn sign_payload(payload: &str, secret: &str) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| SigningError(err.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Recompute the signature and compare in constant time.
///
/// Never panics; a malformed or differently sized signature is simply `false`.
pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> bool {
    let expected = match sign_payload(payload, secret) {
        Ok(expected) => expected,
        Err(_) => return false,
    };
    expected.as_bytes().ct_eq(signature.trim().as_bytes()).into()
}
