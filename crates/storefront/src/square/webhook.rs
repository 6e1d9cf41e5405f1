//! Square webhook signature verification.
//!
//! Square signs each notification with
//! `base64(HMAC-SHA256(signature_key, notification_url + raw_body))` and sends
//! it in the `x-square-hmacsha256-signature` header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// Header carrying the notification signature.
pub const SIGNATURE_HEADER: &str = "x-square-hmacsha256-signature";

/// Why a webhook signature was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("signature is not valid base64")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a notification against the configured signature key.
///
/// The comparison runs in constant time.
///
/// # Errors
///
/// Returns `SignatureError` if the signature is absent, undecodable, or wrong.
pub fn verify_signature(
    signature_key: &SecretString,
    notification_url: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), SignatureError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::Missing)?;
    let provided = STANDARD
        .decode(signature)
        .map_err(|_| SignatureError::Malformed)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(signature_key.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(notification_url.as_bytes());
    mac.update(body);

    mac.verify_slice(&provided)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://riptideswim.com/webhooks/square";
    const BODY: &[u8] = br#"{"type":"payment.updated"}"#;

    fn key() -> SecretString {
        SecretString::from("wh-sig-key-9f2Kq")
    }

    fn sign(url: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"wh-sig-key-9f2Kq").unwrap();
        mac.update(url.as_bytes());
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let sig = sign(URL, BODY);
        assert_eq!(verify_signature(&key(), URL, BODY, Some(&sig)), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let sig = sign(URL, BODY);
        assert_eq!(
            verify_signature(&key(), URL, br#"{"type":"payment.created"}"#, Some(&sig)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_url_is_part_of_signature() {
        let sig = sign("https://evil.example/webhooks/square", BODY);
        assert_eq!(
            verify_signature(&key(), URL, BODY, Some(&sig)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_and_malformed() {
        assert_eq!(
            verify_signature(&key(), URL, BODY, None),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(&key(), URL, BODY, Some("  ")),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(&key(), URL, BODY, Some("%%%not-base64")),
            Err(SignatureError::Malformed)
        );
    }
}
