//! Shared webhook signature primitives.
//!
//! Each provider adapter applies its own scheme, but they all reduce to an
//! HMAC over the payload compared in constant time, and (where the scheme
//! signs a timestamp) a replay window check.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::WebhookError;

/// Maximum allowed age for timestamp-signed events (5 minutes).
pub const MAX_EVENT_AGE_SECS: i64 = 300;

/// Clock skew tolerance for events dated in the future (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed `t=<unix>,v1=<hex>` style signature header, as used by CardPoint
/// and TransGlobal webhooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses a `t=<timestamp>,v1=<hex signature>` header.
    ///
    /// Unknown key/value pairs are skipped for forward compatibility.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;
            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        Ok(SignatureHeader {
            timestamp: timestamp
                .ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?,
            signature: signature
                .ok_or_else(|| WebhookError::ParseError("missing v1 signature".to_string()))?,
        })
    }
}

/// Validates a signed timestamp against the replay window.
pub fn verify_timestamp(timestamp: i64, now: i64) -> Result<(), WebhookError> {
    let age = now - timestamp;
    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::StaleTimestamp);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::FutureTimestamp);
    }
    Ok(())
}

/// Computes HMAC-SHA256 over `message` and compares against `provided` in
/// constant time.
pub fn verify_hmac_sha256_hex(
    secret: &[u8],
    message: &[u8],
    provided: &[u8],
) -> Result<(), WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|_| WebhookError::ParseError("invalid HMAC key".to_string()))?;
    mac.update(message);
    let expected = mac.finalize().into_bytes();

    if expected.len() != provided.len() {
        return Err(WebhookError::InvalidSignature);
    }
    if expected.as_slice().ct_eq(provided).unwrap_u8() != 1 {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(())
}

/// Computes HMAC-SHA512 over `message` and compares against `provided` in
/// constant time. TransGlobal signs with SHA-512.
pub fn verify_hmac_sha512_hex(
    secret: &[u8],
    message: &[u8],
    provided: &[u8],
) -> Result<(), WebhookError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret)
        .map_err(|_| WebhookError::ParseError("invalid HMAC key".to_string()))?;
    mac.update(message);
    let expected = mac.finalize().into_bytes();

    if expected.len() != provided.len() {
        return Err(WebhookError::InvalidSignature);
    }
    if expected.as_slice().ct_eq(provided).unwrap_u8() != 1 {
        return Err(WebhookError::InvalidSignature);
    }
    Ok(())
}

/// Hex-encoded HMAC-SHA512 counterpart of [`hmac_sha256_hex`].
pub fn hmac_sha512_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Hex-encoded HMAC-SHA256, for building test fixtures and outbound calls.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_with_timestamp_and_signature() {
        let header = format!("t=1700000000,v1={}", "ab".repeat(32));
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.signature.len(), 32);
    }

    #[test]
    fn parse_skips_unknown_fields() {
        let header = format!("t=1700000000,v1={},v2=future,scheme=hmac", "cd".repeat(32));
        assert!(SignatureHeader::parse(&header).is_ok());
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(matches!(
            SignatureHeader::parse("t=1700000000"),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse(&format!("v1={}", "ab".repeat(32))),
            Err(WebhookError::ParseError(_))
        ));
        assert!(matches!(
            SignatureHeader::parse("t=xyz,v1=nothex"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn timestamp_window() {
        let now = 1_700_000_000;
        assert!(verify_timestamp(now - 120, now).is_ok());
        assert!(verify_timestamp(now - MAX_EVENT_AGE_SECS, now).is_ok());
        assert!(matches!(
            verify_timestamp(now - MAX_EVENT_AGE_SECS - 1, now),
            Err(WebhookError::StaleTimestamp)
        ));
        assert!(verify_timestamp(now + 30, now).is_ok());
        assert!(matches!(
            verify_timestamp(now + MAX_CLOCK_SKEW_SECS + 1, now),
            Err(WebhookError::FutureTimestamp)
        ));
    }

    #[test]
    fn hmac_verification_round_trips() {
        let secret = b"whsec_test";
        let message = b"1700000000.{\"id\":\"evt_1\"}";
        let sig = hex::decode(hmac_sha256_hex(secret, message)).unwrap();

        assert!(verify_hmac_sha256_hex(secret, message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let secret = b"whsec_test";
        let sig = hex::decode(hmac_sha256_hex(secret, b"original")).unwrap();
        assert!(matches!(
            verify_hmac_sha256_hex(secret, b"tampered", &sig),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let sig = hex::decode(hmac_sha256_hex(b"secret_a", b"payload")).unwrap();
        assert!(verify_hmac_sha256_hex(b"secret_b", b"payload", &sig).is_err());
    }

    #[test]
    fn length_mismatch_fails_closed() {
        assert!(matches!(
            verify_hmac_sha256_hex(b"secret", b"payload", b"short"),
            Err(WebhookError::InvalidSignature)
        ));
    }
}
