use ring::hmac;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature")]
    Missing,
    #[error("Invalid signature")]
    Invalid,
}

/// Checks the hex HMAC-SHA256 that the video platform attaches to every delivery.
///
/// Verification runs over the raw body bytes and must happen before the body is
/// parsed. The comparison is constant time.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: hmac::Key,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    pub fn sign(&self, body: &[u8]) -> String {
        hex::encode(hmac::sign(&self.key, body).as_ref())
    }

    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;

        let tag = hex::decode(signature).map_err(|_| SignatureError::Invalid)?;
        hmac::verify(&self.key, body, &tag).map_err(|_| SignatureError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"type":"test"}"#;

    #[test]
    fn test_sign_then_verify() {
        let verifier = WebhookVerifier::new("stream-secret");
        let signature = verifier.sign(BODY);
        assert_eq!(signature.len(), 64);
        assert!(verifier.verify(BODY, Some(&signature)).is_ok());
    }

    #[test]
    fn test_missing_or_blank_signature() {
        let verifier = WebhookVerifier::new("stream-secret");
        assert_eq!(verifier.verify(BODY, None), Err(SignatureError::Missing));
        assert_eq!(verifier.verify(BODY, Some("  ")), Err(SignatureError::Missing));
    }

    #[test]
    fn test_wrong_secret_or_tampered_body_rejected() {
        let signer = WebhookVerifier::new("other-secret");
        let verifier = WebhookVerifier::new("stream-secret");

        let foreign = signer.sign(BODY);
        assert_eq!(verifier.verify(BODY, Some(&foreign)), Err(SignatureError::Invalid));

        let genuine = verifier.sign(BODY);
        assert_eq!(
            verifier.verify(br#"{"type":"tampered"}"#, Some(&genuine)),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn test_non_hex_signature_is_invalid() {
        let verifier = WebhookVerifier::new("stream-secret");
        assert_eq!(
            verifier.verify(BODY, Some("not-hex-at-all")),
            Err(SignatureError::Invalid)
        );
    }
}
