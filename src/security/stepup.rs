//! Step-up verification tokens.
//!
//! Short-lived HMAC-SHA256 signed tokens proving a second authentication
//! factor was presented in the current session. Stateless by design: no
//! server-side revocation list, the expiry window bounds exposure.
//!
//! Token format: `base64url(sub).exp.base64url(hmac("sub:exp"))`. The
//! identity id is bound into the MAC, so a token issued for one account
//! cannot be replayed for another.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

type HmacSha256 = Hmac<Sha256>;

/// Why a step-up token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpError {
    /// Structurally invalid or bad signature.
    Invalid,
    /// Signature valid but past expiry.
    Expired,
}

/// Issues and verifies step-up tokens.
pub struct StepUpVerifier {
    secret: Vec<u8>,
    ttl_secs: u64,
}

impl StepUpVerifier {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs,
        }
    }

    /// Token lifetime in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn mac_for(&self, identity_id: &str, expires_at: i64) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(identity_id.as_bytes());
        mac.update(b":");
        mac.update(expires_at.to_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Issue a token bound to an identity id, valid for the configured TTL.
    pub fn issue(&self, identity_id: &str) -> String {
        let expires_at = chrono::Utc::now().timestamp() + self.ttl_secs as i64;
        let sig = self.mac_for(identity_id, expires_at);
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(identity_id.as_bytes()),
            expires_at,
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    /// Verify a token: signature first (constant-time), then expiry.
    /// Returns the bound identity id.
    pub fn verify(&self, token: &str) -> Result<String, StepUpError> {
        let mut parts = token.splitn(3, '.');
        let (sub_b64, exp_str, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(StepUpError::Invalid),
        };

        let sub_bytes = URL_SAFE_NO_PAD
            .decode(sub_b64)
            .map_err(|_| StepUpError::Invalid)?;
        let identity_id = String::from_utf8(sub_bytes).map_err(|_| StepUpError::Invalid)?;
        let expires_at: i64 = exp_str.parse().map_err(|_| StepUpError::Invalid)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| StepUpError::Invalid)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(identity_id.as_bytes());
        mac.update(b":");
        mac.update(expires_at.to_string().as_bytes());
        // verify_slice is constant-time.
        mac.verify_slice(&sig).map_err(|_| StepUpError::Invalid)?;

        if chrono::Utc::now().timestamp() > expires_at {
            return Err(StepUpError::Expired);
        }

        Ok(identity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> StepUpVerifier {
        StepUpVerifier::new("fA8cR2mQ9xW4zL7pJ1kV6nB3tY5hD0gS", 3600)
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let v = verifier();
        let token = v.issue("web-abc");
        assert_eq!(v.verify(&token).unwrap(), "web-abc");
    }

    #[test]
    fn test_token_is_bound_to_identity() {
        let v = verifier();
        let token = v.issue("web-abc");
        // Swapping the subject invalidates the signature.
        let forged = token.replacen(
            &URL_SAFE_NO_PAD.encode(b"web-abc"),
            &URL_SAFE_NO_PAD.encode(b"web-xyz"),
            1,
        );
        assert_eq!(v.verify(&forged), Err(StepUpError::Invalid));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let v = verifier();
        let other = StepUpVerifier::new("another-secret-key-32-chars-long!!", 3600);
        let token = other.issue("web-abc");
        assert_eq!(v.verify(&token), Err(StepUpError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        // TTL of zero expires in the past once a second ticks; force it by
        // issuing with a negative window.
        let v = StepUpVerifier::new("fA8cR2mQ9xW4zL7pJ1kV6nB3tY5hD0gS", 0);
        let expires_at = chrono::Utc::now().timestamp() - 10;
        let sig = v.mac_for("web-abc", expires_at);
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(b"web-abc"),
            expires_at,
            URL_SAFE_NO_PAD.encode(sig)
        );
        assert_eq!(v.verify(&token), Err(StepUpError::Expired));
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let v = verifier();
        assert_eq!(v.verify(""), Err(StepUpError::Invalid));
        assert_eq!(v.verify("a.b"), Err(StepUpError::Invalid));
        assert_eq!(v.verify("!!!.123.@@@"), Err(StepUpError::Invalid));
    }
}
