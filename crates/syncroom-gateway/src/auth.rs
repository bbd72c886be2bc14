use hmac::{Hmac, Mac};
use sha2::Sha256;
use syncroom_core::types::UserIdentity;
use syncroom_core::SyncroomError;

type HmacSha256 = Hmac<Sha256>;

/// The identity gate. The surrounding auth facade issues bearer tokens;
/// the gateway only ever calls `verify` — on connect and again on each
/// room join.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, bearer: &str) -> Result<UserIdentity, SyncroomError>;
}

/// Built-in verifier for HMAC-SHA256 signed tokens.
///
/// Token format: `{user_id}.{username}.{tag}` where `tag` is the hex
/// HMAC over `{user_id}.{username}` keyed by the shared gateway secret.
/// `user_id` must not contain dots; `username` may.
pub struct HmacTokenVerifier {
    key: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Mint a token for a known identity. Used by the facade and tests.
    pub fn issue(&self, user_id: &str, username: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(format!("{user_id}.{username}").as_bytes());
        let tag = hex::encode(mac.finalize().into_bytes());
        format!("{user_id}.{username}.{tag}")
    }
}

impl IdentityVerifier for HmacTokenVerifier {
    fn verify(&self, bearer: &str) -> Result<UserIdentity, SyncroomError> {
        let malformed = || SyncroomError::Unauthenticated("malformed token".to_string());

        let (user_id, rest) = bearer.split_once('.').ok_or_else(malformed)?;
        let (username, tag_hex) = rest.rsplit_once('.').ok_or_else(malformed)?;
        if user_id.is_empty() || username.is_empty() {
            return Err(malformed());
        }

        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(format!("{user_id}.{username}").as_bytes());
        let tag = hex::decode(tag_hex).map_err(|_| malformed())?;
        mac.verify_slice(&tag)
            .map_err(|_| SyncroomError::Unauthenticated("invalid token signature".to_string()))?;

        Ok(UserIdentity {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
    }
}
