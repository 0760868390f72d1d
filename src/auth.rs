// 🔑 Admin credential
// One shared secret, presented as a bearer token. Both sides are hashed with
// SHA-256 and the digests compared in constant time, so neither content nor
// length leaks through timing.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub struct AdminCredential {
    digest: [u8; 32],
}

impl AdminCredential {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        self.digest[..].ct_eq(&presented[..]).into()
    }

    /// Check an `Authorization` header value of the form `Bearer <token>`
    pub fn verify_header(&self, header: Option<&str>) -> bool {
        header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|token| self.verify(token))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminCredential(..)")
    }
}
