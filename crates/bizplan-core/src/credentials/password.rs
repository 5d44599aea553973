//! PBKDF2-HMAC-SHA256 password hashing.
//!
//! Stored format: `pbkdf2-sha256$<iterations>$<salt_hex>$<hash_hex>`. The
//! iteration count travels with the hash so it can be raised without
//! invalidating existing accounts.

use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Errors from verifying a stored password hash.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("malformed password hash: {0}")]
    Malformed(String),
}

/// Hashes new passwords with a fixed iteration count.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub const DEFAULT_ITERATIONS: u32 = 210_000;

    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        let hash = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(hash)
        )
    }

    /// Check `password` against a stored hash produced by [`Self::hash`].
    pub fn verify(stored: &str, password: &str) -> Result<bool, PasswordError> {
        let mut parts = stored.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(PasswordError::Malformed("expected four '$'-separated fields".into()));
        };

        if scheme != SCHEME {
            return Err(PasswordError::Malformed(format!("unknown scheme {scheme:?}")));
        }
        let iterations: u32 = iterations
            .parse()
            .map_err(|e| PasswordError::Malformed(format!("bad iteration count: {e}")))?;
        let salt =
            hex::decode(salt).map_err(|e| PasswordError::Malformed(format!("bad salt: {e}")))?;
        let expected = hex::decode(expected)
            .map_err(|e| PasswordError::Malformed(format!("bad hash: {e}")))?;

        let actual = derive(password, &salt, iterations);
        Ok(actual.as_slice().ct_eq(&expected).into())
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}
