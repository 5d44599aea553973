//! Signed, expiring bearer tokens.
//!
//! Tokens are HMAC-SHA256 based, scoped to a user and an expiry instant.
//! Format: `<prefix><user_id>_<expires_unix>_<hmac_hex>` where the prefix
//! is `bp_at_` for access tokens and `bp_rt_` for password-reset tokens.
//!
//! The MAC also covers an optional binding string that is not carried in
//! the token. Reset tokens are bound to the account's current password
//! hash, so they stop validating once the password changes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding the hex-encoded signing secret.
pub const TOKEN_SECRET_ENV: &str = "BIZPLAN_TOKEN_SECRET";

/// Which kind of token this is. Kinds are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    PasswordReset,
}

impl TokenKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Access => "bp_at_",
            Self::PasswordReset => "bp_rt_",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::PasswordReset => "reset",
        }
    }
}

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    #[error("invalid user ID in token: {0}")]
    InvalidUserId(String),

    #[error("invalid expiry in token: {0}")]
    InvalidExpiry(String),

    #[error("token HMAC verification failed")]
    HmacMismatch,

    #[error("token expired")]
    Expired,

    #[error("missing token secret")]
    MissingSecret,
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
    /// Lifetime of access tokens.
    pub access_ttl: Duration,
    /// Lifetime of password-reset tokens.
    pub reset_ttl: Duration,
}

impl TokenConfig {
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_RESET_TTL: Duration = Duration::from_secs(60 * 60);

    /// Create a config with the given secret and default lifetimes.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            access_ttl: Self::DEFAULT_ACCESS_TTL,
            reset_ttl: Self::DEFAULT_RESET_TTL,
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Create a config from the `BIZPLAN_TOKEN_SECRET` environment variable.
    ///
    /// The value must be hex (as written by `bizplan init`).
    pub fn from_env() -> Result<Self, TokenError> {
        let secret_hex = std::env::var(TOKEN_SECRET_ENV).map_err(|_| TokenError::MissingSecret)?;
        Self::from_hex(&secret_hex)
    }

    /// Create a config from a hex-encoded secret.
    pub fn from_hex(secret_hex: &str) -> Result<Self, TokenError> {
        let secret = hex::decode(secret_hex.trim()).map_err(|e| {
            TokenError::InvalidFormat(format!("token secret is not valid hex: {e}"))
        })?;
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self::new(secret))
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::PasswordReset => self.reset_ttl,
        }
    }
}

/// Generate a random 32-byte secret, hex-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Claims extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issue a token of `kind` for `user_id`, expiring one TTL after now.
pub fn issue_token(config: &TokenConfig, kind: TokenKind, user_id: Uuid, binding: &str) -> String {
    issue_token_at(config, kind, user_id, binding, Utc::now())
}

pub fn issue_token_at(
    config: &TokenConfig,
    kind: TokenKind,
    user_id: Uuid,
    binding: &str,
    now: DateTime<Utc>,
) -> String {
    let ttl = chrono::Duration::from_std(config.ttl(kind)).unwrap_or(chrono::Duration::zero());
    let expires = (now + ttl).timestamp();
    let mac = compute_hmac(&config.secret, &message(kind, user_id, expires, binding));
    format!("{}{user_id}_{expires}_{}", kind.prefix(), hex::encode(mac))
}

/// Validate a token of `kind` and extract its claims.
pub fn validate_token(
    config: &TokenConfig,
    kind: TokenKind,
    token: &str,
    binding: &str,
) -> Result<TokenClaims, TokenError> {
    validate_token_at(config, kind, token, binding, Utc::now())
}

pub fn validate_token_at(
    config: &TokenConfig,
    kind: TokenKind,
    token: &str,
    binding: &str,
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenError> {
    let user_id = peek_user_id(kind, token)?;
    let rest = &token[kind.prefix().len() + 36..];

    let after_underscore = rest.strip_prefix('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore after user id".to_string())
    })?;
    let (expires_str, hmac_hex) = after_underscore.split_once('_').ok_or_else(|| {
        TokenError::InvalidFormat("expected underscore between expiry and hmac".to_string())
    })?;
    let expires: i64 = expires_str
        .parse()
        .map_err(|e: std::num::ParseIntError| TokenError::InvalidExpiry(e.to_string()))?;
    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| TokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    verify_hmac(
        &config.secret,
        &message(kind, user_id, expires, binding),
        &provided_mac,
    )?;

    let expires_at = DateTime::<Utc>::from_timestamp(expires, 0)
        .ok_or_else(|| TokenError::InvalidExpiry(expires.to_string()))?;
    if expires_at <= now {
        return Err(TokenError::Expired);
    }

    Ok(TokenClaims {
        user_id,
        expires_at,
    })
}

/// Read the user ID out of a token without verifying it.
///
/// Needed for bound tokens, where the binding must be looked up for the
/// user before the MAC can be checked.
pub fn peek_user_id(kind: TokenKind, token: &str) -> Result<Uuid, TokenError> {
    let prefix = kind.prefix();
    let rest = token
        .strip_prefix(prefix)
        .ok_or_else(|| TokenError::InvalidFormat(format!("token must start with '{prefix}'")))?;
    if rest.len() < 36 || !rest.is_char_boundary(36) {
        return Err(TokenError::InvalidFormat(
            "token too short to contain a valid UUID".to_string(),
        ));
    }
    Uuid::parse_str(&rest[..36]).map_err(|e| TokenError::InvalidUserId(e.to_string()))
}

fn message(kind: TokenKind, user_id: Uuid, expires: i64, binding: &str) -> Vec<u8> {
    format!("{}:{user_id}:{expires}:{binding}", kind.tag()).into_bytes()
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size")
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac(key: &[u8], message: &[u8], expected: &[u8]) -> Result<(), TokenError> {
    let mut mac = new_mac(key);
    mac.update(message);
    mac.verify_slice(expected)
        .map_err(|_| TokenError::HmacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TokenConfig {
        TokenConfig::new(b"test-secret-key-for-bizplan".to_vec())
    }

    fn user() -> Uuid {
        Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn access_token_has_expected_format() {
        let token = issue_token_at(&test_config(), TokenKind::Access, user(), "", now());

        let rest = token.strip_prefix("bp_at_").expect("access prefix");
        assert!(rest.starts_with(&user().to_string()));
        let (expires, hmac_hex) = rest[37..].split_once('_').unwrap();
        assert_eq!(expires, (1_700_000_000 + 30 * 60).to_string());
        assert_eq!(hmac_hex.len(), 64, "HMAC-SHA256 hex should be 64 chars");
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let config = test_config();
        let token = issue_token_at(&config, TokenKind::Access, user(), "", now());
        let claims = validate_token_at(&config, TokenKind::Access, &token, "", now()).unwrap();
        assert_eq!(claims.user_id, user());
        assert_eq!(claims.expires_at.timestamp(), 1_700_000_000 + 1800);
    }

    #[test]
    fn token_expires_after_ttl() {
        let config = test_config().with_access_ttl(Duration::from_secs(60));
        let token = issue_token_at(&config, TokenKind::Access, user(), "", now());

        let just_before = now() + chrono::Duration::seconds(59);
        assert!(validate_token_at(&config, TokenKind::Access, &token, "", just_before).is_ok());

        let at_expiry = now() + chrono::Duration::seconds(60);
        let err = validate_token_at(&config, TokenKind::Access, &token, "", at_expiry).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let config = test_config();
        let reset = issue_token_at(&config, TokenKind::PasswordReset, user(), "", now());
        assert!(reset.starts_with("bp_rt_"));

        let err = validate_token_at(&config, TokenKind::Access, &reset, "", now()).unwrap_err();
        assert!(matches!(err, TokenError::InvalidFormat(_)));

        // Same payload under the other prefix still fails the MAC.
        let relabelled = reset.replacen("bp_rt_", "bp_at_", 1);
        let err = validate_token_at(&config, TokenKind::Access, &relabelled, "", now()).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn binding_mismatch_is_rejected() {
        let config = test_config();
        let token = issue_token_at(&config, TokenKind::PasswordReset, user(), "hash-v1", now());
        assert!(validate_token_at(&config, TokenKind::PasswordReset, &token, "hash-v1", now()).is_ok());

        let err = validate_token_at(&config, TokenKind::PasswordReset, &token, "hash-v2", now())
            .unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_tampered_expiry() {
        let config = test_config();
        let token = issue_token_at(&config, TokenKind::Access, user(), "", now());
        let original = (1_700_000_000 + 1800).to_string();
        let tampered = token.replacen(&original, "9999999999", 1);

        let err = validate_token_at(&config, TokenKind::Access, &tampered, "", now()).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_tampered_user_id() {
        let config = test_config();
        let token = issue_token_at(&config, TokenKind::Access, user(), "", now());
        let other = Uuid::parse_str("660e8400-e29b-41d4-a716-446655440000").unwrap();
        let tampered = token.replace(&user().to_string(), &other.to_string());

        assert!(validate_token_at(&config, TokenKind::Access, &tampered, "", now()).is_err());
    }

    #[test]
    fn reject_wrong_secret() {
        let token = issue_token_at(&test_config(), TokenKind::Access, user(), "", now());
        let wrong = TokenConfig::new(b"wrong-secret".to_vec());
        let err = validate_token_at(&wrong, TokenKind::Access, &token, "", now()).unwrap_err();
        assert!(matches!(err, TokenError::HmacMismatch));
    }

    #[test]
    fn reject_malformed_tokens() {
        let config = test_config();
        let check = |token: &str| validate_token_at(&config, TokenKind::Access, token, "", now());

        assert!(matches!(check("").unwrap_err(), TokenError::InvalidFormat(_)));
        assert!(matches!(check("bp_at_short").unwrap_err(), TokenError::InvalidFormat(_)));
        assert!(matches!(
            check("bp_at_not-a-valid-uuid-at-all-noooooooo_1_ab").unwrap_err(),
            TokenError::InvalidUserId(_)
        ));
        let id = user();
        assert!(matches!(
            check(&format!("bp_at_{id}_soon_deadbeef")).unwrap_err(),
            TokenError::InvalidExpiry(_)
        ));
        assert!(matches!(
            check(&format!("bp_at_{id}_1_zz-not-hex")).unwrap_err(),
            TokenError::InvalidFormat(_)
        ));
        assert!(matches!(
            check(&format!("bp_at_{id}")).unwrap_err(),
            TokenError::InvalidFormat(_)
        ));
    }

    #[test]
    fn peek_reads_user_without_verifying() {
        let token = issue_token_at(&test_config(), TokenKind::PasswordReset, user(), "x", now());
        assert_eq!(peek_user_id(TokenKind::PasswordReset, &token).unwrap(), user());
    }

    #[test]
    fn secret_from_hex() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        let config = TokenConfig::from_hex(&secret).unwrap();
        assert_eq!(config.secret.len(), 32);

        assert!(TokenConfig::from_hex("not hex").is_err());
        assert!(matches!(TokenConfig::from_hex("").unwrap_err(), TokenError::MissingSecret));
    }
}
