//! Registration, login, bearer-token authentication and password reset.

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use bizplan_db::models::User;
use bizplan_db::queries::users as db;

use crate::credentials::token::{self, TokenConfig, TokenError, TokenKind};
use crate::credentials::{PasswordError, PasswordHasher};
use crate::error::{ServiceError, require_non_blank};
use crate::notify::{Notification, NotificationDispatcher};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Response to `forgot-password`, identical whether or not the account
/// exists.
pub const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a reset link was sent.";

const BAD_CREDENTIALS: &str = "incorrect email or password";
const BAD_TOKEN: &str = "could not validate credentials";

/// A freshly issued access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    pool: PgPool,
    tokens: TokenConfig,
    hasher: PasswordHasher,
    notifier: NotificationDispatcher,
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        tokens: TokenConfig,
        hasher: PasswordHasher,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            pool,
            tokens,
            hasher,
            notifier,
        }
    }

    /// Create an account and enqueue the welcome email.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        require_non_blank("name", name)?;
        let email = normalize_email(email)?;
        validate_password(password)?;

        let hash = self.hash_password(password).await?;
        let user = db::insert_user(&self.pool, name.trim(), &email, &hash)
            .await
            .map_err(|e| ServiceError::conflict_or_internal(e, "email already registered"))?;

        tracing::info!(user_id = %user.id, "user registered");
        self.notifier.dispatch(Notification::Welcome {
            email: user.email.clone(),
            name: user.name.clone(),
        });
        Ok(user)
    }

    /// Exchange email and password for an access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken, ServiceError> {
        let email = email.trim().to_lowercase();
        let Some(user) = db::get_user_by_email(&self.pool, &email).await? else {
            return Err(ServiceError::Authentication(BAD_CREDENTIALS.into()));
        };
        if !self.verify_password(&user.password_hash, password).await? {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(ServiceError::Authentication(BAD_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(ServiceError::Authentication("account is inactive".into()));
        }

        Ok(AccessToken {
            access_token: token::issue_token(&self.tokens, TokenKind::Access, user.id, ""),
            token_type: "bearer",
        })
    }

    /// Resolve a bearer token to its active user.
    pub async fn authenticate(&self, bearer: &str) -> Result<User, ServiceError> {
        let claims = token::validate_token(&self.tokens, TokenKind::Access, bearer, "")
            .map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ServiceError::Authentication(BAD_TOKEN.into())
            })?;

        match db::get_user(&self.pool, claims.user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(ServiceError::Authentication(BAD_TOKEN.into())),
        }
    }

    pub async fn update_profile(&self, user_id: Uuid, name: &str) -> Result<User, ServiceError> {
        require_non_blank("name", name)?;
        db::update_user_name(&self.pool, user_id, name.trim())
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    /// Enqueue a reset email if the account exists. Succeeds either way.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        let Some(user) = db::get_user_by_email(&self.pool, &email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        let reset_token = token::issue_token(
            &self.tokens,
            TokenKind::PasswordReset,
            user.id,
            &user.password_hash,
        );
        tracing::info!(user_id = %user.id, "password reset requested");
        self.notifier.dispatch(Notification::PasswordReset {
            email: user.email,
            reset_token,
        });
        Ok(())
    }

    /// Set a new password using a reset token. The token is bound to the
    /// old password hash, so it works at most once.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        validate_password(new_password)?;
        let invalid = |e: TokenError| {
            tracing::debug!(error = %e, "reset token rejected");
            ServiceError::Authentication("invalid or expired reset token".into())
        };

        let user_id = token::peek_user_id(TokenKind::PasswordReset, reset_token).map_err(invalid)?;
        let user = db::get_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| invalid(TokenError::HmacMismatch))?;
        token::validate_token(
            &self.tokens,
            TokenKind::PasswordReset,
            reset_token,
            &user.password_hash,
        )
        .map_err(invalid)?;

        let hash = self.hash_password(new_password).await?;
        if !db::update_password_hash(&self.pool, user.id, &user.password_hash, &hash).await? {
            return Err(invalid(TokenError::HmacMismatch));
        }
        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Delete the account and everything it owns.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if !db::delete_user(&self.pool, user_id).await? {
            return Err(ServiceError::NotFound("user"));
        }
        tracing::info!(user_id = %user_id, "account deleted");
        Ok(())
    }

    async fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task failed")?;
        Ok(hash)
    }

    async fn verify_password(&self, stored: &str, password: &str) -> Result<bool, ServiceError> {
        let stored = stored.to_owned();
        let password = password.to_owned();
        let verdict = tokio::task::spawn_blocking(move || PasswordHasher::verify(&stored, &password))
            .await
            .context("password verification task failed")?;
        match verdict {
            Ok(matches) => Ok(matches),
            Err(PasswordError::Malformed(detail)) => {
                tracing::warn!(detail = %detail, "stored password hash is malformed");
                Ok(false)
            }
        }
    }
}

fn normalize_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::Validation(format!("invalid email address: {email:?}")));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
