//! Configuration file management for bizplan.
//!
//! Provides a TOML-based config file at `~/.config/bizplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use bizplan_core::credentials::TokenConfig;
use bizplan_core::credentials::token::TOKEN_SECRET_ENV;
use bizplan_core::generator::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use bizplan_core::generator::{ContentCollaborator, GeminiConfig};
use bizplan_core::notify::{APP_NAME, MailSettings};
use bizplan_db::config::{DATABASE_URL_ENV, DbConfig};

/// Environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "BIZPLAN_GEMINI_API_KEY";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub mail: MailSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,
}

fn default_token_ttl_minutes() -> u64 {
    TokenConfig::DEFAULT_ACCESS_TTL.as_secs() / 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: ContentCollaborator::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Base URL used for links in outgoing emails.
    pub public_base_url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            public_base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    pub from_address: String,
    pub from_name: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            from_address: "no-reply@localhost".to_string(),
            from_name: APP_NAME.to_string(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the bizplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/bizplan` or `~/.config/bizplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("bizplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bizplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// The file is readable by the owner only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct BizplanConfig {
    pub db_config: DbConfig,
    pub token_config: TokenConfig,
    /// `None` when no API key is configured.
    pub gemini: Option<GeminiConfig>,
    pub ai_timeout: Duration,
    pub server: ServerSection,
    pub mail: MailSettings,
}

impl BizplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `BIZPLAN_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `BIZPLAN_TOKEN_SECRET` > `auth.token_secret` > error
    /// - Gemini key: `BIZPLAN_GEMINI_API_KEY` > `ai.gemini_api_key` > unconfigured
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        Self::from_file(cli_db_url, load_config().ok())
    }

    fn from_file(cli_db_url: Option<&str>, file_config: Option<ConfigFile>) -> Result<Self> {
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let mut token_config = if let Ok(secret_hex) = std::env::var(TOKEN_SECRET_ENV) {
            TokenConfig::from_hex(&secret_hex)
                .with_context(|| format!("{TOKEN_SECRET_ENV} env var is not a valid secret"))?
        } else if let Some(ref cfg) = file_config {
            TokenConfig::from_hex(&cfg.auth.token_secret)
                .context("invalid token_secret in config file")?
        } else {
            bail!(
                "token secret not found; set {TOKEN_SECRET_ENV} or run `bizplan init` to create a config file"
            );
        };
        if let Some(ref cfg) = file_config {
            let minutes = cfg.auth.token_ttl_minutes.max(1);
            token_config = token_config.with_access_ttl(Duration::from_secs(minutes * 60));
        }

        let (ai, server, mail) = match file_config {
            Some(cfg) => (cfg.ai, cfg.server, cfg.mail),
            None => Default::default(),
        };

        let api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .or(ai.gemini_api_key)
            .filter(|key| !key.trim().is_empty());
        let gemini = api_key.map(|key| GeminiConfig {
            api_key: key,
            model: ai.model,
            base_url: ai.base_url,
        });

        let mail = MailSettings {
            from_address: mail.from_address,
            from_name: mail.from_name,
            public_base_url: server.public_base_url.clone(),
        };

        Ok(Self {
            db_config,
            token_config,
            gemini,
            ai_timeout: Duration::from_secs(ai.timeout_secs.max(1)),
            server,
            mail,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
