//! TOML configuration with environment overrides for secrets.
//!
//! Every section is optional; a missing file yields defaults. The signing
//! key has no usable default and must come from `[auth] jwt_key` or the
//! `STOCKMASTER_JWT_KEY` environment variable.

use crate::auth::{TokenConfig, DEFAULT_TOKEN_TTL};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that takes priority over `[auth] jwt_key`.
pub const JWT_KEY_ENV: &str = "STOCKMASTER_JWT_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding accounts and products. `~` and `$VARS` expand.
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = project_dirs()
            .map(|dirs| dirs.data_dir().join("stockmaster.db"))
            .unwrap_or_else(|| PathBuf::from("stockmaster.db"));
        Self {
            db_path: db_path.to_string_lossy().into_owned(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.db_path)
            .with_context(|| format!("expanding storage.db_path '{}'", self.db_path))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. At least 32 bytes.
    pub jwt_key: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: u64,
    /// bcrypt work factor (4..=31).
    pub bcrypt_cost: u32,
    pub min_password_len: usize,
    pub allow_registration: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_key: String::new(),
            issuer: "stockmaster".into(),
            audience: "stockmaster-clients".into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL.as_secs(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            min_password_len: 1,
            allow_registration: true,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("min_password_len", &self.min_password_len)
            .field("allow_registration", &self.allow_registration)
            .finish()
    }
}

impl AuthConfig {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            signing_key: self.jwt_key.as_bytes().to_vec(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            lifetime: Duration::from_secs(self.token_ttl_secs),
        }
    }
}

impl Config {
    /// Default config file location (`<config dir>/stockmaster/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location), apply environment
    /// overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                let config = Self::from_toml(&raw)
                    .with_context(|| format!("parsing config {}", p.display()))?;
                tracing::info!(path = %p.display(), "Loaded config");
                config
            }
            Some(ref p) => {
                tracing::info!(path = %p.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Priority: environment variable > config file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(JWT_KEY_ENV)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
        {
            self.auth.jwt_key = key;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_key.trim().is_empty() {
            bail!("auth.jwt_key is not set (configure it or export {JWT_KEY_ENV})");
        }
        if self.auth.jwt_key.len() < crate::auth::token::MIN_SIGNING_KEY_BYTES {
            bail!(
                "auth.jwt_key must be at least {} bytes",
                crate::auth::token::MIN_SIGNING_KEY_BYTES
            );
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!("auth.bcrypt_cost must be between 4 and 31");
        }
        if self.auth.issuer.is_empty() || self.auth.audience.is_empty() {
            bail!("auth.issuer and auth.audience must not be empty");
        }
        Ok(())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "stockmaster")
}
