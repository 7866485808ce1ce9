//! # Application Configuration
//!
//! Loads the server configuration once at startup from an optional YAML file
//! and environment variables, then validates it into the credential types the
//! `boxvision` library expects.
//!
//! Private keys are commonly stored in environment variables with their
//! newlines escaped (`\n`). Decoding those escapes is part of loading: the
//! resulting `AppConfig` always holds real PEM text.

use boxvision::{
    constants::{
        BOX_API_URL, BOX_TOKEN_URL, DEFAULT_MAX_FILE_BYTES, GOOGLE_TOKEN_URL,
        GOOGLE_VISION_API_URL,
    },
    providers::{storage::BoxAppAuth, vision::ServiceAccountCredentials},
};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::{env, fs};
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// A required setting is absent or empty.
    Missing(String),
    /// A setting is present but cannot be used.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::Missing(key) => write!(f, "Missing required setting: {key}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid setting: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The flat settings as read from the file and environment, before validation.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_max_file_bytes")]
    max_file_bytes: usize,

    gcv_project_id: Option<String>,
    gcv_client_email: Option<String>,
    gcv_private_key: Option<String>,
    #[serde(default = "default_gcv_api_url")]
    gcv_api_url: String,
    #[serde(default = "default_gcv_token_url")]
    gcv_token_url: String,

    box_client_id: Option<String>,
    box_client_secret: Option<String>,
    box_key_id: Option<String>,
    box_private_key: Option<String>,
    #[serde(default)]
    box_passphrase: Option<String>,
    #[serde(default = "default_box_api_url")]
    box_api_url: String,
    #[serde(default = "default_box_token_url")]
    box_token_url: String,
}

fn default_port() -> u16 {
    9090
}

fn default_max_file_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}

fn default_gcv_api_url() -> String {
    GOOGLE_VISION_API_URL.to_string()
}

fn default_gcv_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_box_api_url() -> String {
    BOX_API_URL.to_string()
}

fn default_box_token_url() -> String {
    BOX_TOKEN_URL.to_string()
}

/// Endpoints of the external services. Overridable for testing.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub box_api_url: String,
    pub box_token_url: String,
    pub gcv_api_url: String,
    pub gcv_token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            box_api_url: default_box_api_url(),
            box_token_url: default_box_token_url(),
            gcv_api_url: default_gcv_api_url(),
            gcv_token_url: default_gcv_token_url(),
        }
    }
}

/// The validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT`.
    pub port: u16,
    /// Files larger than this are rejected before annotation.
    pub max_file_bytes: usize,
    pub box_auth: BoxAppAuth,
    pub vision_credentials: ServiceAccountCredentials,
    pub endpoints: Endpoints,
}

/// Decodes backslash escapes in a secret stored on a single line.
///
/// Supports `\n`, `\r`, `\t`, `\0`, `\\`, `\"`, `\'`, `\/` and `\uXXXX`.
/// Unknown escapes are kept as written.
pub fn unescape(raw: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!("bad unicode escape `\\u{hex}`"))
                    })?;
                out.push(decoded);
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    Ok(out)
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn private_key(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    let pem = unescape(&required(value, key)?)?;
    if !pem.contains("-----BEGIN") || !pem.contains("PRIVATE KEY-----") {
        return Err(ConfigError::Invalid(format!(
            "{key} does not contain a PEM private key"
        )));
    }
    Ok(pem)
}

impl RawConfig {
    fn validate(self) -> Result<AppConfig, ConfigError> {
        if self.max_file_bytes == 0 {
            return Err(ConfigError::Invalid(
                "MAX_FILE_BYTES must be greater than zero".to_string(),
            ));
        }

        let box_auth = BoxAppAuth {
            client_id: required(self.box_client_id, "BOX_CLIENT_ID")?,
            client_secret: required(self.box_client_secret, "BOX_CLIENT_SECRET")?,
            key_id: required(self.box_key_id, "BOX_KEY_ID")?,
            private_key: private_key(self.box_private_key, "BOX_PRIVATE_KEY")?,
            passphrase: self.box_passphrase.unwrap_or_default(),
        };

        let vision_credentials = ServiceAccountCredentials {
            project_id: required(self.gcv_project_id, "GCV_PROJECT_ID")?,
            client_email: required(self.gcv_client_email, "GCV_CLIENT_EMAIL")?,
            private_key: private_key(self.gcv_private_key, "GCV_PRIVATE_KEY")?,
        };

        Ok(AppConfig {
            port: self.port,
            max_file_bytes: self.max_file_bytes,
            box_auth,
            vision_credentials,
            endpoints: Endpoints {
                box_api_url: self.box_api_url,
                box_token_url: self.box_token_url,
                gcv_api_url: self.gcv_api_url,
                gcv_token_url: self.gcv_token_url,
            },
        })
    }
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads and validates the application configuration.
///
/// Layers, lowest precedence first:
/// - `config.yml` next to the server manifest, or `config_path_override`;
///   `${VAR}` references in the file are substituted from the environment.
/// - Top-level environment variables (`PORT`, `BOX_CLIENT_ID`, `GCV_PRIVATE_KEY`, ...).
/// - `BOXVISION_`-prefixed environment variables (e.g. `BOXVISION_MAX_FILE_BYTES`).
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let config_path = match config_path_override {
        Some(path) => path.to_string(),
        None => format!("{}/config.yml", env!("CARGO_MANIFEST_DIR")),
    };

    let mut builder = ConfigBuilder::builder();
    match read_and_substitute(&config_path)? {
        Some(content) => {
            info!("Loading configuration from '{config_path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path_override.is_some() => {
            return Err(ConfigError::General(format!(
                "Config file not found at '{config_path}'."
            )));
        }
        None => {}
    }

    let settings = builder
        .add_source(Environment::default())
        .add_source(Environment::with_prefix("BOXVISION").prefix_separator("_"))
        .build()?;

    let raw: RawConfig = settings.try_deserialize()?;
    raw.validate()
}
