//! TOML Configuration File Support
//!
//! Centralized configuration for the widget, the proxy and the contact form,
//! loaded from `~/.config/navian/widget.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables (`NAVIAN_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [widget]
//! api_url = "http://localhost:8000/chat"
//! proxy_url = "http://127.0.0.1:3000/chat"
//! urls = ["https://docs.example.com"]
//! company_name = "Acme"
//! show_welcome = true
//!
//! [reveal]
//! min_delay_ms = 80
//! max_delay_ms = 120
//!
//! [proxy]
//! listen = "127.0.0.1:3000"
//! upstream_url = "https://backend.example.com/chat"
//! path = "/chat"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [contact]
//! endpoint = "https://forms.example.com/f/abc123"
//! recipient = "hello@example.com"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reveal::RevealTiming;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[widget]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetToml {
    /// Chat backend endpoint
    pub api_url: Option<String>,
    /// Proxy endpoint; takes precedence over `api_url` when set
    pub proxy_url: Option<String>,
    /// Pages the backend should crawl for context
    pub urls: Option<Vec<String>>,
    /// Name shown in the header and sent to the backend
    pub company_name: Option<String>,
    /// Show the greeting on an empty chat
    pub show_welcome: Option<bool>,
    /// Connect timeout for the chat request
    pub connect_timeout_ms: Option<u64>,
}

/// `[reveal]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Lower bound of the per-word delay
    pub min_delay_ms: Option<u64>,
    /// Upper bound (exclusive) of the per-word delay
    pub max_delay_ms: Option<u64>,
}

/// `[proxy]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyToml {
    /// Socket address to bind
    pub listen: Option<String>,
    /// Backend the proxy forwards to
    pub upstream_url: Option<String>,
    /// Route the proxy serves
    pub path: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
}

/// `[contact]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactToml {
    /// Form submission endpoint
    pub endpoint: Option<String>,
    /// Address the form service should deliver to
    pub recipient: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavianToml {
    /// Widget section
    pub widget: WidgetToml,
    /// Reveal timing section
    pub reveal: RevealToml,
    /// Proxy section
    pub proxy: ProxyToml,
    /// Contact form section
    pub contact: ContactToml,
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Chat widget settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetSettings {
    /// Chat backend endpoint
    pub api_url: String,
    /// Proxy endpoint; used instead of `api_url` when set
    pub proxy_url: Option<String>,
    /// Pages the backend should crawl
    pub urls: Vec<String>,
    /// Display and request company name
    pub company_name: String,
    /// Show the welcome message
    pub show_welcome: bool,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/chat".to_string(),
            proxy_url: None,
            urls: Vec::new(),
            company_name: "Assistant".to_string(),
            show_welcome: true,
            connect_timeout_ms: 10_000,
        }
    }
}

impl WidgetSettings {
    /// Endpoint chat requests go to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.proxy_url.as_deref().unwrap_or(&self.api_url)
    }
}

/// Proxy settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxySettings {
    /// Socket address to bind
    pub listen: String,
    /// Backend URL
    pub upstream_url: String,
    /// Route path
    pub path: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            upstream_url: "http://localhost:8000/chat".to_string(),
            path: "/chat".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Contact form settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactSettings {
    /// Form submission endpoint; the form is unavailable without one
    pub endpoint: Option<String>,
    /// Delivery address passed as `_to`
    pub recipient: Option<String>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Everything loaded from defaults, file, environment and CLI
#[derive(Clone, Debug)]
pub struct NavianConfig {
    /// Widget settings
    pub widget: WidgetSettings,
    /// Reveal timing
    pub reveal: RevealTiming,
    /// Proxy settings
    pub proxy: ProxySettings,
    /// Contact form settings
    pub contact: ContactSettings,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for NavianConfig {
    fn default() -> Self {
        Self {
            widget: WidgetSettings::default(),
            reveal: RevealTiming::default(),
            proxy: ProxySettings::default(),
            contact: ContactSettings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl NavianConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the reveal range is
    /// inverted or an endpoint is not an http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reveal.min > self.reveal.max {
            return Err(ConfigError::ValidationError(format!(
                "reveal min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.reveal.min.as_millis(),
                self.reveal.max.as_millis()
            )));
        }

        check_http_url("widget.api_url", &self.widget.api_url)?;
        if let Some(url) = &self.widget.proxy_url {
            check_http_url("widget.proxy_url", url)?;
        }
        check_http_url("proxy.upstream_url", &self.proxy.upstream_url)?;
        if let Some(url) = &self.contact.endpoint {
            check_http_url("contact.endpoint", url)?;
        }

        if !self.proxy.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "proxy.path must start with '/': {}",
                self.proxy.path
            )));
        }
        Ok(())
    }
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must be an http(s) URL: {value}"
        )))
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/navian/widget.toml` or
/// `~/.config/navian/widget.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("navian").join("widget.toml"))
}

/// Load configuration from the default path, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed. A missing
/// config file is not an error. The result is not validated; callers apply
/// CLI overrides first, then call [`NavianConfig::validate`].
pub fn load_config() -> Result<NavianConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<NavianConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<NavianConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = NavianConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: NavianToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

fn apply_toml_config(config: &mut NavianConfig, toml: &NavianToml) {
    let widget = &toml.widget;
    if let Some(ref url) = widget.api_url {
        config.widget.api_url = url.clone();
    }
    if widget.proxy_url.is_some() {
        config.widget.proxy_url = widget.proxy_url.clone();
    }
    if let Some(ref urls) = widget.urls {
        config.widget.urls = urls.clone();
    }
    if let Some(ref name) = widget.company_name {
        config.widget.company_name = name.clone();
    }
    if let Some(show) = widget.show_welcome {
        config.widget.show_welcome = show;
    }
    if let Some(ms) = widget.connect_timeout_ms {
        config.widget.connect_timeout_ms = ms;
    }

    let min = toml
        .reveal
        .min_delay_ms
        .unwrap_or(config.reveal.min.as_millis() as u64);
    let max = toml
        .reveal
        .max_delay_ms
        .unwrap_or(config.reveal.max.as_millis() as u64);
    config.reveal = RevealTiming::from_millis(min, max);

    let proxy = &toml.proxy;
    if let Some(ref listen) = proxy.listen {
        config.proxy.listen = listen.clone();
    }
    if let Some(ref url) = proxy.upstream_url {
        config.proxy.upstream_url = url.clone();
    }
    if let Some(ref path) = proxy.path {
        config.proxy.path = path.clone();
    }
    if let Some(ref var) = proxy.api_key_env {
        config.proxy.api_key_env = var.clone();
    }

    if toml.contact.endpoint.is_some() {
        config.contact.endpoint = toml.contact.endpoint.clone();
    }
    if toml.contact.recipient.is_some() {
        config.contact.recipient = toml.contact.recipient.clone();
    }
}

fn apply_env_config<F>(config: &mut NavianConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("NAVIAN_API_URL") {
        config.widget.api_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("NAVIAN_PROXY_URL") {
        config.widget.proxy_url = Some(url).filter(|u| !u.is_empty());
        config.source = ConfigSource::Env;
    }
    if let Some(urls) = env("NAVIAN_URLS") {
        config.widget.urls = urls
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        config.source = ConfigSource::Env;
    }
    if let Some(name) = env("NAVIAN_COMPANY_NAME") {
        config.widget.company_name = name;
        config.source = ConfigSource::Env;
    }
    if let Some(show) = env("NAVIAN_SHOW_WELCOME") {
        config.widget.show_welcome = show != "0" && show.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("NAVIAN_REVEAL_MIN_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.reveal.min = std::time::Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env("NAVIAN_REVEAL_MAX_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.reveal.max = std::time::Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(listen) = env("NAVIAN_PROXY_LISTEN") {
        config.proxy.listen = listen;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("NAVIAN_UPSTREAM_URL") {
        config.proxy.upstream_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("NAVIAN_CONTACT_ENDPOINT") {
        config.contact.endpoint = Some(url);
        config.source = ConfigSource::Env;
    }
    if let Some(to) = env("NAVIAN_CONTACT_RECIPIENT") {
        config.contact.recipient = Some(to);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend endpoint override
    pub api_url: Option<String>,
    /// Proxy endpoint override
    pub proxy_url: Option<String>,
    /// Crawl URL list override
    pub urls: Option<Vec<String>>,
    /// Company name override
    pub company_name: Option<String>,
    /// Proxy bind address override
    pub listen: Option<String>,
    /// Proxy upstream override
    pub upstream_url: Option<String>,
    /// Proxy route override
    pub path: Option<String>,
    /// API key variable override
    pub api_key_env: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend endpoint override
    #[must_use]
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Set proxy endpoint override
    #[must_use]
    pub fn with_proxy_url(mut self, url: String) -> Self {
        self.proxy_url = Some(url);
        self
    }

    /// Set crawl URL list override
    #[must_use]
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = Some(urls);
        self
    }

    /// Set company name override
    #[must_use]
    pub fn with_company_name(mut self, name: String) -> Self {
        self.company_name = Some(name);
        self
    }

    /// Set proxy bind address override
    #[must_use]
    pub fn with_listen(mut self, listen: String) -> Self {
        self.listen = Some(listen);
        self
    }

    /// Set proxy upstream override
    #[must_use]
    pub fn with_upstream_url(mut self, url: String) -> Self {
        self.upstream_url = Some(url);
        self
    }

    /// Set proxy route override
    #[must_use]
    pub fn with_path(mut self, path: String) -> Self {
        self.path = Some(path);
        self
    }

    /// Set API key variable override
    #[must_use]
    pub fn with_api_key_env(mut self, var: String) -> Self {
        self.api_key_env = Some(var);
        self
    }

    fn is_empty(&self) -> bool {
        self.api_url.is_none()
            && self.proxy_url.is_none()
            && self.urls.is_none()
            && self.company_name.is_none()
            && self.listen.is_none()
            && self.upstream_url.is_none()
            && self.path.is_none()
            && self.api_key_env.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut NavianConfig) {
        if self.is_empty() {
            return;
        }
        config.source = ConfigSource::Cli;

        if let Some(ref url) = self.api_url {
            config.widget.api_url = url.clone();
        }
        if let Some(ref url) = self.proxy_url {
            config.widget.proxy_url = Some(url.clone());
        }
        if let Some(ref urls) = self.urls {
            config.widget.urls = urls.clone();
        }
        if let Some(ref name) = self.company_name {
            config.widget.company_name = name.clone();
        }
        if let Some(ref listen) = self.listen {
            config.proxy.listen = listen.clone();
        }
        if let Some(ref url) = self.upstream_url {
            config.proxy.upstream_url = url.clone();
        }
        if let Some(ref path) = self.path {
            config.proxy.path = path.clone();
        }
        if let Some(ref var) = self.api_key_env {
            config.proxy.api_key_env = var.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
