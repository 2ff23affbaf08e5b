//! # Migra Configuration
//!
//! Configuration for the CRM source, the destination store, the cycle and
//! the completion notifier.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MIGRA_SOURCE_TOKEN=1000.abc...                                     │
//! │     MIGRA_RECORD_CAP=4000                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/migra/migra.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.migra.migra/migra.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [source]
//! base_url = "https://www.zohoapis.com.au/crm/v2"
//! module = "Leads"
//! token = "1000.xxxx"
//! page_size = 200
//!
//! [destination]
//! database_path = "/var/lib/migra/migra.db"
//!
//! [sync]
//! record_cap = 4000
//! key_field = "Email"
//! required_fields = ["Email", "Lead_Status", "Phone"]
//! validation_source = "refetch"  # refetch | reuse_extract
//!
//! [notify]
//! webhook_url = "https://hooks.example.com/migra"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use migra_core::{DEFAULT_KEY_FIELD, DEFAULT_LEAD_FIELDS, DEFAULT_REQUIRED_FIELDS};

/// Largest page the CRM API will serve.
pub const MAX_PAGE_SIZE: u32 = 200;

// =============================================================================
// Source Settings
// =============================================================================

/// Where and how to read leads from the CRM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// API root, without the module segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// CRM module to read (appended to `base_url`).
    #[serde(default = "default_module")]
    pub module: String,

    /// OAuth access token. Obtaining and refreshing it happens outside Migra.
    #[serde(default)]
    pub token: Option<String>,

    /// Prefix of the `Authorization` header value.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Fields requested on every page.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Records per page (1..=200).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://www.zohoapis.com.au/crm/v2".to_string()
}

fn default_module() -> String {
    "Leads".to_string()
}

fn default_auth_scheme() -> String {
    "Zoho-oauthtoken".to_string()
}

fn default_fields() -> Vec<String> {
    DEFAULT_LEAD_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            base_url: default_base_url(),
            module: default_module(),
            token: None,
            auth_scheme: default_auth_scheme(),
            fields: default_fields(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SourceSettings {
    /// Full URL of the module collection, e.g. `.../crm/v2/Leads`.
    pub fn module_url(&self) -> SyncResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.module.trim_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Destination Settings
// =============================================================================

/// The local document store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Fields stripped from stored documents before validation.
    #[serde(default)]
    pub exclude_fields: Vec<String>,
}

impl DestinationSettings {
    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("com", "migra", "migra")
                    .map(|dirs| dirs.data_dir().join("migra.db"))
            })
            .unwrap_or_else(|| PathBuf::from("migra.db"))
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Which records the validation step compares against the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSource {
    /// Fetch the source again, capped like the extraction.
    #[default]
    Refetch,

    /// Reuse the records from this cycle's extraction.
    ReuseExtract,
}

impl std::fmt::Display for ValidationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationSource::Refetch => write!(f, "refetch"),
            ValidationSource::ReuseExtract => write!(f, "reuse_extract"),
        }
    }
}

impl std::str::FromStr for ValidationSource {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "refetch" => Ok(ValidationSource::Refetch),
            "reuse_extract" | "reuse" => Ok(ValidationSource::ReuseExtract),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown validation source: '{}'. Valid options: refetch, reuse_extract",
                other
            ))),
        }
    }
}

/// Cycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Upper bound on records fetched per extraction.
    #[serde(default = "default_record_cap")]
    pub record_cap: usize,

    /// Field that identifies a lead in both stores.
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Fields compared during validation, in report order.
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,

    #[serde(default)]
    pub validation_source: ValidationSource,
}

fn default_record_cap() -> usize {
    4000
}

fn default_key_field() -> String {
    DEFAULT_KEY_FIELD.to_string()
}

fn default_required_fields() -> Vec<String> {
    DEFAULT_REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect()
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            record_cap: default_record_cap(),
            key_field: default_key_field(),
            required_fields: default_required_fields(),
            validation_source: ValidationSource::default(),
        }
    }
}

// =============================================================================
// Notify Settings
// =============================================================================

/// Completion notification target. Without a webhook, completion is logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySettings {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    "ETL Process Completed".to_string()
}

impl Default for NotifySettings {
    fn default() -> Self {
        NotifySettings {
            webhook_url: None,
            subject: default_subject(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Migra configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigraConfig {
    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub destination: DestinationSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

impl MigraConfig {
    /// Loads configuration from file, environment, and defaults, then
    /// validates it.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`migra.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else if explicit {
                return Err(SyncError::ConfigLoadFailed(format!(
                    "config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        match self.source.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => {
                return Err(SyncError::MissingCredential(
                    "source.token (or MIGRA_SOURCE_TOKEN)".into(),
                ))
            }
        }

        let url = self.source.module_url()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Source URL must use http:// or https://, got: {}",
                self.source.base_url
            )));
        }

        if self.source.module.trim().is_empty() {
            return Err(SyncError::InvalidConfig("source.module must not be empty".into()));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.source.page_size) {
            return Err(SyncError::InvalidConfig(format!(
                "source.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.source.page_size
            )));
        }

        if self.sync.record_cap == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.record_cap must be greater than 0".into(),
            ));
        }

        if self.sync.key_field.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "sync.key_field must not be empty".into(),
            ));
        }

        let compared = std::iter::once(&self.sync.key_field).chain(&self.sync.required_fields);
        for field in compared {
            if self.destination.exclude_fields.contains(field) {
                return Err(SyncError::InvalidConfig(format!(
                    "destination.exclude_fields must not contain compared field {field}"
                )));
            }
        }

        if let Some(ref webhook) = self.notify.webhook_url {
            Url::parse(webhook)?;
        }

        Ok(())
    }

    /// Applies `MIGRA_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary lookup. Unparseable numbers are
    /// warned about and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MIGRA_SOURCE_URL") {
            debug!(url = %url, "Overriding source URL from environment");
            self.source.base_url = url;
        }

        if let Some(token) = lookup("MIGRA_SOURCE_TOKEN") {
            self.source.token = Some(token);
        }

        if let Some(path) = lookup("MIGRA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.destination.database_path = Some(PathBuf::from(path));
        }

        if let Some(cap) = lookup("MIGRA_RECORD_CAP") {
            match cap.parse::<usize>() {
                Ok(c) => self.sync.record_cap = c,
                Err(_) => warn!(value = %cap, "Ignoring non-numeric MIGRA_RECORD_CAP"),
            }
        }

        if let Some(size) = lookup("MIGRA_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(s) => self.source.page_size = s,
                Err(_) => warn!(value = %size, "Ignoring non-numeric MIGRA_PAGE_SIZE"),
            }
        }

        if let Some(source) = lookup("MIGRA_VALIDATION_SOURCE") {
            match source.parse() {
                Ok(parsed) => self.sync.validation_source = parsed,
                Err(e) => warn!(error = %e, "Ignoring MIGRA_VALIDATION_SOURCE"),
            }
        }

        if let Some(url) = lookup("MIGRA_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "migra", "migra")
            .map(|dirs| dirs.config_dir().join("migra.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> MigraConfig {
        let mut config = MigraConfig::default();
        config.source.token = Some("1000.test".into());
        config
    }

    #[test]
    fn test_defaults() {
        let config = MigraConfig::default();
        assert_eq!(config.source.module, "Leads");
        assert_eq!(config.source.page_size, 200);
        assert_eq!(config.source.auth_scheme, "Zoho-oauthtoken");
        assert_eq!(config.source.fields.len(), 7);
        assert_eq!(config.sync.record_cap, 4000);
        assert_eq!(config.sync.key_field, "Email");
        assert_eq!(
            config.sync.required_fields,
            vec!["Email", "Lead_Status", "Phone"]
        );
        assert_eq!(config.sync.validation_source, ValidationSource::Refetch);
    }

    #[test]
    fn test_missing_token_is_credential_error() {
        let config = MigraConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SyncError::MissingCredential(_))
        ));

        let mut blank = valid();
        blank.source.token = Some("  ".into());
        assert!(matches!(blank.validate(), Err(SyncError::MissingCredential(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid();
        assert!(config.validate().is_ok());

        config.source.page_size = 0;
        assert!(config.validate().is_err());
        config.source.page_size = 201;
        assert!(config.validate().is_err());
        config.source.page_size = 50;

        config.sync.record_cap = 0;
        assert!(config.validate().is_err());
        config.sync.record_cap = 10;

        config.source.base_url = "ftp://crm.example.com".into();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));
        config.source.base_url = "http://localhost:8080/crm/v2".into();

        config.notify.webhook_url = Some("not a url".into());
        assert!(config.validate().is_err());
        config.notify.webhook_url = Some("https://hooks.example.com/x".into());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_excluded_fields_must_not_hide_compared_fields() {
        let mut config = valid();
        config.destination.exclude_fields = vec!["_id".into(), "loaded_at".into()];
        assert!(config.validate().is_ok());

        config.destination.exclude_fields = vec!["Lead_Status".into()];
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));

        config.sync.required_fields = vec!["Phone".into()];
        config.destination.exclude_fields = vec!["Email".into()];
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_module_url() {
        let mut settings = SourceSettings::default();
        settings.base_url = "https://crm.example.com/crm/v2/".into();
        assert_eq!(
            settings.module_url().unwrap().as_str(),
            "https://crm.example.com/crm/v2/Leads"
        );
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MIGRA_SOURCE_TOKEN", "env-token"),
            ("MIGRA_RECORD_CAP", "25"),
            ("MIGRA_PAGE_SIZE", "not-a-number"),
            ("MIGRA_VALIDATION_SOURCE", "reuse_extract"),
            ("MIGRA_DATABASE_PATH", "/tmp/migra-env.db"),
        ]
        .into_iter()
        .collect();

        let mut config = MigraConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.source.token.as_deref(), Some("env-token"));
        assert_eq!(config.sync.record_cap, 25);
        assert_eq!(config.source.page_size, 200);
        assert_eq!(config.sync.validation_source, ValidationSource::ReuseExtract);
        assert_eq!(
            config.destination.database_path(),
            PathBuf::from("/tmp/migra-env.db")
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MigraConfig = toml::from_str(
            r#"
            [source]
            token = "abc"
            page_size = 100

            [sync]
            validation_source = "reuse_extract"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.source.module, "Leads");
        assert_eq!(config.sync.record_cap, 4000);
        assert_eq!(config.sync.validation_source, ValidationSource::ReuseExtract);
        assert!(config.notify.webhook_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[source]\ntoken = \"file-token\"\n\n[sync]\nrecord_cap = 300\n"
        )
        .unwrap();

        let config = MigraConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.sync.record_cap, 300);
        assert!(config.source.token.is_some());
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = MigraConfig::load(Some(dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validation_source_parsing() {
        assert_eq!(
            "refetch".parse::<ValidationSource>().unwrap(),
            ValidationSource::Refetch
        );
        assert_eq!(
            "REUSE_EXTRACT".parse::<ValidationSource>().unwrap(),
            ValidationSource::ReuseExtract
        );
        assert!("sometimes".parse::<ValidationSource>().is_err());
    }
}
