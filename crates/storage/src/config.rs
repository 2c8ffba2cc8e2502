//! Store connection settings.
//!
//! Settings are layered with the `config` crate: an optional TOML file,
//! then `DTSIM_*` environment variables. The conventional Azure and AWS
//! variables fill in whatever is still missing.

use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, StorageError};

/// Which backend variant sessions are created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// One blob container per session.
    #[default]
    Container,
    /// One key prefix per session inside a shared bucket.
    Prefix,
    /// Process-local store, nothing leaves the process.
    Memory,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "container" | "azure" | "blob" => Ok(BackendKind::Container),
            "prefix" | "s3" | "bucket" => Ok(BackendKind::Prefix),
            "memory" => Ok(BackendKind::Memory),
            other => Err(StorageError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Raw, partially-filled settings as they come out of the layered sources.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawSettings {
    backend: Option<String>,
    azure_connection_string: Option<String>,
    s3_bucket: Option<String>,
    s3_region: Option<String>,
    s3_access_key_id: Option<String>,
    s3_secret_access_key: Option<String>,
    s3_session_token: Option<String>,
    s3_endpoint: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Connection settings for the object store.
///
/// Completeness is checked when a connector is built from it, so a missing
/// credential surfaces as a construction-time `Config` error.
#[derive(Clone, Default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub azure_connection_string: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_session_token: Option<String>,
    pub s3_endpoint: Option<String>,
    pub request_timeout: Option<Duration>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("azure_connection_string", &redact(&self.azure_connection_string))
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field("s3_secret_access_key", &redact(&self.s3_secret_access_key))
            .field("s3_session_token", &redact(&self.s3_session_token))
            .field("s3_endpoint", &self.s3_endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl StoreConfig {
    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &|name: &str| std::env::var(name).ok())
    }

    /// Like [`StoreConfig::load`] with an explicit lookup for the
    /// conventional provider variables.
    pub fn load_with(path: Option<&Path>, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(StorageError::Config(format!(
                    "configuration file {} not found",
                    path.display()
                )));
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("DTSIM"));

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::from_raw(raw, lookup)
    }

    fn from_raw(raw: RawSettings, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match raw.backend.as_deref() {
            Some(value) => BackendKind::parse(value)?,
            None => BackendKind::default(),
        };

        let fallback = |value: Option<String>, name: &str| value.or_else(|| lookup(name));

        Ok(Self {
            backend,
            azure_connection_string: fallback(
                raw.azure_connection_string,
                "AZURE_BLOB_CONNECTION_STRING",
            ),
            s3_bucket: raw.s3_bucket,
            s3_region: fallback(raw.s3_region, "AWS_REGION"),
            s3_access_key_id: fallback(raw.s3_access_key_id, "AWS_ACCESS_KEY_ID"),
            s3_secret_access_key: fallback(raw.s3_secret_access_key, "AWS_SECRET_ACCESS_KEY"),
            s3_session_token: fallback(raw.s3_session_token, "AWS_SESSION_TOKEN"),
            s3_endpoint: raw.s3_endpoint,
            request_timeout: raw.request_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Settings for a process-local store.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }
}

/// Require a setting, naming it in the error when absent.
pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StorageError::Config(format!("missing required setting {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_to_container_backend() {
        let config = StoreConfig::from_raw(RawSettings::default(), &no_env).unwrap();
        assert_eq!(config.backend, BackendKind::Container);
        assert!(config.azure_connection_string.is_none());
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(BackendKind::parse("S3").unwrap(), BackendKind::Prefix);
        assert_eq!(BackendKind::parse(" azure ").unwrap(), BackendKind::Container);
        assert_eq!(BackendKind::parse("memory").unwrap(), BackendKind::Memory);
        assert!(BackendKind::parse("ftp").is_err());
    }

    #[test]
    fn test_provider_variables_fill_gaps() {
        let lookup = |name: &str| match name {
            "AWS_REGION" => Some("eu-central-1".to_string()),
            "AWS_ACCESS_KEY_ID" => Some("AKID".to_string()),
            "AZURE_BLOB_CONNECTION_STRING" => Some("AccountName=a".to_string()),
            _ => None,
        };
        let raw = RawSettings {
            backend: Some("prefix".to_string()),
            s3_region: Some("us-east-1".to_string()),
            ..RawSettings::default()
        };

        let config = StoreConfig::from_raw(raw, &lookup).unwrap();
        assert_eq!(config.backend, BackendKind::Prefix);
        assert_eq!(config.s3_region.as_deref(), Some("us-east-1"));
        assert_eq!(config.s3_access_key_id.as_deref(), Some("AKID"));
        assert_eq!(
            config.azure_connection_string.as_deref(),
            Some("AccountName=a")
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "backend = \"prefix\"").unwrap();
        writeln!(file, "s3_bucket = \"uploads\"").unwrap();
        writeln!(file, "s3_region = \"eu-west-1\"").unwrap();
        writeln!(file, "request_timeout_secs = 15").unwrap();
        file.flush().unwrap();

        let config = StoreConfig::load_with(Some(file.path()), &no_env).unwrap();
        assert_eq!(config.backend, BackendKind::Prefix);
        assert_eq!(config.s3_bucket.as_deref(), Some("uploads"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = StoreConfig::load_with(Some(Path::new("/nonexistent/dtsim.toml")), &no_env)
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = StoreConfig {
            azure_connection_string: Some("AccountKey=topsecret".to_string()),
            s3_secret_access_key: Some("alsosecret".to_string()),
            ..StoreConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("alsosecret"));
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(&Some("  ".to_string()), "x").is_err());
        assert!(required(&None, "x").is_err());
        assert_eq!(required(&Some("v".to_string()), "x").unwrap(), "v");
    }
}
