use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("Unsupported queue connection '{0}': only the in-process memory:// bus is built in, so no external broker can deliver requests")]
    UnsupportedQueue(String),
}

/// Which authorization backend answers permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    /// Grants every request, for local runs
    Simulated,
    /// Calls the permission endpoint at `auth_permission_url`
    Hosted,
}

impl AuthProvider {
    /// `AUTH_SIMULATE` accepts true/yes/1; anything else means hosted.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(|v| v.trim().to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "yes" | "1") => AuthProvider::Simulated,
            _ => AuthProvider::Hosted,
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthProvider::Simulated => write!(f, "Simulated"),
            AuthProvider::Hosted => write!(f, "Hosted"),
        }
    }
}

/// Connection details for the S3-compatible blob store
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    /// Custom endpoint (MinIO, Azurite gateway, ...). SDK default when absent.
    pub endpoint: Option<String>,

    /// Region (default: "us-east-1")
    pub region: String,

    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Worker configuration, built once at startup and passed to each component
#[derive(Debug, Clone)]
pub struct Settings {
    /// Queue connection string (required)
    pub queue_connection: String,

    /// Topic carrying upload requests (required)
    pub request_topic: String,

    /// Subscription on the request topic (required)
    pub request_subscription: String,

    /// Topic receiving validation results (required)
    pub response_topic: String,

    /// Blob container holding uploaded files (default: "osw")
    pub container_name: String,

    /// Permission endpoint, required for the hosted provider
    pub auth_permission_url: Option<String>,

    /// Authorization mode (default: Hosted)
    pub auth_provider: AuthProvider,

    /// In-flight message cap (default: 2)
    pub max_concurrent_messages: usize,

    /// Root for per-run workspaces (default: "<cwd>/downloads")
    pub download_dir: PathBuf,

    /// Error ceiling handed to the validation engine (default: 20)
    pub max_validation_errors: usize,

    /// Validation engine executable (default: "osw-validate")
    pub engine_command: String,

    /// Version tag reported in outbound package metadata (default: "unknown")
    pub engine_version: String,

    /// How long shutdown waits for in-flight messages (default: 30s)
    pub shutdown_drain: Duration,

    pub storage: StorageSettings,

    /// Health endpoint port (default: 8000)
    pub port: u16,
}

impl Settings {
    pub const DEFAULT_CONTAINER: &'static str = "osw";
    pub const DEFAULT_MAX_CONCURRENT_MESSAGES: usize = 2;
    pub const DEFAULT_MAX_VALIDATION_ERRORS: usize = 20;
    pub const DEFAULT_ENGINE_COMMAND: &'static str = "osw-validate";
    pub const DEFAULT_DRAIN_SECS: u64 = 30;
    pub const DEFAULT_PORT: u16 = 8000;

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let auth_provider = AuthProvider::from_flag(value("AUTH_SIMULATE").as_deref());
        let auth_permission_url = value("AUTH_PERMISSION_URL");
        if auth_provider == AuthProvider::Hosted && auth_permission_url.is_none() {
            return Err(ConfigError::Missing("AUTH_PERMISSION_URL"));
        }

        let max_concurrent_messages = parse_or(
            "MAX_CONCURRENT_MESSAGES",
            value("MAX_CONCURRENT_MESSAGES"),
            Self::DEFAULT_MAX_CONCURRENT_MESSAGES,
        )?;
        if max_concurrent_messages == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_MESSAGES",
                value: "0".to_string(),
            });
        }

        let download_dir = match value("DOWNLOAD_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("downloads"),
        };

        Ok(Self {
            queue_connection: required("QUEUECONNECTION")?,
            request_topic: required("VALIDATION_REQ_TOPIC")?,
            request_subscription: required("VALIDATION_REQ_SUB")?,
            response_topic: required("VALIDATION_RES_TOPIC")?,
            container_name: value("CONTAINER_NAME")
                .unwrap_or_else(|| Self::DEFAULT_CONTAINER.to_string()),
            auth_permission_url,
            auth_provider,
            max_concurrent_messages,
            download_dir,
            max_validation_errors: parse_or(
                "VALIDATION_MAX_ERRORS",
                value("VALIDATION_MAX_ERRORS"),
                Self::DEFAULT_MAX_VALIDATION_ERRORS,
            )?,
            engine_command: value("VALIDATION_ENGINE_CMD")
                .unwrap_or_else(|| Self::DEFAULT_ENGINE_COMMAND.to_string()),
            engine_version: value("VALIDATION_ENGINE_VERSION")
                .unwrap_or_else(|| "unknown".to_string()),
            shutdown_drain: Duration::from_secs(parse_or(
                "SHUTDOWN_DRAIN_SECS",
                value("SHUTDOWN_DRAIN_SECS"),
                Self::DEFAULT_DRAIN_SECS,
            )?),
            storage: StorageSettings {
                endpoint: value("STORAGE_ENDPOINT"),
                region: value("STORAGE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                access_key: value("STORAGE_ACCESS_KEY"),
                secret_key: value("STORAGE_SECRET_KEY"),
            },
            port: parse_or("PORT", value("PORT"), Self::DEFAULT_PORT)?,
        })
    }

    /// Settings for local runs and tests: in-process bus, simulated auth
    pub fn development(download_dir: PathBuf) -> Self {
        Self {
            queue_connection: "memory://local".to_string(),
            request_topic: "osw-validation-request".to_string(),
            request_subscription: "osw-validation-worker".to_string(),
            response_topic: "osw-validation-response".to_string(),
            container_name: Self::DEFAULT_CONTAINER.to_string(),
            auth_permission_url: None,
            auth_provider: AuthProvider::Simulated,
            max_concurrent_messages: Self::DEFAULT_MAX_CONCURRENT_MESSAGES,
            download_dir,
            max_validation_errors: Self::DEFAULT_MAX_VALIDATION_ERRORS,
            engine_command: Self::DEFAULT_ENGINE_COMMAND.to_string(),
            engine_version: "unknown".to_string(),
            shutdown_drain: Duration::from_secs(Self::DEFAULT_DRAIN_SECS),
            storage: StorageSettings {
                region: "us-east-1".to_string(),
                ..StorageSettings::default()
            },
            port: Self::DEFAULT_PORT,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("QUEUECONNECTION", "memory://test"),
        ("VALIDATION_REQ_TOPIC", "req"),
        ("VALIDATION_REQ_SUB", "sub"),
        ("VALIDATION_RES_TOPIC", "res"),
        ("AUTH_PERMISSION_URL", "http://auth.local/permission"),
    ];

    #[test]
    fn test_defaults() {
        let settings = Settings::from_source(source(REQUIRED)).unwrap();
        assert_eq!(settings.container_name, "osw");
        assert_eq!(settings.auth_provider, AuthProvider::Hosted);
        assert_eq!(settings.max_concurrent_messages, 2);
        assert_eq!(settings.max_validation_errors, 20);
        assert_eq!(settings.port, 8000);
        assert!(settings.download_dir.ends_with("downloads"));
    }

    #[test]
    fn test_missing_required_key() {
        let err = Settings::from_source(source(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("QUEUECONNECTION"));
    }

    #[test]
    fn test_hosted_requires_permission_url() {
        let err = Settings::from_source(source(&REQUIRED[..4])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AUTH_PERMISSION_URL"));

        let mut pairs = REQUIRED[..4].to_vec();
        pairs.push(("AUTH_SIMULATE", "yes"));
        let settings = Settings::from_source(source(&pairs)).unwrap();
        assert_eq!(settings.auth_provider, AuthProvider::Simulated);
    }

    #[test]
    fn test_auth_flag_parsing() {
        assert_eq!(AuthProvider::from_flag(Some("TRUE")), AuthProvider::Simulated);
        assert_eq!(AuthProvider::from_flag(Some("1")), AuthProvider::Simulated);
        assert_eq!(AuthProvider::from_flag(Some("no")), AuthProvider::Hosted);
        assert_eq!(AuthProvider::from_flag(Some("maybe")), AuthProvider::Hosted);
        assert_eq!(AuthProvider::from_flag(None), AuthProvider::Hosted);
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_CONCURRENT_MESSAGES", "lots"));
        assert!(matches!(
            Settings::from_source(source(&pairs)),
            Err(ConfigError::Invalid { key: "MAX_CONCURRENT_MESSAGES", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_CONCURRENT_MESSAGES", "0"));
        assert!(Settings::from_source(source(&pairs)).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("CONTAINER_NAME", "gtfs"),
            ("MAX_CONCURRENT_MESSAGES", "8"),
            ("DOWNLOAD_DIR", "/tmp/osw"),
            ("SHUTDOWN_DRAIN_SECS", "5"),
        ]);
        let settings = Settings::from_source(source(&pairs)).unwrap();
        assert_eq!(settings.container_name, "gtfs");
        assert_eq!(settings.max_concurrent_messages, 8);
        assert_eq!(settings.download_dir, PathBuf::from("/tmp/osw"));
        assert_eq!(settings.shutdown_drain, Duration::from_secs(5));
    }
}
