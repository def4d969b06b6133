use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use evolution_gateway::DEFAULT_INTEGRATION;
use validator::{Validate, ValidationError};

/// Gateway address used when `EVOLUTION_API_URL` is not set
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Artifact path used when `WHATSAPP_QR_PATH` is not set
pub const DEFAULT_ARTIFACT_PATH: &str = "whatsapp_qr.png";

const REDACTED: &str = "<redacted>";

/// Errors raised while loading or validating configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Value as found in the environment
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Values parsed but failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Delays and retry budget of a provisioning run
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct PacingPolicy {
    /// Wait after the reset step (default: 2 seconds)
    pub reset_settle: Duration,

    /// Wait after a successful create before polling (default: 5 seconds)
    pub create_settle: Duration,

    /// Wait between poll attempts (default: 3 seconds)
    pub poll_interval: Duration,

    /// Maximum number of connect attempts (default: 3)
    #[validate(range(min = 1, max = 20, message = "Poll attempts must be between 1 and 20"))]
    pub max_poll_attempts: u32,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            reset_settle: Duration::from_secs(2),
            create_settle: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 3,
        }
    }
}

/// Everything a provisioning run needs, fixed for the process lifetime
#[derive(Clone, Validate)]
pub struct ProvisionerConfig {
    /// Gateway base address
    #[validate(url(message = "Gateway URL must be a valid URL"))]
    pub base_url: String,

    /// Value of the `apikey` header
    #[validate(length(min = 1, message = "API key is required"))]
    pub api_key: String,

    /// Session identifier
    #[validate(
        length(min = 1, max = 64, message = "Instance name must be 1-64 characters"),
        custom(function = "validate_instance_name")
    )]
    pub instance_name: String,

    /// Per-instance token sent on create
    #[validate(length(min = 1, message = "Instance token is required"))]
    pub instance_token: String,

    /// Messaging backend id
    #[validate(length(min = 1, message = "Integration is required"))]
    pub integration: String,

    /// Where the pairing PNG is written
    pub artifact_path: PathBuf,

    /// Delays and poll budget
    #[validate(nested)]
    pub pacing: PacingPolicy,

    /// Per-request timeout; `None` leaves gateway calls unbounded
    pub request_timeout: Option<Duration>,
}

impl ProvisionerConfig {
    /// Build a config with default integration, artifact path and pacing
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        instance_name: impl Into<String>,
        instance_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            instance_name: instance_name.into(),
            instance_token: instance_token.into(),
            integration: DEFAULT_INTEGRATION.to_string(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            pacing: PacingPolicy::default(),
            request_timeout: None,
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup, then validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut config = Self::new(
            get("EVOLUTION_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            required("EVOLUTION_API_KEY")?,
            required("WHATSAPP_INSTANCE_NAME")?,
            required("WHATSAPP_INSTANCE_TOKEN")?,
        );

        if let Some(integration) = get("WHATSAPP_INTEGRATION") {
            config.integration = integration;
        }
        if let Some(path) = get("WHATSAPP_QR_PATH") {
            config.artifact_path = PathBuf::from(path);
        }

        let defaults = PacingPolicy::default();
        config.pacing = PacingPolicy {
            reset_settle: seconds(&get, "PROVISION_RESET_DELAY_SECS")?
                .unwrap_or(defaults.reset_settle),
            create_settle: seconds(&get, "PROVISION_SETTLE_DELAY_SECS")?
                .unwrap_or(defaults.create_settle),
            poll_interval: seconds(&get, "PROVISION_POLL_INTERVAL_SECS")?
                .unwrap_or(defaults.poll_interval),
            max_poll_attempts: parsed(&get, "PROVISION_POLL_ATTEMPTS")?
                .unwrap_or(defaults.max_poll_attempts),
        };
        config.request_timeout = seconds(&get, "EVOLUTION_TIMEOUT_SECS")?;

        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for ProvisionerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &REDACTED)
            .field("instance_name", &self.instance_name)
            .field("instance_token", &REDACTED)
            .field("integration", &self.integration)
            .field("artifact_path", &self.artifact_path)
            .field("pacing", &self.pacing)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn parsed<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
    }
}

fn seconds<G>(get: &G, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(parsed::<u64, G>(get, key)?.map(Duration::from_secs))
}

/// Instance names end up in URL paths and gateway logs
fn validate_instance_name(name: &str) -> Result<(), ValidationError> {
    if name.trim() != name || name.chars().any(|c| c.is_control() || c == '/') {
        return Err(ValidationError::new("invalid_instance_name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("EVOLUTION_API_KEY", "key"),
        ("WHATSAPP_INSTANCE_NAME", "clinic"),
        ("WHATSAPP_INSTANCE_TOKEN", "token"),
    ];

    #[test]
    fn test_defaults_apply() {
        let config = ProvisionerConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.integration, "WHATSAPP-BAILEYS");
        assert_eq!(config.artifact_path, PathBuf::from("whatsapp_qr.png"));
        assert_eq!(config.pacing, PacingPolicy::default());
        assert_eq!(config.pacing.max_poll_attempts, 3);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_overrides_apply() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("EVOLUTION_API_URL", "http://gateway:9000"),
            ("WHATSAPP_QR_PATH", "/tmp/qr/clinic.png"),
            ("PROVISION_RESET_DELAY_SECS", "0"),
            ("PROVISION_SETTLE_DELAY_SECS", "1"),
            ("PROVISION_POLL_INTERVAL_SECS", " 4 "),
            ("PROVISION_POLL_ATTEMPTS", "5"),
            ("EVOLUTION_TIMEOUT_SECS", "30"),
        ]);

        let config = ProvisionerConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.base_url, "http://gateway:9000");
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/qr/clinic.png"));
        assert_eq!(config.pacing.reset_settle, Duration::ZERO);
        assert_eq!(config.pacing.create_settle, Duration::from_secs(1));
        assert_eq!(config.pacing.poll_interval, Duration::from_secs(4));
        assert_eq!(config.pacing.max_poll_attempts, 5);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_debug_output_hides_credentials() {
        let config = ProvisionerConfig::new(DEFAULT_BASE_URL, "s3cret-key", "clinic", "s3cret-token");
        let printed = format!("{:?}", config);

        assert!(!printed.contains("s3cret-key"));
        assert!(!printed.contains("s3cret-token"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("clinic"));
    }

    #[test]
    fn test_missing_required_variable() {
        let vars = [("EVOLUTION_API_KEY", "key"), ("WHATSAPP_INSTANCE_NAME", "clinic")];

        match ProvisionerConfig::from_lookup(lookup(&vars)) {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "WHATSAPP_INSTANCE_TOKEN"),
            other => panic!("expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_required_variable_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = ("EVOLUTION_API_KEY", "   ");

        assert!(matches!(
            ProvisionerConfig::from_lookup(lookup(&vars)),
            Err(ConfigError::Missing("EVOLUTION_API_KEY"))
        ));
    }

    #[test]
    fn test_unparsable_number() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PROVISION_POLL_ATTEMPTS", "three"));

        match ProvisionerConfig::from_lookup(lookup(&vars)) {
            Err(ConfigError::Invalid { key, value, .. }) => {
                assert_eq!(key, "PROVISION_POLL_ATTEMPTS");
                assert_eq!(value, "three");
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut zero_attempts = REQUIRED.to_vec();
        zero_attempts.push(("PROVISION_POLL_ATTEMPTS", "0"));
        assert!(matches!(
            ProvisionerConfig::from_lookup(lookup(&zero_attempts)),
            Err(ConfigError::Validation(_))
        ));

        let mut bad_url = REQUIRED.to_vec();
        bad_url.push(("EVOLUTION_API_URL", "localhost without scheme"));
        assert!(matches!(
            ProvisionerConfig::from_lookup(lookup(&bad_url)),
            Err(ConfigError::Validation(_))
        ));

        let mut config = ProvisionerConfig::new(DEFAULT_BASE_URL, "key", "front/desk", "token");
        assert!(config.validate().is_err());
        config.instance_name = "front desk".to_string();
        assert!(config.validate().is_ok());
    }
}
