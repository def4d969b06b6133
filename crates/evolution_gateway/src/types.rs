use base64::Engine;
use serde::Serialize;

/// Prefix the gateway puts in front of the base64 pairing image
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Backend id used when none is configured
pub const DEFAULT_INTEGRATION: &str = "WHATSAPP-BAILEYS";

/// Custom error type for messaging gateway operations
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// Transport-level failure (connection refused, timeout, broken body)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The gateway answered with a status the caller does not accept
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the gateway
        status: u16,
        /// Raw response body, kept for the operator
        body: String,
    },

    /// Response body could not be parsed
    #[error("Failed to parse gateway response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Pairing image payload was empty or not valid base64
    #[error("Invalid pairing image: {0}")]
    InvalidPairingImage(String),

    /// Client could not be built from the given settings
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Base64 pairing image exactly as the gateway returned it.
///
/// The payload may or may not carry the `data:image/png;base64,` prefix;
/// [`PairingImage::decode`] handles both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingImage(String);

impl PairingImage {
    /// Wrap a raw payload
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw payload, prefix included if the gateway sent one
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strip the data-URL prefix (if any) and decode the PNG bytes
    pub fn decode(&self) -> Result<Vec<u8>, GatewayError> {
        let payload = self.0.trim();
        let payload = payload.strip_prefix(PNG_DATA_URL_PREFIX).unwrap_or(payload);

        if payload.is_empty() {
            return Err(GatewayError::InvalidPairingImage(
                "empty payload".to_string(),
            ));
        }

        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| GatewayError::InvalidPairingImage(e.to_string()))
    }
}

/// Body of `POST /instance/create`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    /// Session identifier
    pub instance_name: String,
    /// Per-instance token
    pub token: String,
    /// Ask the gateway to generate a QR pairing image
    pub qrcode: bool,
    /// Messaging backend id
    pub integration: String,
}

impl CreateInstanceRequest {
    /// Build a create request with pairing enabled
    pub fn new(
        instance_name: impl Into<String>,
        token: impl Into<String>,
        integration: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            token: token.into(),
            qrcode: true,
            integration: integration.into(),
        }
    }
}

/// Result of a call whose failure is discarded on purpose.
#[derive(Debug)]
pub enum BestEffort {
    /// The gateway answered; any status is accepted
    Completed(u16),
    /// The call failed and the error was discarded
    Discarded(GatewayError),
}

impl BestEffort {
    /// Whether the gateway answered at all
    pub fn completed(&self) -> bool {
        matches!(self, BestEffort::Completed(_))
    }
}

/// What happened during the reset step
#[derive(Debug)]
pub struct ResetReport {
    /// `DELETE /instance/delete/{name}`
    pub delete: BestEffort,
    /// `DELETE /instance/logout/{name}`
    pub logout: BestEffort,
}
