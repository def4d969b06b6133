use serde_json::Value;
use tracing::debug;

use crate::types::{GatewayError, PairingImage};

/// Connection state the gateway reports for a linked device
pub const STATE_OPEN: &str = "open";

/// How the gateway answered `POST /instance/create`
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// HTTP 200/201. `pairing` is set when the body already embeds the QR image.
    Created {
        /// Inline pairing image, if any
        pairing: Option<PairingImage>,
    },
    /// HTTP 403: the instance exists and is usable as-is
    AlreadyExists,
}

/// How the gateway answered `GET /instance/connect/{name}`
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// A QR image is ready to be scanned
    PairingImage(PairingImage),
    /// The session is already linked to a device
    Open,
    /// Neither shape; the raw body is kept for logging
    Pending(Value),
}

/// Classify a create response by status, then by body shape
pub fn parse_create_response(status: u16, body: &str) -> Result<CreateOutcome, GatewayError> {
    match status {
        200 | 201 => {
            let pairing = match serde_json::from_str::<Value>(body) {
                Ok(value) => find_pairing_image(&value),
                Err(e) => {
                    debug!("Create response is not JSON ({}), assuming no inline image", e);
                    None
                }
            };
            Ok(CreateOutcome::Created { pairing })
        }
        403 => Ok(CreateOutcome::AlreadyExists),
        _ => Err(GatewayError::UnexpectedStatus {
            status,
            body: body.to_string(),
        }),
    }
}

/// Classify a successful connect response body
pub fn parse_connect_response(body: Value) -> ConnectOutcome {
    if let Some(image) = find_pairing_image(&body) {
        return ConnectOutcome::PairingImage(image);
    }

    let state = body
        .pointer("/instance/state")
        .or_else(|| body.get("state"))
        .and_then(Value::as_str);

    match state {
        Some(STATE_OPEN) => ConnectOutcome::Open,
        _ => ConnectOutcome::Pending(body),
    }
}

/// Look for a QR payload under `qrcode.base64` or a top-level `base64`
fn find_pairing_image(body: &Value) -> Option<PairingImage> {
    body.pointer("/qrcode/base64")
        .or_else(|| body.get("base64"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(PairingImage::new)
}
