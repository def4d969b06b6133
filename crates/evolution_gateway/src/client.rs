use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::response::{ConnectOutcome, CreateOutcome, parse_connect_response, parse_create_response};
use crate::types::{BestEffort, CreateInstanceRequest, GatewayError, ResetReport};

/// Operations the provisioner needs from a messaging gateway
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Delete and log out the instance. Failures are reported, never raised.
    async fn reset_instance(&self, instance_name: &str) -> ResetReport;

    /// Create the instance with pairing enabled
    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<CreateOutcome, GatewayError>;

    /// Ask the gateway for pairing data or the current connection state
    async fn connect_instance(&self, instance_name: &str) -> Result<ConnectOutcome, GatewayError>;
}

/// HTTP client for an Evolution-style messaging gateway
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    ///
    /// `timeout` applies to each request; `None` leaves requests unbounded.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| GatewayError::Config("API key is not a valid header value".to_string()))?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base address requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn instance_url(&self, action: &str, instance_name: &str) -> String {
        format!(
            "{}/instance/{}/{}",
            self.base_url,
            action,
            urlencoding::encode(instance_name)
        )
    }

    async fn best_effort_delete(&self, url: &str) -> BestEffort {
        match self.client.delete(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!("DELETE {} -> {}", url, status);
                BestEffort::Completed(status)
            }
            Err(e) => {
                debug!("DELETE {} failed, discarding: {}", url, e);
                BestEffort::Discarded(GatewayError::Network(e))
            }
        }
    }
}

#[async_trait]
impl MessagingGateway for GatewayClient {
    async fn reset_instance(&self, instance_name: &str) -> ResetReport {
        debug!("Resetting instance {}", instance_name);

        let delete = self
            .best_effort_delete(&self.instance_url("delete", instance_name))
            .await;
        let logout = self
            .best_effort_delete(&self.instance_url("logout", instance_name))
            .await;

        ResetReport { delete, logout }
    }

    async fn create_instance(
        &self,
        request: &CreateInstanceRequest,
    ) -> Result<CreateOutcome, GatewayError> {
        let url = format!("{}/instance/create", self.base_url);
        debug!("Creating instance {} at {}", request.instance_name, url);

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("Create response status: {}", status);

        let outcome = parse_create_response(status, &body);
        if let Err(GatewayError::UnexpectedStatus { status, body }) = &outcome {
            warn!("Instance creation failed with status {}: {}", status, body);
        }
        outcome
    }

    async fn connect_instance(&self, instance_name: &str) -> Result<ConnectOutcome, GatewayError> {
        let url = self.instance_url("connect", instance_name);
        debug!("Fetching pairing data from {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(GatewayError::UnexpectedStatus { status, body });
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        Ok(parse_connect_response(value))
    }
}
