use std::sync::Arc;

use evolution_gateway::{GatewayClient, GatewayError};
use session_provisioner::{FileArtifactStore, ProvisionerConfig, SessionProvisioner, TokioSleeper};

/// Wire the real gateway client, timer and file store into a provisioner
pub fn build_provisioner(config: ProvisionerConfig) -> Result<SessionProvisioner, GatewayError> {
    let gateway = GatewayClient::new(&config.base_url, &config.api_key, config.request_timeout)?;
    let artifacts = FileArtifactStore::new(config.artifact_path.clone());

    log::info!("🌐 Gateway: {}", gateway.base_url());
    log::info!("📱 Instance: {}", config.instance_name);
    log::info!("📁 Pairing image location: {}", artifacts.path().display());

    Ok(SessionProvisioner::new(
        config,
        Arc::new(gateway),
        Arc::new(TokioSleeper),
        Arc::new(artifacts),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_provisioner::ProvisionState;

    #[tokio::test]
    async fn test_build_provisioner_starts_unknown() {
        let config = ProvisionerConfig::new("http://localhost:8080", "key", "clinic", "token");
        let provisioner = build_provisioner(config).unwrap();

        assert_eq!(provisioner.state().await, ProvisionState::Unknown);
    }

    #[test]
    fn test_build_provisioner_rejects_bad_api_key() {
        let config = ProvisionerConfig::new("http://localhost:8080", "bad\nkey", "clinic", "token");

        assert!(matches!(
            build_provisioner(config),
            Err(GatewayError::Config(_))
        ));
    }
}
