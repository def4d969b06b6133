use std::fmt;
use std::sync::Arc;

use evolution_gateway::{
    BestEffort, ConnectOutcome, CreateInstanceRequest, CreateOutcome, GatewayError,
    MessagingGateway, PairingImage,
};
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::artifact::{ArtifactError, ArtifactRecord, ArtifactStore};
use crate::clock::Sleeper;
use crate::config::ProvisionerConfig;

/// Where a provisioning run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Nothing has been sent yet
    Unknown,
    /// Clearing any previous session
    Reset,
    /// Waiting on the create call
    Creating,
    /// Instance exists, polling for pairing data
    AwaitingPair,
    /// Create returned a pairing image inline
    AlreadyPaired,
    /// A pairing image was fetched and saved
    Paired,
    /// The gateway reports the session as linked
    AlreadyConnected,
    /// The run ended in an error
    Failed,
}

impl ProvisionState {
    /// Whether the run can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProvisionState::AlreadyPaired
                | ProvisionState::Paired
                | ProvisionState::AlreadyConnected
                | ProvisionState::Failed
        )
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionState::Unknown => "UNKNOWN",
            ProvisionState::Reset => "RESET",
            ProvisionState::Creating => "CREATING",
            ProvisionState::AwaitingPair => "AWAITING_PAIR",
            ProvisionState::AlreadyPaired => "ALREADY_PAIRED",
            ProvisionState::Paired => "PAIRED",
            ProvisionState::AlreadyConnected => "ALREADY_CONNECTED",
            ProvisionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Successful end of a provisioning run
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    /// Create returned a pairing image, which was saved
    AlreadyPaired(ArtifactRecord),
    /// A pairing image was fetched by polling and saved
    Paired(ArtifactRecord),
    /// The session is already linked; nothing was written
    AlreadyConnected,
}

impl ProvisionOutcome {
    /// Terminal state matching this outcome
    pub fn state(&self) -> ProvisionState {
        match self {
            ProvisionOutcome::AlreadyPaired(_) => ProvisionState::AlreadyPaired,
            ProvisionOutcome::Paired(_) => ProvisionState::Paired,
            ProvisionOutcome::AlreadyConnected => ProvisionState::AlreadyConnected,
        }
    }

    /// Saved artifact, when the run produced one
    pub fn artifact(&self) -> Option<&ArtifactRecord> {
        match self {
            ProvisionOutcome::AlreadyPaired(record) | ProvisionOutcome::Paired(record) => {
                Some(record)
            }
            ProvisionOutcome::AlreadyConnected => None,
        }
    }
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::AlreadyPaired(record) => write!(
                f,
                "Instance created with pairing image, saved to {}",
                record.path.display()
            ),
            ProvisionOutcome::Paired(record) => write!(
                f,
                "Pairing image saved to {}, scan it with WhatsApp to link the device",
                record.path.display()
            ),
            ProvisionOutcome::AlreadyConnected => f.write_str("Instance is already connected"),
        }
    }
}

/// Terminal failure of a provisioning run
#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    /// Gateway answered the create call with a status other than 200/201/403
    #[error("Instance creation rejected with HTTP {status}: {body}")]
    CreateRejected {
        /// HTTP status
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Create call failed before the gateway answered
    #[error("Instance creation failed: {0}")]
    CreateFailed(#[source] GatewayError),

    /// No pairing image or open state after every poll attempt
    #[error("No pairing data after {attempts} attempt(s)")]
    PairingExhausted {
        /// Attempts made
        attempts: u32,
    },

    /// The pairing image could not be saved
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The pairing image returned on create could not be decoded
    #[error("Unusable gateway response: {0}")]
    Gateway(#[from] GatewayError),
}

/// Drives a messaging session from an unknown state to paired or connected
pub struct SessionProvisioner {
    gateway: Arc<dyn MessagingGateway>,
    sleeper: Arc<dyn Sleeper>,
    artifacts: Arc<dyn ArtifactStore>,
    config: ProvisionerConfig,
    state: RwLock<ProvisionState>,
}

impl SessionProvisioner {
    /// Create a provisioner. Nothing is sent until [`SessionProvisioner::run`].
    pub fn new(
        config: ProvisionerConfig,
        gateway: Arc<dyn MessagingGateway>,
        sleeper: Arc<dyn Sleeper>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            gateway,
            sleeper,
            artifacts,
            config,
            state: RwLock::new(ProvisionState::Unknown),
        }
    }

    /// Current state of the run
    pub async fn state(&self) -> ProvisionState {
        *self.state.read().await
    }

    /// Run reset, create, settle and poll in order.
    ///
    /// Every error is terminal; rerunning starts again from the reset step.
    pub async fn run(&self) -> Result<ProvisionOutcome, ProvisionError> {
        if let Some(written_at) = self.artifacts.last_written().await {
            warn!(
                "A pairing image from {} is already in place and will be overwritten on success",
                written_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }

        let result = self.provision().await;

        let terminal = match &result {
            Ok(outcome) => outcome.state(),
            Err(_) => ProvisionState::Failed,
        };
        self.transition(terminal).await;

        result
    }

    async fn provision(&self) -> Result<ProvisionOutcome, ProvisionError> {
        let name = self.config.instance_name.as_str();
        let pacing = &self.config.pacing;

        self.transition(ProvisionState::Reset).await;
        let report = self.gateway.reset_instance(name).await;
        log_best_effort("delete", &report.delete);
        log_best_effort("logout", &report.logout);
        self.sleeper.sleep(pacing.reset_settle).await;

        self.transition(ProvisionState::Creating).await;
        let request =
            CreateInstanceRequest::new(name, &self.config.instance_token, &self.config.integration);

        match self.gateway.create_instance(&request).await {
            Ok(CreateOutcome::Created {
                pairing: Some(image),
            }) => {
                info!("Instance {} created with an inline pairing image", name);
                let png = image.decode()?;
                let record = self.artifacts.persist(&png).await?;
                return Ok(ProvisionOutcome::AlreadyPaired(record));
            }
            Ok(CreateOutcome::Created { pairing: None }) => {
                info!("Instance {} created", name);
            }
            Ok(CreateOutcome::AlreadyExists) => {
                info!("Instance {} already exists, reusing it", name);
            }
            Err(GatewayError::UnexpectedStatus { status, body }) => {
                return Err(ProvisionError::CreateRejected { status, body });
            }
            Err(e) => return Err(ProvisionError::CreateFailed(e)),
        }

        self.sleeper.sleep(pacing.create_settle).await;

        self.transition(ProvisionState::AwaitingPair).await;
        self.fetch_pairing().await
    }

    async fn fetch_pairing(&self) -> Result<ProvisionOutcome, ProvisionError> {
        let name = self.config.instance_name.as_str();
        let attempts = self.config.pacing.max_poll_attempts;

        for attempt in 1..=attempts {
            debug!("Fetching pairing data, attempt {}/{}", attempt, attempts);

            match self.gateway.connect_instance(name).await {
                Ok(ConnectOutcome::PairingImage(image)) => {
                    if let Some(record) = self.save_polled_image(&image).await? {
                        return Ok(ProvisionOutcome::Paired(record));
                    }
                }
                Ok(ConnectOutcome::Open) => return Ok(ProvisionOutcome::AlreadyConnected),
                Ok(ConnectOutcome::Pending(raw)) => {
                    info!(
                        "No pairing data yet (attempt {}/{}): {}",
                        attempt, attempts, raw
                    );
                }
                Err(e) => {
                    warn!(
                        "Pairing request failed (attempt {}/{}): {}",
                        attempt, attempts, e
                    );
                }
            }

            if attempt < attempts {
                self.sleeper.sleep(self.config.pacing.poll_interval).await;
            }
        }

        Err(ProvisionError::PairingExhausted { attempts })
    }

    /// `Ok(None)` when the payload is unusable and the attempt should be retried
    async fn save_polled_image(
        &self,
        image: &PairingImage,
    ) -> Result<Option<ArtifactRecord>, ProvisionError> {
        match image.decode() {
            Ok(png) => Ok(Some(self.artifacts.persist(&png).await?)),
            Err(e) => {
                warn!("Discarding pairing image: {}", e);
                Ok(None)
            }
        }
    }

    async fn transition(&self, next: ProvisionState) {
        let mut state = self.state.write().await;
        debug!("Provisioning state {} -> {}", *state, next);
        *state = next;
    }
}

fn log_best_effort(step: &str, result: &BestEffort) {
    match result {
        BestEffort::Completed(status) => debug!("Reset {} answered HTTP {}", step, status),
        BestEffort::Discarded(e) => debug!("Reset {} failed, ignored: {}", step, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ProvisionState::Unknown.is_terminal());
        assert!(!ProvisionState::Reset.is_terminal());
        assert!(!ProvisionState::Creating.is_terminal());
        assert!(!ProvisionState::AwaitingPair.is_terminal());
        assert!(ProvisionState::AlreadyPaired.is_terminal());
        assert!(ProvisionState::Paired.is_terminal());
        assert!(ProvisionState::AlreadyConnected.is_terminal());
        assert!(ProvisionState::Failed.is_terminal());
    }

    #[test]
    fn test_outcome_state_and_artifact() {
        let record = ArtifactRecord {
            path: "qr.png".into(),
            bytes: 3,
            written_at: chrono::Utc::now(),
        };

        let paired = ProvisionOutcome::Paired(record.clone());
        assert_eq!(paired.state(), ProvisionState::Paired);
        assert_eq!(paired.artifact(), Some(&record));
        assert!(paired.to_string().contains("qr.png"));

        assert_eq!(
            ProvisionOutcome::AlreadyPaired(record).state(),
            ProvisionState::AlreadyPaired
        );
        assert_eq!(ProvisionOutcome::AlreadyConnected.artifact(), None);
        assert_eq!(ProvisionState::AwaitingPair.to_string(), "AWAITING_PAIR");
    }
}
