//! Main entry point for the WhatsApp instance provisioner.
//! Resets, creates and pairs the configured gateway instance, then exits.

mod setup;

use session_provisioner::ProvisionerConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Provisioning WhatsApp instance...");

    let config = match ProvisionerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {}", e);
            log::error!(
                "💡 Set EVOLUTION_API_KEY, WHATSAPP_INSTANCE_NAME and WHATSAPP_INSTANCE_TOKEN (a .env file works)"
            );
            std::process::exit(1);
        }
    };

    let provisioner = match setup::build_provisioner(config) {
        Ok(provisioner) => provisioner,
        Err(e) => {
            log::error!("❌ Failed to create gateway client: {}", e);
            std::process::exit(1);
        }
    };

    match provisioner.run().await {
        Ok(outcome) => {
            log::info!("✅ {}", outcome);
        }
        Err(e) => {
            log::error!("❌ {}", e);
            log::error!("💡 Rerun the provisioner; it resets the instance before trying again");
            std::process::exit(1);
        }
    }
}
