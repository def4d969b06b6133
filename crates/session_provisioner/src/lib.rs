//! # Session Provisioner
//!
//! This crate brings a WhatsApp gateway instance from an unknown state to either a linked
//! session or a fresh pairing image waiting to be scanned.
//! It handles the reset/create/poll sequence, pacing between steps and saving the QR image.

/// Where pairing images are written.
mod artifact;
pub use artifact::*;

/// Pauses between provisioning steps.
mod clock;
pub use clock::*;

/// Environment-driven configuration.
mod config;
pub use config::*;

/// The provisioning state machine.
mod provisioner;
pub use provisioner::*;
