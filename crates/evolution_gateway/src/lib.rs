//! # Evolution Gateway
//!
//! This crate provides a client for an Evolution-style WhatsApp gateway, which is used to
//! reset, create and pair messaging instances.

/// HTTP client and the gateway trait the provisioner depends on.
mod client;
pub use client::*;

/// Tagged classification of gateway responses.
mod response;
pub use response::*;

/// Request types, pairing images and errors.
mod types;
pub use types::*;
