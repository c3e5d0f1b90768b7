//! Client-side registry integration
//!
//! This library provides:
//! - An HTTP client for the registry protocol
//! - Registration backoff and the periodic heartbeat loop
//! - The discovery cache used on the gateway's request path

pub mod backoff;
pub mod cache;
pub mod client;
pub mod error;
pub mod heartbeat;

pub use backoff::BackoffPolicy;
pub use cache::DiscoveryCache;
pub use client::RegistryClient;
pub use error::{ClientError, Result};
pub use heartbeat::HeartbeatTask;
