//! Weir gateway - Gateway API controllers for the Weir dataplane operator
//!
//! This crate decides, once per process start, whether the Gateway API
//! controllers activate on the host cluster. Activation is gated on static
//! configuration (feature flag, dataplane networking mode), on the required
//! Gateway API schemas being installed at the expected versions, and on the
//! optional multi-cluster ServiceImport schema. Missing capabilities
//! soft-disable the feature: the enclosing operator keeps running
//! everything else.
//!
//! The reconcile bodies and the gateway-to-proxy translation live outside
//! this crate; here they are opaque attachable units and a translator
//! handle respectively.
//!
//! # Modules
//!
//! - [`bootstrap`] - Activation gating and controller wiring
//! - [`capability`] - Schema discovery against the cluster CRD registry
//! - [`config`] - Configuration flags
//! - [`controller`] - The fixed reconciler set
//! - [`error`] - Error types
//! - [`manager`] - Shared controller manager
//! - [`scheme`] - Versioned API type registration
//! - [`secrets`] - TLS secret-sync registration

#![deny(missing_docs)]

pub mod bootstrap;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod manager;
pub mod scheme;
pub mod secrets;

#[cfg(test)]
mod test_support;

pub use error::{AggregateError, Error};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default namespace receiving synchronized TLS secrets
pub const DEFAULT_SECRETS_NAMESPACE: &str = "weir-secrets";

/// Controller name claimed by GatewayClass objects managed by this operator
pub const GATEWAY_CONTROLLER_NAME: &str = "weir.dev/gateway-controller";
