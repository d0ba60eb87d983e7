//! Error types for the gateway bootstrap
//!
//! Capability-check failures are aggregated rather than short-circuited, so
//! alongside the main [`Error`] enum this module provides [`AggregateError`],
//! an ordered multi-cause container with an explicit join operation.

use std::fmt;

use thiserror::Error;

/// Main error type for gateway bootstrap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A required resource schema is not installed in the cluster
    #[error("custom resource {name} is not installed")]
    SchemaMissing {
        /// CRD name in plural.group form
        name: String,
    },

    /// The resource schema exists but does not serve the required version
    #[error("custom resource {} does not serve version {} (served: {})", .name, .version, .served.join(", "))]
    VersionMissing {
        /// CRD name in plural.group form
        name: String,
        /// The version the controllers require
        version: String,
        /// Versions the cluster actually serves
        served: Vec<String>,
    },

    /// Adding a type group to the type registry failed
    #[error("failed to register {group}/{kind}: {message}")]
    TypeRegistration {
        /// API group being registered
        group: String,
        /// Kind being registered
        kind: String,
        /// What went wrong
        message: String,
    },

    /// A reconciler could not be attached to the controller manager
    #[error("failed to set up {name} reconciler: {source}")]
    ReconcilerAttach {
        /// Name of the reconciler that failed
        name: &'static str,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a type registration error
    pub fn type_registration(
        group: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeRegistration {
            group: group.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the identity of the reconciler it occurred in
    pub fn reconciler_attach(name: &'static str, source: Error) -> Self {
        Self::ReconcilerAttach {
            name,
            source: Box::new(source),
        }
    }
}

/// Ordered collection of independent failures from one validation pass.
///
/// The empty collection is the identity element of [`AggregateError::join`]:
/// joining it with anything yields the other operand unchanged, and joining
/// two non-empty collections preserves every cause in order.
#[derive(Debug, Default)]
pub struct AggregateError {
    causes: Vec<Error>,
}

impl AggregateError {
    /// Create an empty collection (no failures yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one failure, preserving insertion order
    pub fn push(&mut self, err: Error) {
        self.causes.push(err);
    }

    /// Merge another collection into this one, keeping both cause lists in order
    pub fn join(mut self, other: AggregateError) -> AggregateError {
        self.causes.extend(other.causes);
        self
    }

    /// True when no failures have been recorded
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    /// Number of recorded failures
    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// The recorded failures, in insertion order
    pub fn causes(&self) -> &[Error] {
        &self.causes
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> std::result::Result<(), AggregateError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Error> for AggregateError {
    fn from(err: Error) -> Self {
        Self { causes: vec![err] }
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.causes.is_empty() {
            return write!(f, "no errors");
        }
        let mut first = true;
        for cause in &self.causes {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{cause}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
