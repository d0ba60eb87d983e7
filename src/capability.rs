//! Capability discovery against the cluster's CRD registry
//!
//! The gateway controllers depend on third-party extension schemas being
//! installed (the Gateway API CRDs, and optionally the multi-cluster
//! ServiceImport CRD). This module defines the fixed requirement sets, a
//! narrow registry interface that can be faked in tests, and the validation
//! pass that checks every requirement without stopping at the first failure.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{Api, Client};

#[cfg(test)]
use mockall::automock;

use crate::error::{AggregateError, Error};

/// API group of the upstream Gateway API project
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// API group of the multi-cluster services API
pub const MCS_API_GROUP: &str = "multicluster.x-k8s.io";

/// One extension-resource schema the gateway controllers depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRequirement {
    /// API group of the resource
    pub group: &'static str,
    /// Exact version that must be among the served versions
    pub version: &'static str,
    /// Plural resource name, as it appears in the CRD metadata
    pub resource: &'static str,
}

impl CapabilityRequirement {
    /// CRD object name in `plural.group` form, the key used by the cluster
    /// registry.
    pub fn crd_name(&self) -> String {
        format!("{}.{}", self.resource, self.group)
    }
}

impl fmt::Display for CapabilityRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.group, self.version, self.resource)
    }
}

/// Gateway API schemas that must all be installed before the controllers
/// activate.
pub const REQUIRED_GATEWAY_CAPABILITIES: &[CapabilityRequirement] = &[
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1",
        resource: "gatewayclasses",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1",
        resource: "gateways",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1",
        resource: "httproutes",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1beta1",
        resource: "referencegrants",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1alpha2",
        resource: "grpcroutes",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1alpha2",
        resource: "tlsroutes",
    },
];

/// Schemas the TLS secret sync relies on. A subset of the full requirement
/// set: the sync only watches gateways, so route schemas do not gate it.
pub const SECRET_SYNC_CAPABILITIES: &[CapabilityRequirement] = &[
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1",
        resource: "gatewayclasses",
    },
    CapabilityRequirement {
        group: GATEWAY_API_GROUP,
        version: "v1",
        resource: "gateways",
    },
];

/// Multi-cluster ServiceImport schema. Optional: absence disables the
/// integration without failing the bootstrap.
pub const SERVICE_IMPORT_CAPABILITY: CapabilityRequirement = CapabilityRequirement {
    group: MCS_API_GROUP,
    version: "v1alpha1",
    resource: "serviceimports",
};

/// Read-only snapshot of an installed extension-resource schema.
///
/// Fetched on demand and never cached here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// CRD name in plural.group form
    pub name: String,
    /// Versions currently served by the API server
    pub served_versions: Vec<String>,
}

/// Narrow view of the cluster's CRD registry.
///
/// Implemented by [`ClusterSchemaRegistry`] in production and by in-memory
/// fakes in tests, so capability checks never need a live cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Whether cluster connectivity is available at all. When false, every
    /// capability check is vacuously satisfied.
    fn is_enabled(&self) -> bool;

    /// Fetch the schema for the named CRD. `None` when it is not installed.
    async fn get_schema(&self, name: &str) -> Result<Option<SchemaDescriptor>, Error>;
}

/// CRD registry backed by the live cluster.
pub struct ClusterSchemaRegistry {
    client: Option<Client>,
}

impl ClusterSchemaRegistry {
    /// Registry over the given cluster client.
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Registry for environments without cluster connectivity.
    ///
    /// Capability checks against a disconnected registry are vacuously
    /// satisfied rather than failed, so such environments are not blocked
    /// by checks they cannot perform.
    pub fn disconnected() -> Self {
        Self { client: None }
    }
}

#[async_trait]
impl SchemaRegistry for ClusterSchemaRegistry {
    fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn get_schema(&self, name: &str) -> Result<Option<SchemaDescriptor>, Error> {
        let Some(client) = &self.client else {
            return Ok(None);
        };

        let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
        let Some(crd) = crds.get_opt(name).await? else {
            return Ok(None);
        };

        let served_versions = crd
            .spec
            .versions
            .iter()
            .filter(|v| v.served)
            .map(|v| v.name.clone())
            .collect();

        Ok(Some(SchemaDescriptor {
            name: name.to_string(),
            served_versions,
        }))
    }
}

/// Check a single requirement against the registry.
///
/// Vacuously satisfied when the registry reports no cluster connectivity.
pub async fn check_capability(
    registry: &dyn SchemaRegistry,
    requirement: &CapabilityRequirement,
) -> Result<(), Error> {
    if !registry.is_enabled() {
        return Ok(());
    }

    let name = requirement.crd_name();
    let Some(schema) = registry.get_schema(&name).await? else {
        return Err(Error::SchemaMissing { name });
    };

    if !schema
        .served_versions
        .iter()
        .any(|v| v == requirement.version)
    {
        return Err(Error::VersionMissing {
            name,
            version: requirement.version.to_string(),
            served: schema.served_versions,
        });
    }

    Ok(())
}

/// Check every requirement in the slice, collecting all failures.
///
/// Never stops at the first failure: operators get the complete list of
/// missing schemas from a single pass instead of discovering them one
/// restart at a time.
pub async fn check_capabilities(
    registry: &dyn SchemaRegistry,
    requirements: &[CapabilityRequirement],
) -> Result<(), AggregateError> {
    let mut failures = AggregateError::new();
    for requirement in requirements {
        if let Err(err) = check_capability(registry, requirement).await {
            failures.push(err);
        }
    }
    failures.into_result()
}
