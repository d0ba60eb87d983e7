//! Versioned API type registration
//!
//! The type registry is the process-wide mapping from group/kind to the
//! decoding metadata used for dynamic objects. It is populated exactly once
//! during bootstrap by a single owner and read by the reconcilers
//! afterwards. The mandatory Gateway API groups must register or the
//! bootstrap aborts; the multi-cluster ServiceImport group registers only
//! when its own capability probe succeeds.

use std::collections::HashMap;
use std::fmt;

use kube::api::GroupVersionKind;
use kube::discovery::ApiResource;
use tracing::{info, warn};

use crate::capability::{
    check_capability, SchemaRegistry, GATEWAY_API_GROUP, MCS_API_GROUP, SERVICE_IMPORT_CAPABILITY,
};
use crate::error::Error;

/// A kind and its plural resource name within a type group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDef {
    /// CamelCase kind, e.g. `HTTPRoute`
    pub kind: &'static str,
    /// Plural resource name, e.g. `httproutes`
    pub plural: &'static str,
}

/// A versioned API group and the kinds it contributes to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeGroup {
    /// API group
    pub group: &'static str,
    /// API version within the group
    pub version: &'static str,
    /// Kinds this group registers
    pub kinds: &'static [KindDef],
}

impl TypeGroup {
    /// The `group/version` string for logs and errors.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

impl fmt::Display for TypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.version)
    }
}

/// Stable Gateway API types.
pub const GATEWAY_V1: TypeGroup = TypeGroup {
    group: GATEWAY_API_GROUP,
    version: "v1",
    kinds: &[
        KindDef {
            kind: "GatewayClass",
            plural: "gatewayclasses",
        },
        KindDef {
            kind: "Gateway",
            plural: "gateways",
        },
        KindDef {
            kind: "HTTPRoute",
            plural: "httproutes",
        },
    ],
};

/// Beta Gateway API types.
pub const GATEWAY_V1BETA1: TypeGroup = TypeGroup {
    group: GATEWAY_API_GROUP,
    version: "v1beta1",
    kinds: &[KindDef {
        kind: "ReferenceGrant",
        plural: "referencegrants",
    }],
};

/// Alpha Gateway API types.
pub const GATEWAY_V1ALPHA2: TypeGroup = TypeGroup {
    group: GATEWAY_API_GROUP,
    version: "v1alpha2",
    kinds: &[
        KindDef {
            kind: "GRPCRoute",
            plural: "grpcroutes",
        },
        KindDef {
            kind: "TLSRoute",
            plural: "tlsroutes",
        },
    ],
};

/// Multi-cluster ServiceImport types, registered only when the schema is
/// installed.
pub const MCS_V1ALPHA1: TypeGroup = TypeGroup {
    group: MCS_API_GROUP,
    version: "v1alpha1",
    kinds: &[KindDef {
        kind: "ServiceImport",
        plural: "serviceimports",
    }],
};

/// Type groups every activation must register.
const MANDATORY_TYPE_GROUPS: &[TypeGroup] = &[GATEWAY_V1, GATEWAY_V1BETA1, GATEWAY_V1ALPHA2];

/// Process-wide mapping from group/kind to dynamic-object decoding metadata.
///
/// Held mutably by a single owner during bootstrap; reconcilers receive a
/// shared reference once registration is complete.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: HashMap<(String, String), ApiResource>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every kind of the given group.
    ///
    /// Idempotent per group: re-registering an identical group is a no-op.
    /// Registering a kind that is already present at a different version
    /// fails, since one process cannot decode the same kind two ways.
    pub fn register(&mut self, group: &TypeGroup) -> Result<(), Error> {
        for def in group.kinds {
            let key = (group.group.to_string(), def.kind.to_string());
            if let Some(existing) = self.entries.get(&key) {
                if existing.version != group.version {
                    return Err(Error::type_registration(
                        group.group,
                        def.kind,
                        format!("kind is already registered at version {}", existing.version),
                    ));
                }
                continue;
            }

            let gvk = GroupVersionKind::gvk(group.group, group.version, def.kind);
            self.entries
                .insert(key, ApiResource::from_gvk_with_plural(&gvk, def.plural));
        }
        Ok(())
    }

    /// Decoding metadata for the given group/kind, if registered.
    pub fn resolve(&self, group: &str, kind: &str) -> Option<&ApiResource> {
        self.entries.get(&(group.to_string(), kind.to_string()))
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Register the mandatory Gateway API type groups.
///
/// Failure here is fatal to activation: the reconcilers cannot decode their
/// watched objects without these entries.
pub fn register_gateway_types(registry: &mut TypeRegistry) -> Result<(), Error> {
    for group in MANDATORY_TYPE_GROUPS {
        registry.register(group)?;
    }
    Ok(())
}

/// Conditionally register the multi-cluster ServiceImport types.
///
/// Runs its own capability probe. Absence of the schema is a supported
/// configuration and never fails the bootstrap.
pub async fn register_service_import_types(
    schemas: &dyn SchemaRegistry,
    registry: &mut TypeRegistry,
) {
    let supported = check_capability(schemas, &SERVICE_IMPORT_CAPABILITY)
        .await
        .is_ok();
    info!(
        enabled = supported,
        "multi-cluster ServiceImport gateway integration"
    );

    if supported {
        if let Err(err) = registry.register(&MCS_V1ALPHA1) {
            warn!(error = %err, "skipping ServiceImport type registration");
        }
    }
}
