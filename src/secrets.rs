//! TLS secret-sync registration
//!
//! Gateway listeners reference TLS secrets across namespaces; the secret
//! sync subsystem fans referenced secrets into a single namespace the
//! dataplane can read. This module only decides whether to offer that
//! registration and builds the inert descriptor; owning the watch loop is
//! the sync subsystem's job.
//!
//! The decision here is independent of the main activation gate: it runs
//! its own capability check over the schemas the sync actually needs.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kube::api::{Api, DynamicObject, GroupVersionKind, ListParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

use crate::capability::{
    check_capabilities, SchemaRegistry, GATEWAY_API_GROUP, SECRET_SYNC_CAPABILITIES,
};
use crate::config::GatewayConfig;
use crate::manager::ControllerManager;

/// Namespace/name reference to a cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Build a key from namespace and name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Boxed future returned by the registration callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Maps a changed secret to the gateways that must be re-evaluated.
pub type EnqueueGatewaysFn = Arc<dyn Fn(ObjectKey) -> BoxFuture<'static, Vec<ObjectKey>> + Send + Sync>;

/// Tests whether a secret is referenced by any managed gateway.
pub type SecretPredicateFn = Arc<dyn Fn(ObjectKey) -> BoxFuture<'static, bool> + Send + Sync>;

/// Declarative secret-sync registration consumed by the sync subsystem.
///
/// Inert data: building the descriptor starts nothing.
pub struct SecretSyncRegistration {
    /// Kind whose TLS references drive the sync
    pub ref_kind: &'static str,
    /// Callback mapping a changed secret to the affected gateways
    pub enqueue: EnqueueGatewaysFn,
    /// Predicate testing whether a secret is referenced at all
    pub is_referenced: SecretPredicateFn,
    /// Namespace receiving the fanned-in secret copies
    pub secrets_namespace: String,
}

impl fmt::Debug for SecretSyncRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSyncRegistration")
            .field("ref_kind", &self.ref_kind)
            .field("secrets_namespace", &self.secrets_namespace)
            .finish_non_exhaustive()
    }
}

/// Decide whether to offer secret-sync registration.
///
/// Returns `None` when the gateway feature or the sync sub-flag is
/// disabled, or when the schemas the sync relies on are not installed.
/// Absence is a supported configuration, never an error.
pub async fn register_secret_sync(
    config: &GatewayConfig,
    schemas: &dyn SchemaRegistry,
    manager: &ControllerManager,
) -> Option<SecretSyncRegistration> {
    if !config.enable_gateway_api || !config.enable_secrets_sync {
        return None;
    }

    if let Err(failures) = check_capabilities(schemas, SECRET_SYNC_CAPABILITIES).await {
        debug!(error = %failures, "gateway schemas unavailable, not offering secret sync");
        return None;
    }

    let client = manager.client();
    Some(SecretSyncRegistration {
        ref_kind: "Gateway",
        enqueue: enqueue_referencing_gateways(client.clone()),
        is_referenced: referenced_by_any_gateway(client),
        secrets_namespace: config.secrets_namespace.clone(),
    })
}

fn gateway_api_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1", "Gateway");
    ApiResource::from_gvk_with_plural(&gvk, "gateways")
}

fn enqueue_referencing_gateways(client: Client) -> EnqueueGatewaysFn {
    Arc::new(move |secret: ObjectKey| -> BoxFuture<'static, Vec<ObjectKey>> {
        let client = client.clone();
        Box::pin(async move { gateways_referencing(client, &secret).await })
    })
}

fn referenced_by_any_gateway(client: Client) -> SecretPredicateFn {
    Arc::new(move |secret: ObjectKey| -> BoxFuture<'static, bool> {
        let client = client.clone();
        Box::pin(async move { !gateways_referencing(client, &secret).await.is_empty() })
    })
}

/// List all gateways and keep those whose TLS listeners reference the
/// secret. Listing failures yield an empty set; the sync subsystem retries
/// on the next secret event.
async fn gateways_referencing(client: Client, secret: &ObjectKey) -> Vec<ObjectKey> {
    let api: Api<DynamicObject> = Api::all_with(client, &gateway_api_resource());
    let gateways = match api.list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(err) => {
            warn!(error = %err, secret = %secret, "failed to list gateways for secret sync");
            return Vec::new();
        }
    };

    gateways
        .into_iter()
        .filter(|gw| references_secret(gw, secret))
        .map(|gw| ObjectKey::new(gw.namespace().unwrap_or_default(), gw.name_any()))
        .collect()
}

/// Whether any TLS listener of the gateway references the secret.
///
/// A certificate ref without an explicit namespace refers to the gateway's
/// own namespace.
fn references_secret(gateway: &DynamicObject, secret: &ObjectKey) -> bool {
    let gateway_namespace = gateway.namespace().unwrap_or_default();
    let Some(listeners) = gateway
        .data
        .pointer("/spec/listeners")
        .and_then(|v| v.as_array())
    else {
        return false;
    };

    listeners
        .iter()
        .filter_map(|listener| {
            listener
                .pointer("/tls/certificateRefs")
                .and_then(|v| v.as_array())
        })
        .flatten()
        .any(|cert| {
            let name = cert.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            let namespace = cert
                .get("namespace")
                .and_then(|v| v.as_str())
                .unwrap_or(gateway_namespace.as_str());
            name == secret.name && namespace == secret.namespace
        })
}
