//! The fixed set of Gateway API reconcilers
//!
//! One reconciler per managed kind, modeled as a closed set of variants so
//! the registration loop's ordering and failure wrapping stay independent
//! of how many kinds exist. Attaching a reconciler resolves its decoding
//! metadata from the type registry and wires a named watch onto the shared
//! manager. The reconcile bodies themselves live outside this crate; the
//! gateway watch hands observed objects to the translator collaborator.

use std::sync::Arc;

use futures::{pin_mut, StreamExt};
use kube::api::{Api, DynamicObject};
use kube::runtime::{watcher, WatchStreamExt};
use kube::ResourceExt;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::capability::GATEWAY_API_GROUP;
use crate::error::Error;
use crate::manager::{ControllerFuture, ControllerManager};
use crate::scheme::TypeRegistry;
use crate::GATEWAY_CONTROLLER_NAME;

/// Turns a gateway object into the dataplane proxy resources realizing it.
///
/// Implemented by the translation layer; this crate only consumes it.
#[cfg_attr(test, automock)]
pub trait GatewayTranslator: Send + Sync {
    /// Translate one gateway into the proxy resources to apply.
    fn translate(&self, gateway: &DynamicObject) -> Result<Vec<DynamicObject>, Error>;
}

/// The closed set of gateway reconcilers, one per managed kind.
pub enum Reconciler {
    /// Accepts GatewayClass objects claiming our controller name
    GatewayClass,
    /// Programs the dataplane for each Gateway through the translator
    Gateway {
        /// Translation layer producing the proxy resources
        translator: Arc<dyn GatewayTranslator>,
    },
    /// Tracks cross-namespace reference grants
    ReferenceGrant,
    /// HTTP route attachment
    HttpRoute,
    /// gRPC route attachment
    GrpcRoute,
    /// TLS route attachment
    TlsRoute,
}

impl Reconciler {
    /// Stable reconciler name used in logs and failure wrapping.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GatewayClass => "gateway-class",
            Self::Gateway { .. } => "gateway",
            Self::ReferenceGrant => "reference-grant",
            Self::HttpRoute => "http-route",
            Self::GrpcRoute => "grpc-route",
            Self::TlsRoute => "tls-route",
        }
    }

    /// Kind watched by this reconciler.
    fn kind(&self) -> &'static str {
        match self {
            Self::GatewayClass => "GatewayClass",
            Self::Gateway { .. } => "Gateway",
            Self::ReferenceGrant => "ReferenceGrant",
            Self::HttpRoute => "HTTPRoute",
            Self::GrpcRoute => "GRPCRoute",
            Self::TlsRoute => "TLSRoute",
        }
    }

    /// Attach this reconciler's watch to the manager.
    ///
    /// Fails when the type registry has no entry for the watched kind,
    /// since the watch cannot decode objects without it.
    pub fn attach(
        self,
        types: &TypeRegistry,
        manager: &mut ControllerManager,
    ) -> Result<(), Error> {
        let kind = self.kind();
        let resource = types
            .resolve(GATEWAY_API_GROUP, kind)
            .cloned()
            .ok_or_else(|| {
                Error::type_registration(GATEWAY_API_GROUP, kind, "kind is not registered")
            })?;

        let name = self.name();
        let api: Api<DynamicObject> = Api::all_with(manager.client(), &resource);
        let future = match self {
            Self::GatewayClass => gateway_class_watch(api),
            Self::Gateway { translator } => gateway_watch(api, translator),
            _ => kind_watch(name, api),
        };

        manager.attach(name, future);
        Ok(())
    }
}

/// Construct the fixed ordered reconciler set and attach each to the
/// manager.
///
/// The first attachment failure aborts the remaining attachments and is
/// wrapped with the failing reconciler's name: a partially wired controller
/// set must not report successful activation.
pub fn register_reconcilers(
    types: &TypeRegistry,
    manager: &mut ControllerManager,
    translator: Arc<dyn GatewayTranslator>,
) -> Result<(), Error> {
    let reconcilers = [
        Reconciler::GatewayClass,
        Reconciler::Gateway { translator },
        Reconciler::ReferenceGrant,
        Reconciler::HttpRoute,
        Reconciler::GrpcRoute,
        Reconciler::TlsRoute,
    ];

    for reconciler in reconcilers {
        let name = reconciler.name();
        reconciler
            .attach(types, manager)
            .map_err(|source| Error::reconciler_attach(name, source))?;
    }

    Ok(())
}

/// Watch one kind and surface observations to the external reconcile body.
fn kind_watch(name: &'static str, api: Api<DynamicObject>) -> ControllerFuture {
    Box::pin(async move {
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .touched_objects();
        pin_mut!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(obj) => debug!(controller = name, object = %object_key(&obj), "observed object"),
                Err(err) => warn!(controller = name, error = %err, "watch error"),
            }
        }
    })
}

/// Watch gateway classes, recognizing only those claiming our controller.
fn gateway_class_watch(api: Api<DynamicObject>) -> ControllerFuture {
    Box::pin(async move {
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .touched_objects();
        pin_mut!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(obj) if is_managed_class(&obj) => {
                    debug!(class = %obj.name_any(), "observed managed gateway class");
                }
                Ok(obj) => {
                    debug!(class = %obj.name_any(), "ignoring foreign gateway class");
                }
                Err(err) => warn!(controller = "gateway-class", error = %err, "watch error"),
            }
        }
    })
}

/// Watch gateways and hand each observation to the translator.
fn gateway_watch(api: Api<DynamicObject>, translator: Arc<dyn GatewayTranslator>) -> ControllerFuture {
    Box::pin(async move {
        let stream = watcher(api, watcher::Config::default())
            .default_backoff()
            .touched_objects();
        pin_mut!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(obj) => match translator.translate(&obj) {
                    Ok(resources) => debug!(
                        gateway = %object_key(&obj),
                        resources = resources.len(),
                        "translated gateway"
                    ),
                    Err(err) => warn!(
                        gateway = %object_key(&obj),
                        error = %err,
                        "gateway translation failed"
                    ),
                },
                Err(err) => warn!(controller = "gateway", error = %err, "watch error"),
            }
        }
    })
}

fn is_managed_class(class: &DynamicObject) -> bool {
    class
        .data
        .pointer("/spec/controllerName")
        .and_then(|v| v.as_str())
        .is_some_and(|name| name == GATEWAY_CONTROLLER_NAME)
}

fn object_key(obj: &DynamicObject) -> String {
    format!(
        "{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{register_gateway_types, GATEWAY_V1};
    use crate::test_support;
    use serde_json::json;

    fn translator() -> Arc<dyn GatewayTranslator> {
        let mut mock = MockGatewayTranslator::new();
        mock.expect_translate().returning(|_| Ok(Vec::new()));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn registers_the_fixed_reconciler_set_in_order() {
        let mut types = TypeRegistry::new();
        register_gateway_types(&mut types).unwrap();
        let mut manager = ControllerManager::new(test_support::client());

        register_reconcilers(&types, &mut manager, translator()).unwrap();

        assert_eq!(
            manager.controller_names(),
            vec![
                "gateway-class",
                "gateway",
                "reference-grant",
                "http-route",
                "grpc-route",
                "tls-route",
            ]
        );
    }

    #[tokio::test]
    async fn attach_failure_keeps_earlier_attachments_and_names_the_failure() {
        // Only the v1 kinds are registered, so the third reconciler
        // (reference-grant, a v1beta1 kind) is the first to fail.
        let mut types = TypeRegistry::new();
        types.register(&GATEWAY_V1).unwrap();
        let mut manager = ControllerManager::new(test_support::client());

        let err = register_reconcilers(&types, &mut manager, translator()).unwrap_err();

        assert_eq!(manager.controller_names(), vec!["gateway-class", "gateway"]);
        match err {
            Error::ReconcilerAttach { name, .. } => assert_eq!(name, "reference-grant"),
            other => panic!("expected ReconcilerAttach, got {other}"),
        }
    }

    #[tokio::test]
    async fn attach_requires_decoding_metadata() {
        let types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let err = Reconciler::HttpRoute.attach(&types, &mut manager).unwrap_err();
        assert!(matches!(err, Error::TypeRegistration { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn managed_class_filter_matches_only_our_controller_name() {
        let mut types = TypeRegistry::new();
        register_gateway_types(&mut types).unwrap();
        let resource = types.resolve(GATEWAY_API_GROUP, "GatewayClass").unwrap();

        let mut ours = DynamicObject::new("weir", resource);
        ours.data = json!({ "spec": { "controllerName": GATEWAY_CONTROLLER_NAME } });
        assert!(is_managed_class(&ours));

        let mut foreign = DynamicObject::new("other", resource);
        foreign.data = json!({ "spec": { "controllerName": "example.io/other" } });
        assert!(!is_managed_class(&foreign));

        let empty = DynamicObject::new("empty", resource);
        assert!(!is_managed_class(&empty));
    }
}
