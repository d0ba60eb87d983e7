//! Activation gating for the gateway controllers
//!
//! Bootstrap runs once, synchronously, during operator initialization.
//! Three gates are evaluated in order: the feature flag, the dataplane
//! network mode, and the required-capability validation. Any gate failing
//! soft-disables the feature; only the committed activation path (type
//! registration and reconciler attachment) can return an error, because at
//! that point a partially wired controller set would be worse than failing
//! outright.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::capability::{check_capabilities, SchemaRegistry, REQUIRED_GATEWAY_CAPABILITIES};
use crate::config::GatewayConfig;
use crate::controller::{register_reconcilers, GatewayTranslator};
use crate::error::{AggregateError, Error};
use crate::manager::ControllerManager;
use crate::scheme::{register_gateway_types, register_service_import_types, TypeRegistry};

/// Outcome of one bootstrap pass.
///
/// Recomputed from scratch on every process start; never persisted.
#[derive(Debug)]
pub enum ActivationDecision {
    /// All gates passed and the controllers are attached.
    Proceed,
    /// The feature did not activate; the host process is unaffected.
    Skipped(SkipReason),
}

impl ActivationDecision {
    /// True when the controllers were activated.
    pub fn proceeded(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// Why activation was skipped.
#[derive(Debug)]
pub enum SkipReason {
    /// The feature is administratively disabled
    FeatureDisabled,
    /// The dataplane cannot route gateway traffic in its current mode
    NetworkModeUnsupported,
    /// Required schemas are missing from the cluster
    MissingCapabilities(AggregateError),
}

/// Everything the bootstrap needs from the enclosing process.
pub struct BootstrapParams<'a> {
    /// Static configuration flags
    pub config: &'a GatewayConfig,
    /// Cluster schema registry for capability checks
    pub schemas: &'a dyn SchemaRegistry,
    /// Type registry to populate
    pub types: &'a mut TypeRegistry,
    /// Manager the reconcilers attach to
    pub manager: &'a mut ControllerManager,
    /// Translation layer handed to the gateway reconciler
    pub translator: Arc<dyn GatewayTranslator>,
}

/// Run the activation gates and, when they all pass, wire up the gateway
/// controllers.
///
/// Gate failures are converted into a [`SkipReason`] and a log entry; the
/// feature is simply absent and the caller keeps running. The gates
/// short-circuit: a disabled feature performs no capability check at all.
pub async fn setup_gateway_controllers(
    params: BootstrapParams<'_>,
) -> Result<ActivationDecision, Error> {
    if !params.config.enable_gateway_api {
        return Ok(ActivationDecision::Skipped(SkipReason::FeatureDisabled));
    }

    if !params.config.network_mode_supported() {
        warn!("Gateway API support requires either kube-proxy replacement or NodePort services enabled");
        return Ok(ActivationDecision::Skipped(
            SkipReason::NetworkModeUnsupported,
        ));
    }

    info!(
        capabilities = ?REQUIRED_GATEWAY_CAPABILITIES,
        "checking for required Gateway API resources"
    );
    if let Err(failures) = check_capabilities(params.schemas, REQUIRED_GATEWAY_CAPABILITIES).await {
        error!(
            error = %failures,
            "required Gateway API resources are not installed, refer to the docs for installation instructions"
        );
        return Ok(ActivationDecision::Skipped(SkipReason::MissingCapabilities(
            failures,
        )));
    }

    register_gateway_types(params.types)?;
    register_service_import_types(params.schemas, params.types).await;

    register_reconcilers(params.types, params.manager, params.translator)?;

    Ok(ActivationDecision::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{MockSchemaRegistry, SchemaDescriptor};
    use crate::config::KubeProxyReplacement;
    use crate::controller::MockGatewayTranslator;
    use crate::test_support;

    fn translator() -> Arc<dyn GatewayTranslator> {
        let mut mock = MockGatewayTranslator::new();
        mock.expect_translate().returning(|_| Ok(Vec::new()));
        Arc::new(mock)
    }

    fn serving_registry(versions: &'static [&'static str]) -> MockSchemaRegistry {
        let mut registry = MockSchemaRegistry::new();
        registry.expect_is_enabled().return_const(true);
        registry.expect_get_schema().returning(move |name| {
            Ok(Some(SchemaDescriptor {
                name: name.to_string(),
                served_versions: versions.iter().map(|v| v.to_string()).collect(),
            }))
        });
        registry
    }

    #[tokio::test]
    async fn disabled_feature_skips_without_touching_the_registry() {
        // A mock with no expectations panics on any call, so this also
        // proves gate ordering: no capability check happens at all.
        let registry = MockSchemaRegistry::new();
        let config = GatewayConfig {
            enable_gateway_api: false,
            ..GatewayConfig::default()
        };
        let mut types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let decision = setup_gateway_controllers(BootstrapParams {
            config: &config,
            schemas: &registry,
            types: &mut types,
            manager: &mut manager,
            translator: translator(),
        })
        .await
        .unwrap();

        assert!(matches!(
            decision,
            ActivationDecision::Skipped(SkipReason::FeatureDisabled)
        ));
        assert!(types.is_empty());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn unsupported_network_mode_skips_before_capability_checks() {
        let registry = MockSchemaRegistry::new();
        let config = GatewayConfig {
            kube_proxy_replacement: KubeProxyReplacement::False,
            enable_node_port: false,
            ..GatewayConfig::default()
        };
        let mut types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let decision = setup_gateway_controllers(BootstrapParams {
            config: &config,
            schemas: &registry,
            types: &mut types,
            manager: &mut manager,
            translator: translator(),
        })
        .await
        .unwrap();

        assert!(matches!(
            decision,
            ActivationDecision::Skipped(SkipReason::NetworkModeUnsupported)
        ));
    }

    #[tokio::test]
    async fn node_port_fallback_passes_the_network_gate() {
        let registry = serving_registry(&["v1", "v1beta1", "v1alpha2"]);
        let config = GatewayConfig {
            kube_proxy_replacement: KubeProxyReplacement::False,
            enable_node_port: true,
            ..GatewayConfig::default()
        };
        let mut types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let decision = setup_gateway_controllers(BootstrapParams {
            config: &config,
            schemas: &registry,
            types: &mut types,
            manager: &mut manager,
            translator: translator(),
        })
        .await
        .unwrap();

        assert!(decision.proceeded());
    }

    #[tokio::test]
    async fn missing_capabilities_soft_disable_the_feature() {
        let mut registry = MockSchemaRegistry::new();
        registry.expect_is_enabled().return_const(true);
        registry.expect_get_schema().returning(|_| Ok(None));

        let config = GatewayConfig {
            kube_proxy_replacement: KubeProxyReplacement::True,
            ..GatewayConfig::default()
        };
        let mut types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let decision = setup_gateway_controllers(BootstrapParams {
            config: &config,
            schemas: &registry,
            types: &mut types,
            manager: &mut manager,
            translator: translator(),
        })
        .await
        .unwrap();

        match decision {
            ActivationDecision::Skipped(SkipReason::MissingCapabilities(failures)) => {
                assert_eq!(failures.len(), REQUIRED_GATEWAY_CAPABILITIES.len());
            }
            other => panic!("expected MissingCapabilities skip, got {other:?}"),
        }
        assert!(types.is_empty());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn full_activation_attaches_every_reconciler() {
        // ServiceImport is not served, so the optional pass stays off
        // while activation still succeeds.
        let mut registry = MockSchemaRegistry::new();
        registry.expect_is_enabled().return_const(true);
        registry.expect_get_schema().returning(|name| {
            if name.starts_with("serviceimports.") {
                Ok(None)
            } else {
                Ok(Some(SchemaDescriptor {
                    name: name.to_string(),
                    served_versions: vec![
                        "v1".to_string(),
                        "v1beta1".to_string(),
                        "v1alpha2".to_string(),
                    ],
                }))
            }
        });

        let config = GatewayConfig {
            kube_proxy_replacement: KubeProxyReplacement::True,
            ..GatewayConfig::default()
        };
        let mut types = TypeRegistry::new();
        let mut manager = ControllerManager::new(test_support::client());

        let decision = setup_gateway_controllers(BootstrapParams {
            config: &config,
            schemas: &registry,
            types: &mut types,
            manager: &mut manager,
            translator: translator(),
        })
        .await
        .unwrap();

        assert!(decision.proceeded());
        assert_eq!(manager.len(), 6);
        assert!(types
            .resolve(crate::capability::MCS_API_GROUP, "ServiceImport")
            .is_none());
    }
}
