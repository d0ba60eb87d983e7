//! Configuration flags for the gateway controllers
//!
//! All flags can also be set from the environment. Defaults match a
//! standalone deployment of the operator.

use std::fmt;

use clap::{ArgAction, Parser, ValueEnum};

use crate::DEFAULT_SECRETS_NAMESPACE;

/// Operating mode of the kube-proxy replacement dataplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KubeProxyReplacement {
    /// All replacement features enabled
    True,
    /// Only selected replacement features enabled
    False,
}

impl fmt::Display for KubeProxyReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
        }
    }
}

/// Configuration for the Gateway API controllers and the TLS secret sync.
#[derive(Debug, Clone, Parser)]
pub struct GatewayConfig {
    /// Enable the Gateway API controllers
    #[arg(
        long,
        env = "WEIR_ENABLE_GATEWAY_API",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub enable_gateway_api: bool,

    /// Enable only selected dataplane features ("false") or all of them ("true")
    #[arg(
        long,
        value_enum,
        env = "WEIR_KUBE_PROXY_REPLACEMENT",
        default_value_t = KubeProxyReplacement::False
    )]
    pub kube_proxy_replacement: KubeProxyReplacement,

    /// Enable NodePort type services in the dataplane
    #[arg(
        long,
        env = "WEIR_ENABLE_NODE_PORT",
        default_value_t = false,
        action = ArgAction::Set
    )]
    pub enable_node_port: bool,

    /// Fan-in TLS secret sync from gateway namespaces into the secrets namespace
    #[arg(
        long,
        env = "WEIR_ENABLE_SECRETS_SYNC",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub enable_secrets_sync: bool,

    /// Namespace holding the TLS secrets used by gateway listeners
    #[arg(
        long,
        env = "WEIR_SECRETS_NAMESPACE",
        default_value = DEFAULT_SECRETS_NAMESPACE
    )]
    pub secrets_namespace: String,

    /// Accept only proxy-protocol traffic on gateway listeners
    #[arg(
        long,
        env = "WEIR_ENABLE_PROXY_PROTOCOL",
        default_value_t = false,
        action = ArgAction::Set
    )]
    pub enable_proxy_protocol: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enable_gateway_api: true,
            kube_proxy_replacement: KubeProxyReplacement::False,
            enable_node_port: false,
            enable_secrets_sync: true,
            secrets_namespace: DEFAULT_SECRETS_NAMESPACE.to_string(),
            enable_proxy_protocol: false,
        }
    }
}

impl GatewayConfig {
    /// Whether the dataplane can route gateway traffic at all.
    ///
    /// Gateway support requires either full kube-proxy replacement or the
    /// NodePort fallback to be enabled.
    pub fn network_mode_supported(&self) -> bool {
        self.kube_proxy_replacement == KubeProxyReplacement::True || self.enable_node_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flag_defaults() {
        let parsed = GatewayConfig::parse_from(["weir-operator"]);
        let defaults = GatewayConfig::default();

        assert_eq!(parsed.enable_gateway_api, defaults.enable_gateway_api);
        assert_eq!(
            parsed.kube_proxy_replacement,
            defaults.kube_proxy_replacement
        );
        assert_eq!(parsed.enable_node_port, defaults.enable_node_port);
        assert_eq!(parsed.enable_secrets_sync, defaults.enable_secrets_sync);
        assert_eq!(parsed.secrets_namespace, DEFAULT_SECRETS_NAMESPACE);
        assert_eq!(parsed.enable_proxy_protocol, defaults.enable_proxy_protocol);
    }

    #[test]
    fn flags_parse_explicit_values() {
        let parsed = GatewayConfig::parse_from([
            "weir-operator",
            "--enable-gateway-api",
            "false",
            "--kube-proxy-replacement",
            "true",
            "--enable-node-port",
            "true",
            "--secrets-namespace",
            "edge-secrets",
        ]);

        assert!(!parsed.enable_gateway_api);
        assert_eq!(parsed.kube_proxy_replacement, KubeProxyReplacement::True);
        assert!(parsed.enable_node_port);
        assert_eq!(parsed.secrets_namespace, "edge-secrets");
    }

    #[test]
    fn network_mode_requires_replacement_or_node_port() {
        let mut config = GatewayConfig::default();

        config.kube_proxy_replacement = KubeProxyReplacement::True;
        config.enable_node_port = false;
        assert!(config.network_mode_supported());

        config.kube_proxy_replacement = KubeProxyReplacement::False;
        config.enable_node_port = true;
        assert!(config.network_mode_supported());

        config.enable_node_port = false;
        assert!(!config.network_mode_supported());
    }
}
