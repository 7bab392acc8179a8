//! Relay configuration

use serde::{Deserialize, Serialize};

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// ICE server URLs handed to the transport engine for every connection
    pub ice_servers: Vec<String>,
    /// Drop a namespace from the registry when its last peer leaves
    pub prune_empty_namespaces: bool,
    /// Maximum peers per namespace (0 = unlimited)
    pub max_peers_per_namespace: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            prune_empty_namespaces: true,
            max_peers_per_namespace: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.ice_servers, vec!["stun:stun.l.google.com:19302"]);
        assert!(config.prune_empty_namespaces);
        assert_eq!(config.max_peers_per_namespace, 0);
    }

    #[test]
    fn test_config_serialization() {
        let config = RelayConfig::default();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RelayConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.ice_servers, config.ice_servers);
        assert_eq!(
            deserialized.max_peers_per_namespace,
            config.max_peers_per_namespace
        );
    }
}
