use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Public ledger networks a client can be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Previewnet,
}

impl Network {
    /// Lowercase name, as accepted by `HEDERA_NETWORK` and used in explorer URLs.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Previewnet => "previewnet",
        }
    }

    /// Default public mirror node for this network.
    pub fn mirror_node_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mainnet-public.mirrornode.hedera.com",
            Network::Testnet => "https://testnet.mirrornode.hedera.com",
            Network::Previewnet => "https://previewnet.mirrornode.hedera.com",
        }
    }

    /// HashScan page for a token on this network.
    pub fn explorer_token_url(&self, token: &impl fmt::Display) -> String {
        format!("https://hashscan.io/{}/token/{token}", self.name())
    }

    /// Whether transactions on this network spend real value.
    pub fn is_production(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network {0:?} (expected mainnet, testnet or previewnet)")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "previewnet" => Ok(Network::Previewnet),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("MainNet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!(" testnet ".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!("previewnet".parse::<Network>().unwrap(), Network::Previewnet);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "devnet".parse::<Network>().unwrap_err();
        assert!(err.to_string().contains("devnet"));
    }

    #[test]
    fn defaults_to_testnet() {
        assert_eq!(Network::default(), Network::Testnet);
        assert!(!Network::default().is_production());
        assert!(Network::Mainnet.is_production());
    }

    #[test]
    fn explorer_url_includes_network_and_token() {
        assert_eq!(
            Network::Mainnet.explorer_token_url(&"0.0.42"),
            "https://hashscan.io/mainnet/token/0.0.42"
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Network::Previewnet).unwrap();
        assert_eq!(json, "\"previewnet\"");
        let parsed: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Network::Previewnet);
    }
}
