//! Bitcoin network definitions and constants.

use serde::{Deserialize, Serialize};

/// Bitcoin network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet
    #[default]
    Mainnet,
    /// Bitcoin testnet
    Testnet,
}

impl Network {
    /// Get the Bech32 human-readable part for this network.
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }

    /// Identify the network from a Bech32 human-readable part.
    pub fn from_bech32_hrp(hrp: &str) -> Option<Self> {
        match hrp {
            "bc" => Some(Network::Mainnet),
            "tb" => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Get the version byte for P2PKH addresses.
    pub fn p2pkh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// Get the version byte for P2SH addresses.
    pub fn p2sh_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet => 0xc4,
        }
    }

    /// Get the version byte for WIF-encoded private keys.
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }

    /// Identify the network from a WIF version byte.
    pub fn from_wif_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            0x80 => Some(Network::Mainnet),
            0xef => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Get the mempool.space API base URL for this network.
    pub fn explorer_api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mempool.space/api",
            Network::Testnet => "https://mempool.space/testnet/api",
        }
    }

    /// Parse network from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Some(Network::Mainnet),
            "testnet" | "testnet3" | "test" => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_str() {
        assert_eq!(Network::from_str("mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("MAINNET"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("testnet"), Some(Network::Testnet));
        assert_eq!(Network::from_str("invalid"), None);
    }

    #[test]
    fn test_wif_prefix_roundtrip() {
        for network in [Network::Mainnet, Network::Testnet] {
            assert_eq!(Network::from_wif_prefix(network.wif_prefix()), Some(network));
        }
        assert_eq!(Network::from_wif_prefix(0x00), None);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&Network::Testnet).unwrap();
        assert_eq!(json, "\"testnet\"");
        assert_eq!(Network::default(), Network::Mainnet);
    }
}
