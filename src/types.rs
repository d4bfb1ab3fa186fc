//! Shared types for the primitive layer

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Hash160 type: RIPEMD160(SHA256(x))
pub type Hash160 = [u8; 20];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Script evaluation stack
pub type Stack = Vec<ByteString>;

/// Which public network a transaction or address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Version byte for pay-to-pubkey-hash addresses
    pub fn p2pkh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2PKH_PREFIX,
            Network::Testnet => TESTNET_P2PKH_PREFIX,
        }
    }

    /// Version byte for pay-to-script-hash addresses
    pub fn p2sh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_P2SH_PREFIX,
            Network::Testnet => TESTNET_P2SH_PREFIX,
        }
    }

    pub fn is_testnet(self) -> bool {
        matches!(self, Network::Testnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}
