//! Common types for cross-chain operations
//!
//! Chain families, networks, the canonical transaction status, and the
//! fixed 32-byte cross-chain value shared by every other module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

// ============================================================================
// Chains
// ============================================================================

/// Chain family an address or transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Ethereum,
    Stacks,
}

impl ChainFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Ethereum => "ethereum",
            ChainFamily::Stacks => "stacks",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stacks network, used as a hint when decoding principals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StacksNetwork {
    Mainnet,
    Testnet,
}

impl FromStr for StacksNetwork {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(StacksNetwork::Mainnet),
            "testnet" => Ok(StacksNetwork::Testnet),
            other => Err(BridgeError::Config(format!(
                "Unknown Stacks network: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for StacksNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StacksNetwork::Mainnet => write!(f, "mainnet"),
            StacksNetwork::Testnet => write!(f, "testnet"),
        }
    }
}

// ============================================================================
// Bridge Operations
// ============================================================================

/// Direction of a bridge operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ethereum -> Stacks: token locked on Ethereum, wrapped token minted on Stacks
    Deposit,
    /// Stacks -> Ethereum: wrapped token burned on Stacks, token released on Ethereum
    Withdraw,
}

impl Direction {
    pub fn source_chain(&self) -> ChainFamily {
        match self {
            Direction::Deposit => ChainFamily::Ethereum,
            Direction::Withdraw => ChainFamily::Stacks,
        }
    }

    pub fn destination_chain(&self) -> ChainFamily {
        match self {
            Direction::Deposit => ChainFamily::Stacks,
            Direction::Withdraw => ChainFamily::Ethereum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Deposit => "deposit",
            Direction::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical status of a bridge transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Terminal records are never polled or moved again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Bytes32
// ============================================================================

/// Fixed 32-byte cross-chain value (recipient encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)
            .map_err(|e| BridgeError::encoding(format!("Invalid bytes32 hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(BridgeError::encoding(format!(
                "Bytes32 must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(&bytes);
        Ok(Bytes32(result))
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Bytes32(bytes)
    }
}

impl Serialize for Bytes32 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_hex().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        Bytes32::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}
