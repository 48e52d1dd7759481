//! Cross-Chain Address Validation and Encoding
//!
//! Validates Ethereum and Stacks addresses and converts them to the fixed
//! 32-byte recipient value expected by the bridge contracts.
//!
//! ## Bytes32 Layouts
//!
//! ```text
//! Stacks:   | zero padding (11) | version (1) | hash160 (20) |
//! Ethereum: | zero padding (12) | address (20)               |
//! ```
//!
//! ## Stacks Version Bytes
//!
//! - `22` (`SP`): mainnet single-sig
//! - `20` (`SM`): mainnet multi-sig
//! - `26` (`ST`): testnet single-sig
//! - `21` (`SN`): testnet multi-sig

use std::fmt;

use crate::c32::{c32_value, c32check_address, c32check_address_decode};
use crate::error::{BridgeError, Result};
use crate::types::{Bytes32, ChainFamily, StacksNetwork};

/// Offset of the version byte in a Stacks bytes32 encoding
const STACKS_VERSION_OFFSET: usize = 11;

/// Offset of the 20-byte address in an Ethereum bytes32 encoding
const EVM_ADDRESS_OFFSET: usize = 12;

const STACKS_MIN_LEN: usize = 38;
const STACKS_MAX_LEN: usize = 41;

// ============================================================================
// Stacks Versions
// ============================================================================

/// The four known Stacks address versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StacksVersion {
    MainnetSingleSig,
    MainnetMultiSig,
    TestnetSingleSig,
    TestnetMultiSig,
}

impl StacksVersion {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            22 => Ok(StacksVersion::MainnetSingleSig),
            20 => Ok(StacksVersion::MainnetMultiSig),
            26 => Ok(StacksVersion::TestnetSingleSig),
            21 => Ok(StacksVersion::TestnetMultiSig),
            other => Err(BridgeError::encoding(format!(
                "Unknown Stacks version byte: {}",
                other
            ))),
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_uppercase().as_str() {
            "SP" => Some(StacksVersion::MainnetSingleSig),
            "SM" => Some(StacksVersion::MainnetMultiSig),
            "ST" => Some(StacksVersion::TestnetSingleSig),
            "SN" => Some(StacksVersion::TestnetMultiSig),
            _ => None,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            StacksVersion::MainnetSingleSig => 22,
            StacksVersion::MainnetMultiSig => 20,
            StacksVersion::TestnetSingleSig => 26,
            StacksVersion::TestnetMultiSig => 21,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            StacksVersion::MainnetSingleSig => "SP",
            StacksVersion::MainnetMultiSig => "SM",
            StacksVersion::TestnetSingleSig => "ST",
            StacksVersion::TestnetMultiSig => "SN",
        }
    }

    pub fn network(&self) -> StacksNetwork {
        match self {
            StacksVersion::MainnetSingleSig | StacksVersion::MainnetMultiSig => {
                StacksNetwork::Mainnet
            }
            StacksVersion::TestnetSingleSig | StacksVersion::TestnetMultiSig => {
                StacksNetwork::Testnet
            }
        }
    }
}

// ============================================================================
// Stacks Address
// ============================================================================

/// Decoded Stacks principal: version + hash160
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    pub version: StacksVersion,
    pub hash160: [u8; 20],
}

impl StacksAddress {
    /// Parse and checksum-verify a c32check Stacks address
    pub fn parse(address: &str) -> Result<Self> {
        if !is_valid_stacks_address(address) {
            return Err(BridgeError::validation(format!(
                "Invalid Stacks address: {}",
                address
            )));
        }

        let (version_byte, payload) = c32check_address_decode(address)?;
        let version = StacksVersion::from_byte(version_byte)?;

        if payload.len() != 20 {
            return Err(BridgeError::encoding(format!(
                "Invalid Stacks hash length: expected 20 bytes, got {}",
                payload.len()
            )));
        }

        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(&payload);
        Ok(Self { version, hash160 })
    }

    /// Re-encode as a c32check string with a fresh checksum
    pub fn to_c32(&self) -> Result<String> {
        c32check_address(self.version.byte(), &self.hash160)
    }

    /// Layout: | zero (11) | version (1) | hash160 (20) |
    pub fn to_bytes32(&self) -> Bytes32 {
        let mut result = [0u8; 32];
        result[STACKS_VERSION_OFFSET] = self.version.byte();
        result[STACKS_VERSION_OFFSET + 1..].copy_from_slice(&self.hash160);
        Bytes32(result)
    }

    /// Parse from bytes32, rejecting non-zero padding and unknown versions
    pub fn from_bytes32(bytes: &Bytes32) -> Result<Self> {
        let raw = bytes.as_bytes();
        if raw[..STACKS_VERSION_OFFSET].iter().any(|&b| b != 0) {
            return Err(BridgeError::encoding(
                "Stacks bytes32 has non-zero padding: expected 11 leading zero bytes",
            ));
        }

        let version = StacksVersion::from_byte(raw[STACKS_VERSION_OFFSET])?;
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(&raw[STACKS_VERSION_OFFSET + 1..]);
        Ok(Self { version, hash160 })
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_c32() {
            Ok(address) => write!(f, "{}", address),
            Err(_) => write!(f, "{}:{}", self.version.prefix(), hex::encode(self.hash160)),
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Check an address against the format rules of its chain. No I/O.
pub fn is_valid_address(address: &str, chain: ChainFamily) -> bool {
    match chain {
        ChainFamily::Ethereum => is_valid_evm_address(address),
        ChainFamily::Stacks => is_valid_stacks_address(address),
    }
}

/// `0x` followed by exactly 40 hex characters
pub fn is_valid_evm_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(body) => body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Known prefix, 38-41 characters, c32 alphabet after the prefix
pub fn is_valid_stacks_address(address: &str) -> bool {
    let upper = address.to_ascii_uppercase();
    if !upper.is_ascii() {
        return false;
    }
    if !(STACKS_MIN_LEN..=STACKS_MAX_LEN).contains(&upper.len()) {
        return false;
    }

    let (prefix, body) = upper.split_at(2);
    StacksVersion::from_prefix(prefix).is_some() && body.chars().all(|c| c32_value(c).is_some())
}

/// Validate or fail with a `Validation` error naming the chain
pub fn require_valid_address(address: &str, chain: ChainFamily) -> Result<()> {
    if is_valid_address(address, chain) {
        Ok(())
    } else {
        Err(BridgeError::validation(format!(
            "Invalid {} address: {}",
            chain, address
        )))
    }
}

/// Canonical spelling of a valid address: uppercase c32 for Stacks,
/// lowercase hex for Ethereum. This is the form the bytes32 decoders return.
pub fn normalize_address(address: &str, chain: ChainFamily) -> Result<String> {
    match chain {
        ChainFamily::Stacks => StacksAddress::parse(address)?.to_c32(),
        ChainFamily::Ethereum => Ok(encode_evm_address(&parse_evm_address(address)?)),
    }
}

/// Fail with `Validation` unless the principal belongs to `network`
pub fn require_stacks_network(address: &str, network: StacksNetwork) -> Result<()> {
    let parsed = StacksAddress::parse(address)?;
    if parsed.version.network() != network {
        return Err(BridgeError::validation(format!(
            "{} is not a {} address",
            address, network
        )));
    }
    Ok(())
}

/// Parse and checksum-verify a Stacks principal into version and hash160
pub fn parse_stacks_address(address: &str) -> Result<StacksAddress> {
    StacksAddress::parse(address)
}

/// `0x` followed by 64 hex characters; both chains use this txid shape
pub fn is_valid_tx_hash(tx_hash: &str) -> bool {
    match tx_hash.strip_prefix("0x") {
        Some(body) => body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ============================================================================
// Bytes32 Encoding
// ============================================================================

/// Encode an address into the 32-byte cross-chain recipient value
pub fn encode_to_bytes32(address: &str, chain: ChainFamily) -> Result<Bytes32> {
    require_valid_address(address, chain)?;

    match chain {
        ChainFamily::Stacks => Ok(StacksAddress::parse(address)?.to_bytes32()),
        ChainFamily::Ethereum => {
            let raw = parse_evm_address(address)?;
            Ok(evm_address_to_bytes32(&raw))
        }
    }
}

/// Inverse of the Stacks path of [`encode_to_bytes32`]
///
/// The version byte must belong to `network_hint`.
pub fn decode_bytes32_to_stacks_address(
    bytes: &Bytes32,
    network_hint: StacksNetwork,
) -> Result<String> {
    let address = StacksAddress::from_bytes32(bytes)?;
    if address.version.network() != network_hint {
        return Err(BridgeError::encoding(format!(
            "Version {} ({}) does not belong to {}",
            address.version.byte(),
            address.version.prefix(),
            network_hint
        )));
    }
    address.to_c32()
}

/// Same as [`decode_bytes32_to_stacks_address`] for a `0x`-hex value
pub fn decode_hex_to_stacks_address(hex: &str, network_hint: StacksNetwork) -> Result<String> {
    let bytes = Bytes32::from_hex(hex)?;
    decode_bytes32_to_stacks_address(&bytes, network_hint)
}

/// Inverse of the Ethereum path: lowercase `0x` hex of the last 20 bytes
pub fn decode_bytes32_to_evm_address(bytes: &Bytes32) -> Result<String> {
    let raw = bytes.as_bytes();
    if raw[..EVM_ADDRESS_OFFSET].iter().any(|&b| b != 0) {
        return Err(BridgeError::encoding(
            "EVM bytes32 has non-zero padding: expected 12 leading zero bytes",
        ));
    }

    let mut address = [0u8; 20];
    address.copy_from_slice(&raw[EVM_ADDRESS_OFFSET..]);
    Ok(encode_evm_address(&address))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a 0x-prefixed hex EVM address to 20 bytes
pub fn parse_evm_address(addr: &str) -> Result<[u8; 20]> {
    if !is_valid_evm_address(addr) {
        return Err(BridgeError::validation(format!(
            "Invalid EVM address: {}",
            addr
        )));
    }

    let bytes = hex::decode(&addr[2..])
        .map_err(|e| BridgeError::encoding(format!("Invalid EVM address hex: {}", e)))?;

    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Encode 20 bytes to EVM hex string with 0x prefix
pub fn encode_evm_address(bytes: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Left-pad a 20-byte EVM address to 32 bytes
pub fn evm_address_to_bytes32(addr: &[u8; 20]) -> Bytes32 {
    let mut result = [0u8; 32];
    result[EVM_ADDRESS_OFFSET..].copy_from_slice(addr);
    Bytes32(result)
}
