//! Crockford-style base32 ("c32") encoding used by Stacks principals
//!
//! ## Format
//!
//! A c32check address is laid out as:
//! ```text
//! 'S' | version char | c32(hash160 (20 bytes) || checksum (4 bytes))
//! ```
//!
//! The checksum is the first 4 bytes of `sha256(sha256(version || hash160))`.
//!
//! The body is a big-endian base-32 integer. Every symbol carries exactly
//! 5 bits, and each leading zero byte of the payload is written as one
//! leading `'0'` symbol, so decoding restores leading zeros exactly. The
//! integer easily exceeds 64 bits, so all conversions go through `BigUint`.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use crate::error::{BridgeError, Result};

/// The 32 symbols of the c32 alphabet, in value order
pub const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Length of the trailing c32check checksum in bytes
pub const CHECKSUM_LEN: usize = 4;

/// Value of a c32 symbol (case-insensitive), or `None` if outside the alphabet
pub fn c32_value(ch: char) -> Option<u8> {
    let upper = ch.to_ascii_uppercase();
    C32_ALPHABET
        .iter()
        .position(|&c| c as char == upper)
        .map(|p| p as u8)
}

/// Symbol for a 5-bit value
pub fn c32_symbol(value: u8) -> Result<char> {
    C32_ALPHABET
        .get(value as usize)
        .map(|&c| c as char)
        .ok_or_else(|| BridgeError::encoding(format!("c32 value out of range: {}", value)))
}

/// Encode raw bytes as a c32 string
pub fn c32_encode(bytes: &[u8]) -> String {
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    let value = BigUint::from_bytes_be(bytes);

    let mut out = "0".repeat(leading_zeros);
    if value != BigUint::default() {
        for digit in value.to_radix_be(32) {
            out.push(C32_ALPHABET[digit as usize] as char);
        }
    }
    out
}

/// Decode a c32 string to raw bytes
pub fn c32_decode(input: &str) -> Result<Vec<u8>> {
    let digits = input
        .chars()
        .map(|ch| {
            c32_value(ch)
                .ok_or_else(|| BridgeError::encoding(format!("Invalid c32 character: {:?}", ch)))
        })
        .collect::<Result<Vec<u8>>>()?;

    let leading_zeros = digits.iter().take_while(|&&d| d == 0).count();
    let significant = &digits[leading_zeros..];

    let mut out = vec![0u8; leading_zeros];
    if !significant.is_empty() {
        let value = BigUint::from_radix_be(significant, 32)
            .ok_or_else(|| BridgeError::encoding("Invalid c32 digit sequence"))?;
        out.extend(value.to_bytes_be());
    }
    Ok(out)
}

/// First 4 bytes of `sha256(sha256(version || payload))`
pub fn c32_checksum(version: u8, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut first = Sha256::new();
    first.update([version]);
    first.update(payload);
    let second = Sha256::digest(first.finalize());

    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&second[..CHECKSUM_LEN]);
    checksum
}

/// Encode a version + payload as a c32check address (`S` + version + body)
pub fn c32check_address(version: u8, payload: &[u8]) -> Result<String> {
    let version_char = c32_symbol(version)?;
    let checksum = c32_checksum(version, payload);

    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum);

    Ok(format!("S{}{}", version_char, c32_encode(&data)))
}

/// Decode a c32check address into `(version, payload)`, verifying the checksum
pub fn c32check_address_decode(address: &str) -> Result<(u8, Vec<u8>)> {
    let mut chars = address.chars();
    match chars.next() {
        Some('S') | Some('s') => {}
        _ => {
            return Err(BridgeError::encoding(format!(
                "Stacks address must start with 'S': {}",
                address
            )))
        }
    }
    let version = chars
        .next()
        .and_then(c32_value)
        .ok_or_else(|| BridgeError::encoding(format!("Missing version character: {}", address)))?;

    let data = c32_decode(chars.as_str())?;
    if data.len() < CHECKSUM_LEN {
        return Err(BridgeError::encoding(format!(
            "c32 body too short: {} bytes",
            data.len()
        )));
    }

    let (payload, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    let expected = c32_checksum(version, payload);
    if checksum != expected {
        return Err(BridgeError::encoding(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            address,
            hex::encode(expected),
            hex::encode(checksum)
        )));
    }

    Ok((version, payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYER_HASH: &str = "6d78de7b0625dfbfc16c3a8a5735f6dc3dc3f2ce";

    #[test]
    fn test_c32_value_case_insensitive() {
        assert_eq!(c32_value('0'), Some(0));
        assert_eq!(c32_value('Z'), Some(31));
        assert_eq!(c32_value('z'), Some(31));
        assert_eq!(c32_value('T'), Some(26));
        // I, L, O and U are not part of the alphabet
        assert_eq!(c32_value('I'), None);
        assert_eq!(c32_value('L'), None);
        assert_eq!(c32_value('O'), None);
        assert_eq!(c32_value('U'), None);
    }

    #[test]
    fn test_c32_encode_preserves_leading_zero_bytes() {
        assert_eq!(c32_encode(&[0, 0, 1]), "001");
        assert_eq!(c32_encode(&[0, 0]), "00");
        assert_eq!(c32_encode(&[]), "");
        assert_eq!(c32_encode(&[32]), "10");
    }

    #[test]
    fn test_c32_decode_restores_leading_zero_bytes() {
        assert_eq!(c32_decode("001").unwrap(), vec![0, 0, 1]);
        assert_eq!(c32_decode("00").unwrap(), vec![0, 0]);
        assert_eq!(c32_decode("10").unwrap(), vec![32]);
        assert!(c32_decode("0O").is_err());
    }

    #[test]
    fn test_checksum_known_address() {
        let hash = hex::decode(DEPLOYER_HASH).unwrap();
        assert_eq!(hex::encode(c32_checksum(26, &hash)), "35687e14");
    }

    #[test]
    fn test_c32check_address_known_vectors() {
        let hash = hex::decode(DEPLOYER_HASH).unwrap();
        assert_eq!(
            c32check_address(26, &hash).unwrap(),
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"
        );
        assert_eq!(
            c32check_address(22, &hash).unwrap(),
            "SP1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRCBGD7R"
        );
    }

    #[test]
    fn test_c32check_decode_verifies_checksum() {
        let (version, payload) =
            c32check_address_decode("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM").unwrap();
        assert_eq!(version, 26);
        assert_eq!(hex::encode(payload), DEPLOYER_HASH);

        // Last character altered
        let result = c32check_address_decode("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGN");
        assert!(matches!(result, Err(BridgeError::Encoding(_))));
    }

    #[test]
    fn test_c32check_leading_zero_hash() {
        let mut hash = [0xffu8; 20];
        hash[0] = 0;
        let address = c32check_address(22, &hash).unwrap();
        assert_eq!(address, "SP0FZZZZZZZZZZZZZZZZZZZZZZZZZZZZZWHDRM1D");

        let (version, payload) = c32check_address_decode(&address).unwrap();
        assert_eq!(version, 22);
        assert_eq!(payload, hash.to_vec());
    }

    #[test]
    fn test_c32_symbol_out_of_range() {
        assert!(c32_symbol(32).is_err());
        assert_eq!(c32_symbol(26).unwrap(), 'T');
    }
}
