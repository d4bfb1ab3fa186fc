//! Hashing, Base58Check and varint codecs
//!
//! Everything above this module frames its bytes through these helpers: script
//! and transaction serialization use the varint and little-endian readers,
//! addresses use Base58Check, and identifiers use the double SHA-256.

use bitcoin_hashes::{sha256d, Hash as BitcoinHash};
use num_bigint::BigUint;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::io::Read;

use crate::constants::BASE58_ALPHABET;
use crate::error::{PrimitiveError, Result};
use crate::types::{Hash, Hash160, Network};

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha256_hash = Sha256::digest(data);
    Ripemd160::digest(sha256_hash).into()
}

/// SHA256(SHA256(x))
pub fn hash256(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// 32-byte big-endian form of an integer, keeping the low 256 bits
pub fn int_to_bytes32(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let take = bytes.len().min(32);
    let mut result = [0u8; 32];
    result[32 - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    result
}

/// Base58 encoding; every leading zero byte becomes a literal '1'
pub fn encode_base58(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut result = "1".repeat(zeros);

    let rest = &data[zeros..];
    if !rest.is_empty() {
        let num = BigUint::from_bytes_be(rest);
        result.extend(
            num.to_radix_be(58)
                .into_iter()
                .map(|digit| BASE58_ALPHABET[digit as usize] as char),
        );
    }
    result
}

/// Base58 of the payload followed by the first four bytes of its hash256
pub fn encode_base58_checksum(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&hash256(payload)[..4]);
    encode_base58(&data)
}

/// Inverse of [`encode_base58`]
pub fn decode_base58(encoded: &str) -> Result<Vec<u8>> {
    let zeros = encoded.bytes().take_while(|&c| c == b'1').count();

    let digits = encoded.bytes().skip(zeros).map(|c| {
        BASE58_ALPHABET
            .iter()
            .position(|&a| a == c)
            .map(|d| d as u8)
            .ok_or_else(|| PrimitiveError::Base58(format!("invalid character {:?}", c as char)))
    })
    .collect::<Result<Vec<u8>>>()?;

    let mut result = vec![0u8; zeros];
    if !digits.is_empty() {
        let num = BigUint::from_radix_be(&digits, 58)
            .ok_or_else(|| PrimitiveError::Base58("invalid digit".to_string()))?;
        result.extend(num.to_bytes_be());
    }
    Ok(result)
}

/// Decode Base58Check and return the payload without its checksum
pub fn decode_base58_checksum(encoded: &str) -> Result<Vec<u8>> {
    let data = decode_base58(encoded)?;
    if data.len() < 4 {
        return Err(PrimitiveError::Base58(format!(
            "{} bytes is too short for a checksum",
            data.len()
        )));
    }
    let (payload, checksum) = data.split_at(data.len() - 4);
    if hash256(payload)[..4] != *checksum {
        return Err(PrimitiveError::Base58(format!(
            "bad checksum {} for payload {}",
            hex::encode(checksum),
            hex::encode(payload)
        )));
    }
    Ok(payload.to_vec())
}

/// Pay-to-pubkey-hash address for a hash160
pub fn h160_to_p2pkh_address(h160: &Hash160, network: Network) -> String {
    let mut payload = vec![network.p2pkh_prefix()];
    payload.extend_from_slice(h160);
    encode_base58_checksum(&payload)
}

/// Pay-to-script-hash address for a hash160
pub fn h160_to_p2sh_address(h160: &Hash160, network: Network) -> String {
    let mut payload = vec![network.p2sh_prefix()];
    payload.extend_from_slice(h160);
    encode_base58_checksum(&payload)
}

/// Encode an integer as a varint
///
/// | value            | encoding                 |
/// |------------------|--------------------------|
/// | `< 0xfd`         | single byte              |
/// | `< 0x10000`      | `0xfd` + 2 bytes LE      |
/// | `< 0x100000000`  | `0xfe` + 4 bytes LE      |
/// | otherwise        | `0xff` + 8 bytes LE      |
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value < 0x10000 {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value < 0x1_0000_0000 {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

/// Encode a value that may not fit in eight bytes
pub fn try_encode_varint(value: u128) -> Result<Vec<u8>> {
    u64::try_from(value)
        .map(encode_varint)
        .map_err(|_| PrimitiveError::VarintOverflow(value))
}

/// Read a varint from a stream
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let marker = read_u8(reader)?;
    Ok(match marker {
        0xfd => u64::from(read_u16_le(reader)?),
        0xfe => u64::from(read_u32_le(reader)?),
        0xff => read_u64_le(reader)?,
        n => u64::from(n),
    })
}

pub fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8> {
    let [b] = read_array::<R, 1>(reader)?;
    Ok(b)
}

pub fn read_u16_le<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array(reader)?))
}

pub fn read_u32_le<R: Read + ?Sized>(reader: &mut R) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(reader)?))
}

pub fn read_u64_le<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(reader)?))
}

pub fn read_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read exactly `len` bytes
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
