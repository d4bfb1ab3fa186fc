//! ECDSA signature value and its DER codec

use num_bigint::BigUint;
use std::fmt;

use crate::error::{PrimitiveError, Result};

/// DER tag for a constructed SEQUENCE
const DER_SEQUENCE: u8 = 0x30;

/// DER tag for an INTEGER
const DER_INTEGER: u8 = 0x02;

/// An ECDSA signature `(r, s)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Self { r, s }
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// `30 <len> 02 <rlen> <r> 02 <slen> <s>`
    pub fn der(&self) -> Vec<u8> {
        let mut body = der_integer(&self.r);
        body.extend(der_integer(&self.s));

        let mut result = vec![DER_SEQUENCE, body.len() as u8];
        result.extend(body);
        result
    }

    /// Parse a DER signature
    ///
    /// Only the tags and lengths are checked; a non-minimal integer encoding is
    /// accepted as long as the framing is consistent.
    pub fn parse(der: &[u8]) -> Result<Self> {
        if der.first() != Some(&DER_SEQUENCE) {
            return Err(bad_signature("missing sequence marker"));
        }
        let length = usize::from(*der.get(1).ok_or_else(|| bad_signature("missing length"))?);
        if length + 2 != der.len() {
            return Err(bad_signature("bad signature length"));
        }

        if der.get(2) != Some(&DER_INTEGER) {
            return Err(bad_signature("missing r marker"));
        }
        let r_length = usize::from(*der.get(3).ok_or_else(|| bad_signature("missing r length"))?);
        let r_end = 4 + r_length;
        let r = der.get(4..r_end).ok_or_else(|| bad_signature("truncated r"))?;

        if der.get(r_end) != Some(&DER_INTEGER) {
            return Err(bad_signature("missing s marker"));
        }
        let s_length = usize::from(
            *der
                .get(r_end + 1)
                .ok_or_else(|| bad_signature("missing s length"))?,
        );
        let s_start = r_end + 2;
        let s = der
            .get(s_start..s_start + s_length)
            .ok_or_else(|| bad_signature("truncated s"))?;

        if der.len() != 6 + r_length + s_length {
            return Err(bad_signature("signature too long"));
        }

        Ok(Self {
            r: BigUint::from_bytes_be(r),
            s: BigUint::from_bytes_be(s),
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:x},{:x})", self.r, self.s)
    }
}

/// Minimal big-endian INTEGER, padded with 0x00 when the high bit is set
fn der_integer(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    let mut result = vec![DER_INTEGER, bytes.len() as u8];
    result.extend(bytes);
    result
}

fn bad_signature(reason: &str) -> PrimitiveError {
    PrimitiveError::SignatureFormat(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_int(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
    }

    #[test]
    fn test_der_small() {
        let sig = Signature::new(BigUint::from(1u32), BigUint::from(2u32));
        assert_eq!(hex::encode(sig.der()), "3006020101020102");
    }

    #[test]
    fn test_der_high_bit_padding() {
        let sig = Signature::new(
            hex_int("37206a0610995c58074999cb9767b87af4c4978db68c06e8e6e81d282047a7c6"),
            hex_int("8ca63759c1157ebeaec0d03cecca119fc9a75bf8e6d0fa65c841c8e2738cdaec"),
        );
        assert_eq!(
            hex::encode(sig.der()),
            "3045022037206a0610995c58074999cb9767b87af4c4978db68c06e8e6e81d282047a7c6\
             0221008ca63759c1157ebeaec0d03cecca119fc9a75bf8e6d0fa65c841c8e2738cdaec"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let sig = Signature::new(
            hex_int("ed81ff192e75a3fd2304004dcadb746fa5e24c5031ccfcf21320b0277457c98f"),
            hex_int("7a986d955c6e0cb35d446a89d3f56100f4d7f67801c31967743a9c8e10615bed"),
        );
        assert_eq!(Signature::parse(&sig.der()).unwrap(), sig);
    }

    #[test]
    fn test_parse_accepts_non_minimal_integers() {
        // r encoded with a redundant leading zero byte
        let der = hex::decode("300702020001020102").unwrap();
        let sig = Signature::parse(&der).unwrap();
        assert_eq!(sig.r(), &BigUint::from(1u32));
        assert_eq!(sig.s(), &BigUint::from(2u32));
    }

    #[test]
    fn test_parse_bad_sequence_marker() {
        let der = hex::decode("3106020101020102").unwrap();
        assert!(matches!(Signature::parse(&der), Err(PrimitiveError::SignatureFormat(_))));
    }

    #[test]
    fn test_parse_bad_length() {
        let der = hex::decode("3007020101020102").unwrap();
        assert!(matches!(Signature::parse(&der), Err(PrimitiveError::SignatureFormat(_))));
    }

    #[test]
    fn test_parse_bad_integer_markers() {
        for bad in ["3006030101020102", "3006020101030102"] {
            let der = hex::decode(bad).unwrap();
            assert!(matches!(Signature::parse(&der), Err(PrimitiveError::SignatureFormat(_))));
        }
    }

    #[test]
    fn test_parse_inconsistent_integer_lengths() {
        // r claims two bytes, leaving the s length pointing past the end
        let der = hex::decode("3006020201020102").unwrap();
        assert!(matches!(Signature::parse(&der), Err(PrimitiveError::SignatureFormat(_))));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Signature::parse(&[]), Err(PrimitiveError::SignatureFormat(_))));
    }

    #[test]
    fn test_display() {
        let sig = Signature::new(BigUint::from(255u32), BigUint::from(16u32));
        assert_eq!(sig.to_string(), "Signature(ff,10)");
    }
}
