//! Private and public keys over secp256k1
//!
//! Signing follows ECDSA with an RFC 6979 deterministic nonce, so the same
//! `(secret, z)` pair always yields the same signature and no randomness
//! source is involved. Produced signatures are normalized to low-S.

use hmac::{Hmac, Mac};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use sha2::Sha256;
use std::fmt;

use crate::codec::{h160_to_p2pkh_address, hash160, int_to_bytes32};
use crate::curve::CurvePoint;
use crate::error::{PrimitiveError, Result};
use crate::s256::SECP256K1;
use crate::signature::Signature;
use crate::types::{Hash160, Network};

type HmacSha256 = Hmac<Sha256>;

/// A point `secret * G` used to verify signatures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    point: CurvePoint,
    x: BigUint,
    y: BigUint,
}

impl PublicKey {
    /// Wrap a curve point; the point at infinity is not a valid key
    pub fn from_point(point: CurvePoint) -> Result<Self> {
        let (x, y) = match (point.x(), point.y()) {
            (Some(x), Some(y)) => (x.num().clone(), y.num().clone()),
            _ => {
                return Err(PrimitiveError::InvalidPublicKey(
                    "point at infinity".to_string(),
                ))
            }
        };
        if point.a() != SECP256K1.generator().a() || point.b() != SECP256K1.generator().b() {
            return Err(PrimitiveError::InvalidPublicKey(
                "point is not on secp256k1".to_string(),
            ));
        }
        Ok(Self { point, x, y })
    }

    pub fn point(&self) -> &CurvePoint {
        &self.point
    }

    /// ECDSA verification: accept iff `(u*G + v*P).x == r (mod N)`
    pub fn verify(&self, z: &BigUint, sig: &Signature) -> bool {
        let n = SECP256K1.order();
        if sig.r().is_zero() || sig.r() >= n || sig.s().is_zero() || sig.s() >= n {
            return false;
        }
        let s_inv = SECP256K1.inverse_mod_n(sig.s());
        let u = (z * &s_inv) % n;
        let v = (sig.r() * &s_inv) % n;

        let total = SECP256K1
            .mul_generator(&u)
            .and_then(|ug| ug.add(&SECP256K1.multiply(&self.point, &v)?));
        match total {
            Ok(point) => point.x().is_some_and(|x| &(x.num() % n) == sig.r()),
            Err(_) => false,
        }
    }

    /// SEC encoding: `04 || x || y`, or `02/03 || x` when compressed
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        if compressed {
            let prefix = if self.y.is_even() { 0x02 } else { 0x03 };
            let mut result = vec![prefix];
            result.extend_from_slice(&int_to_bytes32(&self.x));
            result
        } else {
            let mut result = vec![0x04];
            result.extend_from_slice(&int_to_bytes32(&self.x));
            result.extend_from_slice(&int_to_bytes32(&self.y));
            result
        }
    }

    /// Parse a SEC-encoded key, recovering y for the compressed form
    pub fn parse(sec: &[u8]) -> Result<Self> {
        match sec.first() {
            Some(0x04) if sec.len() == 65 => {
                let x = BigUint::from_bytes_be(&sec[1..33]);
                let y = BigUint::from_bytes_be(&sec[33..65]);
                Self::from_point(SECP256K1.point(x, y).map_err(invalid_key)?)
            }
            Some(&prefix @ (0x02 | 0x03)) if sec.len() == 33 => {
                let x = SECP256K1
                    .field(BigUint::from_bytes_be(&sec[1..]))
                    .map_err(invalid_key)?;
                // y^2 = x^3 + 7
                let alpha = x.mul(&x)?.mul(&x)?.add(&SECP256K1.field(7u32)?)?;
                // P % 4 == 3, so sqrt(a) = a^((P + 1) / 4)
                let exponent = (SECP256K1.prime() + BigUint::one()) / BigUint::from(4u32);
                let beta = alpha.pow(BigInt::from(exponent));
                if beta.mul(&beta)? != alpha {
                    return Err(PrimitiveError::InvalidPublicKey(
                        "x is not on the curve".to_string(),
                    ));
                }
                let y = if beta.num().is_even() == (prefix == 0x02) {
                    beta
                } else {
                    beta.neg()
                };
                Self::from_point(
                    SECP256K1
                        .point(x.num().clone(), y.num().clone())
                        .map_err(invalid_key)?,
                )
            }
            _ => Err(PrimitiveError::InvalidPublicKey(format!(
                "unsupported SEC encoding of {} bytes",
                sec.len()
            ))),
        }
    }

    pub fn hash160(&self, compressed: bool) -> Hash160 {
        hash160(&self.sec(compressed))
    }

    /// Base58Check pay-to-pubkey-hash address
    pub fn address(&self, compressed: bool, network: Network) -> String {
        h160_to_p2pkh_address(&self.hash160(compressed), network)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S256Point({:064x}, {:064x})", self.x, self.y)
    }
}

/// A secret scalar in `[1, N-1]` and its public point
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: BigUint,
    public_key: PublicKey,
}

impl PrivateKey {
    /// Derive the public point once, up front
    pub fn new(secret: BigUint) -> Result<Self> {
        if secret.is_zero() || &secret >= SECP256K1.order() {
            return Err(PrimitiveError::InvalidSecret);
        }
        let public_key = PublicKey::from_point(SECP256K1.mul_generator(&secret)?)?;
        Ok(Self { secret, public_key })
    }

    pub fn secret(&self) -> &BigUint {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Zero-padded 64-character hex of the secret
    pub fn hex(&self) -> String {
        format!("{:064x}", self.secret)
    }

    /// Sign the 256-bit message hash `z`
    pub fn sign(&self, z: &BigUint) -> Result<Signature> {
        let n = SECP256K1.order();
        let k = self.deterministic_k(z);
        let r = match SECP256K1.mul_generator(&k)?.x() {
            Some(x) => x.num() % n,
            None => return Err(PrimitiveError::InvalidSecret),
        };
        let k_inv = SECP256K1.inverse_mod_n(&k);
        let mut s = ((z + &r * &self.secret) * k_inv) % n;
        if s > n / 2u32 {
            s = n - s;
        }
        Ok(Signature::new(r, s))
    }

    /// RFC 6979 nonce for `z` under this key
    pub fn deterministic_k(&self, z: &BigUint) -> BigUint {
        let n = SECP256K1.order();
        let z = if z > n { z - n } else { z.clone() };
        let z_bytes = int_to_bytes32(&z);
        let secret_bytes = int_to_bytes32(&self.secret);

        let mut k = [0x00u8; 32];
        let mut v = [0x01u8; 32];
        k = hmac_sha256(&k, &[&v[..], &[0x00], &secret_bytes[..], &z_bytes[..]]);
        v = hmac_sha256(&k, &[&v[..]]);
        k = hmac_sha256(&k, &[&v[..], &[0x01], &secret_bytes[..], &z_bytes[..]]);
        v = hmac_sha256(&k, &[&v[..]]);
        loop {
            v = hmac_sha256(&k, &[&v[..]]);
            let candidate = BigUint::from_bytes_be(&v);
            if !candidate.is_zero() && &candidate < n {
                return candidate;
            }
            k = hmac_sha256(&k, &[&v[..], &[0x00]]);
            v = hmac_sha256(&k, &[&v[..]]);
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

fn invalid_key(err: PrimitiveError) -> PrimitiveError {
    PrimitiveError::InvalidPublicKey(err.to_string())
}

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}
