//! The secp256k1 instantiation of the field and curve types
//!
//! The curve is `y^2 = x^3 + 7` over `F_P`. Its constants are built once per
//! process and are read-only afterwards.

use num_bigint::BigUint;
use std::sync::LazyLock;

use crate::constants::*;
use crate::curve::CurvePoint;
use crate::error::Result;
use crate::field::FieldElement;

/// Process-wide secp256k1 parameters
pub static SECP256K1: LazyLock<Secp256k1> = LazyLock::new(Secp256k1::new);

/// Fixed curve parameters: prime, coefficients, generator and its order
#[derive(Debug, Clone)]
pub struct Secp256k1 {
    p: BigUint,
    a: FieldElement,
    b: FieldElement,
    g: CurvePoint,
    n: BigUint,
}

impl Secp256k1 {
    fn new() -> Self {
        let p = BigUint::from_bytes_be(&SECP256K1_P);
        let a = FieldElement::reduced(BigUint::from(SECP256K1_A), &p);
        let b = FieldElement::reduced(BigUint::from(SECP256K1_B), &p);
        let gx = FieldElement::reduced(BigUint::from_bytes_be(&SECP256K1_GX), &p);
        let gy = FieldElement::reduced(BigUint::from_bytes_be(&SECP256K1_GY), &p);
        let g = CurvePoint::new_unchecked(gx, gy, a.clone(), b.clone());
        let n = BigUint::from_bytes_be(&SECP256K1_N);
        Self { p, a, b, g, n }
    }

    /// Field prime P
    pub fn prime(&self) -> &BigUint {
        &self.p
    }

    /// Group order N
    pub fn order(&self) -> &BigUint {
        &self.n
    }

    /// Generator G
    pub fn generator(&self) -> &CurvePoint {
        &self.g
    }

    /// Element of the base field
    pub fn field(&self, num: impl Into<BigUint>) -> Result<FieldElement> {
        FieldElement::new(num, self.p.clone())
    }

    /// Point on the curve, checked against the curve equation
    pub fn point(&self, x: impl Into<BigUint>, y: impl Into<BigUint>) -> Result<CurvePoint> {
        CurvePoint::new(self.field(x)?, self.field(y)?, self.a.clone(), self.b.clone())
    }

    pub fn infinity(&self) -> CurvePoint {
        CurvePoint::infinity(self.a.clone(), self.b.clone())
    }

    /// `k * point` with the scalar reduced modulo N first
    pub fn multiply(&self, point: &CurvePoint, k: &BigUint) -> Result<CurvePoint> {
        point.scalar_mul(&(k % &self.n))
    }

    /// `k * G`
    pub fn mul_generator(&self, k: &BigUint) -> Result<CurvePoint> {
        self.multiply(&self.g, k)
    }

    /// `k^-1 mod N` by Fermat's little theorem
    pub fn inverse_mod_n(&self, k: &BigUint) -> BigUint {
        k.modpow(&(&self.n - BigUint::from(2u32)), &self.n)
    }
}
