//! Prime-field arithmetic
//!
//! A [`FieldElement`] carries its modulus by value, so one type serves both the
//! small fields used in tests and the secp256k1 base field. Every operation
//! returns a fresh element and leaves its operands untouched.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use std::fmt;

use crate::error::{PrimitiveError, Result};

/// An element `num` of the field of integers modulo `prime`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    /// Create an element, failing unless `0 <= num < prime`
    pub fn new(num: impl Into<BigUint>, prime: impl Into<BigUint>) -> Result<Self> {
        let num = num.into();
        let prime = prime.into();
        if prime < BigUint::from(2u32) {
            return Err(PrimitiveError::InvalidFieldOperation(format!(
                "modulus {} is not a prime",
                prime
            )));
        }
        if num >= prime {
            return Err(PrimitiveError::FieldRange {
                num: num.to_string(),
                prime: prime.to_string(),
            });
        }
        Ok(Self { num, prime })
    }

    /// Reduce an arbitrary integer into the field
    pub(crate) fn reduced(num: BigUint, prime: &BigUint) -> Self {
        Self {
            num: num % prime,
            prime: prime.clone(),
        }
    }

    pub fn num(&self) -> &BigUint {
        &self.num
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other, "add")?;
        Ok(Self::reduced(&self.num + &other.num, &self.prime))
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other, "subtract")?;
        Ok(Self::reduced(&self.num + &self.prime - &other.num, &self.prime))
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other, "multiply")?;
        Ok(Self::reduced(&self.num * &other.num, &self.prime))
    }

    /// Multiply by a plain integer
    pub fn scale(&self, coefficient: impl Into<BigUint>) -> Self {
        Self::reduced(&self.num * coefficient.into(), &self.prime)
    }

    /// Additive inverse
    pub fn neg(&self) -> Self {
        Self::reduced(&self.prime - &self.num, &self.prime)
    }

    /// Raise to `exponent`, taken modulo `prime - 1` so negative exponents work
    pub fn pow(&self, exponent: impl Into<BigInt>) -> Self {
        let order = BigInt::from(&self.prime - BigUint::one());
        let (_, exponent) = exponent.into().mod_floor(&order).into_parts();
        Self {
            num: self.num.modpow(&exponent, &self.prime),
            prime: self.prime.clone(),
        }
    }

    /// `self * other^(prime - 2)`
    pub fn div(&self, other: &Self) -> Result<Self> {
        self.check_same_field(other, "divide")?;
        if other.is_zero() {
            return Err(PrimitiveError::InvalidFieldOperation(
                "division by zero".to_string(),
            ));
        }
        let exponent = &self.prime - BigUint::from(2u32);
        let inverse = other.num.modpow(&exponent, &self.prime);
        Ok(Self::reduced(&self.num * inverse, &self.prime))
    }

    fn check_same_field(&self, other: &Self, action: &str) -> Result<()> {
        if self.prime != other.prime {
            return Err(PrimitiveError::InvalidFieldOperation(format!(
                "cannot {} elements of F_{} and F_{}",
                action, self.prime, other.prime
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(num: u32, prime: u32) -> FieldElement {
        FieldElement::new(num, prime).unwrap()
    }

    #[test]
    fn test_new_out_of_range() {
        assert!(matches!(
            FieldElement::new(13u32, 13u32),
            Err(PrimitiveError::FieldRange { .. })
        ));
        assert!(FieldElement::new(12u32, 13u32).is_ok());
    }

    #[test]
    fn test_new_rejects_tiny_modulus() {
        assert!(matches!(
            FieldElement::new(0u32, 1u32),
            Err(PrimitiveError::InvalidFieldOperation(_))
        ));
    }

    #[test]
    fn test_equality() {
        assert_eq!(fe(7, 13), fe(7, 13));
        assert_ne!(fe(7, 13), fe(6, 13));
        assert_ne!(fe(7, 13), fe(7, 17));
    }

    #[test]
    fn test_add_sub() {
        assert_eq!(fe(7, 13).add(&fe(12, 13)).unwrap(), fe(6, 13));
        assert_eq!(fe(6, 13).sub(&fe(12, 13)).unwrap(), fe(7, 13));
        assert_eq!(fe(44, 57).add(&fe(33, 57)).unwrap(), fe(20, 57));
        assert_eq!(fe(9, 57).sub(&fe(29, 57)).unwrap(), fe(37, 57));
    }

    #[test]
    fn test_mul_and_scale() {
        assert_eq!(fe(3, 13).mul(&fe(12, 13)).unwrap(), fe(10, 13));
        assert_eq!(fe(24, 31).scale(3u32), fe(10, 31));
    }

    #[test]
    fn test_pow() {
        assert_eq!(fe(3, 13).pow(3), fe(1, 13));
        assert_eq!(fe(17, 31).pow(3), fe(15, 31));
        assert_eq!(fe(5, 31).pow(5).mul(&fe(18, 31)).unwrap(), fe(16, 31));
    }

    #[test]
    fn test_pow_negative_exponent() {
        assert_eq!(fe(7, 13).pow(-3), fe(8, 13));
        assert_eq!(fe(17, 31).pow(-3), fe(29, 31));
        assert_eq!(fe(4, 31).pow(-4).mul(&fe(11, 31)).unwrap(), fe(13, 31));
    }

    #[test]
    fn test_div() {
        assert_eq!(fe(2, 19).div(&fe(7, 19)).unwrap(), fe(3, 19));
        assert_eq!(fe(7, 19).div(&fe(5, 19)).unwrap(), fe(9, 19));
        assert_eq!(fe(3, 31).div(&fe(24, 31)).unwrap(), fe(4, 31));
    }

    #[test]
    fn test_div_by_zero() {
        assert!(matches!(
            fe(3, 31).div(&fe(0, 31)),
            Err(PrimitiveError::InvalidFieldOperation(_))
        ));
    }

    #[test]
    fn test_mixed_fields_fail() {
        let a = fe(2, 13);
        let b = fe(2, 17);
        for result in [a.add(&b), a.sub(&b), a.mul(&b), a.div(&b)] {
            assert!(matches!(result, Err(PrimitiveError::InvalidFieldOperation(_))));
        }
    }

    #[test]
    fn test_neg() {
        assert_eq!(fe(5, 13).neg(), fe(8, 13));
        assert_eq!(fe(0, 13).neg(), fe(0, 13));
    }

    #[test]
    fn test_operands_unchanged() {
        let a = fe(7, 13);
        let b = fe(12, 13);
        let _ = a.add(&b).unwrap();
        let _ = a.div(&b).unwrap();
        assert_eq!(a, fe(7, 13));
        assert_eq!(b, fe(12, 13));
    }

    #[test]
    fn test_display() {
        assert_eq!(fe(7, 13).to_string(), "FieldElement_13(7)");
    }
}
