//! Elliptic-curve group over a prime field
//!
//! Points live on `y^2 = x^3 + a*x + b`. The curve is identified by its
//! coefficients, which every point carries, so combining points from two
//! different curves is caught at run time instead of being silently accepted.

use num_bigint::BigUint;
use std::fmt;

use crate::error::{PrimitiveError, Result};
use crate::field::FieldElement;

/// A point on a short Weierstrass curve, or the point at infinity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurvePoint {
    coords: Option<(FieldElement, FieldElement)>,
    a: FieldElement,
    b: FieldElement,
}

impl CurvePoint {
    /// Create a point, checking that it satisfies the curve equation
    pub fn new(x: FieldElement, y: FieldElement, a: FieldElement, b: FieldElement) -> Result<Self> {
        let lhs = y.mul(&y)?;
        let rhs = x.mul(&x)?.mul(&x)?.add(&a.mul(&x)?)?.add(&b)?;
        if lhs != rhs {
            return Err(PrimitiveError::PointNotOnCurve {
                x: x.num().to_string(),
                y: y.num().to_string(),
            });
        }
        Ok(Self::new_unchecked(x, y, a, b))
    }

    /// Create a point whose coordinates are already known to be on the curve
    pub(crate) fn new_unchecked(
        x: FieldElement,
        y: FieldElement,
        a: FieldElement,
        b: FieldElement,
    ) -> Self {
        Self {
            coords: Some((x, y)),
            a,
            b,
        }
    }

    /// The identity element of the curve `(a, b)`
    pub fn infinity(a: FieldElement, b: FieldElement) -> Self {
        Self { coords: None, a, b }
    }

    pub fn is_infinity(&self) -> bool {
        self.coords.is_none()
    }

    pub fn x(&self) -> Option<&FieldElement> {
        self.coords.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&FieldElement> {
        self.coords.as_ref().map(|(_, y)| y)
    }

    pub fn a(&self) -> &FieldElement {
        &self.a
    }

    pub fn b(&self) -> &FieldElement {
        &self.b
    }

    /// Same x, negated y
    pub fn negate(&self) -> Self {
        match &self.coords {
            None => self.clone(),
            Some((x, y)) => Self::new_unchecked(x.clone(), y.neg(), self.a.clone(), self.b.clone()),
        }
    }

    /// Group law
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.a != other.a || self.b != other.b {
            return Err(PrimitiveError::CurveMismatch(format!("{} and {}", self, other)));
        }

        let ((x1, y1), (x2, y2)) = match (&self.coords, &other.coords) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(p1), Some(p2)) => (p1, p2),
        };

        if x1 == x2 {
            // vertical line: P + (-P), or a tangent at y = 0
            if y1 != y2 || y1.is_zero() {
                return Ok(self.identity());
            }
            return self.double();
        }

        // s = (y2 - y1) / (x2 - x1)
        let s = y2.sub(y1)?.div(&x2.sub(x1)?)?;
        // x3 = s^2 - x1 - x2
        let x3 = s.mul(&s)?.sub(x1)?.sub(x2)?;
        // y3 = s(x1 - x3) - y1
        let y3 = s.mul(&x1.sub(&x3)?)?.sub(y1)?;
        Ok(Self::new_unchecked(x3, y3, self.a.clone(), self.b.clone()))
    }

    /// Tangent-line doubling
    pub fn double(&self) -> Result<Self> {
        let (x1, y1) = match &self.coords {
            None => return Ok(self.clone()),
            Some((_, y)) if y.is_zero() => return Ok(self.identity()),
            Some(coords) => coords,
        };

        // s = (3x^2 + a) / 2y
        let s = x1.mul(x1)?.scale(3u32).add(&self.a)?.div(&y1.scale(2u32))?;
        // x3 = s^2 - 2x
        let x3 = s.mul(&s)?.sub(&x1.scale(2u32))?;
        // y3 = s(x1 - x3) - y1
        let y3 = s.mul(&x1.sub(&x3)?)?.sub(y1)?;
        Ok(Self::new_unchecked(x3, y3, self.a.clone(), self.b.clone()))
    }

    /// `coefficient * self` by binary double-and-add
    pub fn scalar_mul(&self, coefficient: &BigUint) -> Result<Self> {
        let mut result = self.identity();
        let mut current = self.clone();
        for i in 0..coefficient.bits() {
            if coefficient.bit(i) {
                result = result.add(&current)?;
            }
            current = current.double()?;
        }
        Ok(result)
    }

    fn identity(&self) -> Self {
        Self::infinity(self.a.clone(), self.b.clone())
    }
}

impl fmt::Display for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coords {
            None => write!(f, "Point(infinity)"),
            Some((x, y)) => write!(
                f,
                "Point({}, {})_{}_{} FieldElement({})",
                x.num(),
                y.num(),
                self.a.num(),
                self.b.num(),
                x.prime()
            ),
        }
    }
}
