//! Points on a short Weierstrass curve `y^2 = x^3 + a*x + b` over a prime field.

use num_bigint::BigUint;
use crate::error::EccError;
use crate::field::FieldElement;

/// A curve point, or the point at infinity when `xy` is `None`.
///
/// Two points are equal iff coordinates and curve parameters are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    xy: Option<(FieldElement, FieldElement)>,
    a: FieldElement,
    b: FieldElement,
}

impl Point {
    /// Create a finite point, checking the curve equation.
    pub fn new(
        x: FieldElement,
        y: FieldElement,
        a: FieldElement,
        b: FieldElement,
    ) -> Result<Self, EccError> {
        let lhs = y.mul(&y)?;
        let rhs = x.mul(&x)?.mul(&x)?.add(&a.mul(&x)?)?.add(&b)?;
        if lhs != rhs {
            return Err(EccError::NotOnCurve);
        }
        Ok(Point { xy: Some((x, y)), a, b })
    }

    /// The identity element of the curve with parameters `a`, `b`.
    pub fn infinity(a: FieldElement, b: FieldElement) -> Self {
        Point { xy: None, a, b }
    }

    pub fn is_infinity(&self) -> bool {
        self.xy.is_none()
    }

    pub fn x(&self) -> Option<&FieldElement> {
        self.xy.as_ref().map(|(x, _)| x)
    }

    pub fn y(&self) -> Option<&FieldElement> {
        self.xy.as_ref().map(|(_, y)| y)
    }

    pub fn a(&self) -> &FieldElement {
        &self.a
    }

    pub fn b(&self) -> &FieldElement {
        &self.b
    }

    // Result of the group law is on the curve by construction, skip the check.
    fn finite(&self, x: FieldElement, y: FieldElement) -> Self {
        Point {
            xy: Some((x, y)),
            a: self.a.clone(),
            b: self.b.clone(),
        }
    }

    fn identity(&self) -> Self {
        Point::infinity(self.a.clone(), self.b.clone())
    }

    /// Mirror across the x-axis.
    pub fn negate(&self) -> Self {
        match &self.xy {
            None => self.clone(),
            Some((x, y)) => self.finite(x.clone(), y.neg()),
        }
    }

    /// Group law.
    pub fn add(&self, other: &Self) -> Result<Self, EccError> {
        if self.a != other.a || self.b != other.b {
            return Err(EccError::CurveMismatch);
        }

        let ((x1, y1), (x2, y2)) = match (&self.xy, &other.xy) {
            (None, _) => return Ok(other.clone()),
            (_, None) => return Ok(self.clone()),
            (Some(p1), Some(p2)) => (p1, p2),
        };

        // Vertical line: P + (-P), or doubling a point with y == 0
        if x1 == x2 && (y1 != y2 || y1.is_zero()) {
            return Ok(self.identity());
        }

        let slope = if x1 != x2 {
            // Chord through two distinct points
            y2.sub(y1)?.div(&x2.sub(x1)?)?
        } else {
            // Tangent at P
            x1.mul(x1)?.scale(3).add(&self.a)?.div(&y1.scale(2))?
        };

        let x3 = slope.mul(&slope)?.sub(x1)?.sub(x2)?;
        let y3 = slope.mul(&x1.sub(&x3)?)?.sub(y1)?;
        Ok(self.finite(x3, y3))
    }

    /// `k * self` by binary double-and-add.
    pub fn scalar_mul(&self, k: &BigUint) -> Result<Self, EccError> {
        let mut result = self.identity();
        let mut current = self.clone();
        let bits = k.bits();
        for i in 0..bits {
            if k.bit(i) {
                result = result.add(&current)?;
            }
            // The last doubling is never used.
            if i + 1 < bits {
                current = current.add(&current)?;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIME: u64 = 223;

    fn fe(n: u64) -> FieldElement {
        FieldElement::from_u64(n, PRIME).unwrap()
    }

    fn point(x: u64, y: u64) -> Point {
        Point::new(fe(x), fe(y), fe(0), fe(7)).unwrap()
    }

    fn inf() -> Point {
        Point::infinity(fe(0), fe(7))
    }

    #[test]
    fn test_on_curve() {
        for (x, y) in [(192, 105), (17, 56), (1, 193)] {
            assert!(Point::new(fe(x), fe(y), fe(0), fe(7)).is_ok());
        }
        for (x, y) in [(200, 119), (42, 99)] {
            assert_eq!(
                Point::new(fe(x), fe(y), fe(0), fe(7)),
                Err(EccError::NotOnCurve)
            );
        }
    }

    #[test]
    fn test_add_identity() {
        let p = point(192, 105);
        assert_eq!(p.add(&inf()).unwrap(), p);
        assert_eq!(inf().add(&p).unwrap(), p);
        assert_eq!(inf().add(&inf()).unwrap(), inf());
    }

    #[test]
    fn test_add_mirrored() {
        let p = point(192, 105);
        assert_eq!(p.add(&p.negate()).unwrap(), inf());
    }

    #[test]
    fn test_add() {
        let values = [
            (170, 142, 60, 139, 220, 181),
            (47, 71, 17, 56, 215, 68),
            (143, 98, 76, 66, 47, 71),
        ];
        for (x1, y1, x2, y2, x3, y3) in values {
            let p1 = point(x1, y1);
            let p2 = point(x2, y2);
            assert_eq!(p1.add(&p2).unwrap(), point(x3, y3));
            // commutative
            assert_eq!(p2.add(&p1).unwrap(), point(x3, y3));
        }
    }

    #[test]
    fn test_doubling_matches_scalar_mul() {
        let p = point(47, 71);
        assert_eq!(p.add(&p).unwrap(), p.scalar_mul(&BigUint::from(2u8)).unwrap());
        assert_eq!(p.add(&p).unwrap(), point(36, 111));
    }

    #[test]
    fn test_scalar_mul_order() {
        // (15, 86) generates a subgroup of order 7 on this curve
        let p = point(15, 86);
        assert_eq!(p.scalar_mul(&BigUint::from(7u8)).unwrap(), inf());
        assert_eq!(p.scalar_mul(&BigUint::from(0u8)).unwrap(), inf());
        assert_eq!(p.scalar_mul(&BigUint::from(8u8)).unwrap(), p);
    }

    #[test]
    fn test_curve_mismatch() {
        let p = point(192, 105);
        let other = Point::infinity(fe(5), fe(7));
        assert_eq!(p.add(&other), Err(EccError::CurveMismatch));
    }
}
