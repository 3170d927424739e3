//! Prime-field arithmetic over an arbitrary modulus.
//!
//! Elements are immutable values; every operation returns a new element in
//! the same field. Combining elements of different fields is an error.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use crate::error::EccError;

/// An integer modulo a prime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    /// Create an element; fails unless `0 <= num < prime`.
    pub fn new(num: BigUint, prime: BigUint) -> Result<Self, EccError> {
        if num >= prime {
            return Err(EccError::OutOfRange);
        }
        Ok(FieldElement { num, prime })
    }

    /// Convenience constructor for small fields.
    pub fn from_u64(num: u64, prime: u64) -> Result<Self, EccError> {
        Self::new(BigUint::from(num), BigUint::from(prime))
    }

    /// Build an element by reducing any integer into the field.
    pub fn reduce(num: &BigUint, prime: &BigUint) -> Self {
        FieldElement {
            num: num % prime,
            prime: prime.clone(),
        }
    }

    /// The representative in `[0, prime)`.
    pub fn num(&self) -> &BigUint {
        &self.num
    }

    /// The field modulus.
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    /// Whether the representative is even; used to pick SEC parity.
    pub fn is_even(&self) -> bool {
        !self.num.bit(0)
    }

    fn check_same_field(&self, other: &Self) -> Result<(), EccError> {
        if self.prime != other.prime {
            return Err(EccError::FieldMismatch);
        }
        Ok(())
    }

    fn with_num(&self, num: BigUint) -> Self {
        FieldElement {
            num,
            prime: self.prime.clone(),
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self, EccError> {
        self.check_same_field(other)?;
        Ok(self.with_num((&self.num + &other.num) % &self.prime))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, EccError> {
        self.check_same_field(other)?;
        // Add the modulus first so the subtraction cannot underflow.
        Ok(self.with_num((&self.num + &self.prime - &other.num) % &self.prime))
    }

    pub fn mul(&self, other: &Self) -> Result<Self, EccError> {
        self.check_same_field(other)?;
        Ok(self.with_num((&self.num * &other.num) % &self.prime))
    }

    /// Multiply by a plain integer coefficient.
    pub fn scale(&self, coefficient: u64) -> Self {
        self.with_num((&self.num * BigUint::from(coefficient)) % &self.prime)
    }

    /// Additive inverse.
    pub fn neg(&self) -> Self {
        if self.is_zero() {
            self.clone()
        } else {
            self.with_num(&self.prime - &self.num)
        }
    }

    /// Multiplicative inverse via Fermat's little theorem: `a^(p-2)`.
    pub fn inverse(&self) -> Result<Self, EccError> {
        if self.is_zero() {
            return Err(EccError::DivisionByZero);
        }
        let exponent = &self.prime - BigUint::from(2u8);
        Ok(self.with_num(self.num.modpow(&exponent, &self.prime)))
    }

    /// `self / other`, i.e. `self * other^(p-2)`.
    pub fn div(&self, other: &Self) -> Result<Self, EccError> {
        self.check_same_field(other)?;
        self.mul(&other.inverse()?)
    }

    /// Raise to an integer power.
    ///
    /// The exponent is reduced mod `p - 1` first, so negative exponents work
    /// for nonzero elements. Zero to a negative power is rejected.
    pub fn pow(&self, exponent: &BigInt) -> Result<Self, EccError> {
        if self.is_zero() {
            return match exponent.sign() {
                Sign::Minus => Err(EccError::DivisionByZero),
                Sign::NoSign => Ok(self.with_num(BigUint::one() % &self.prime)),
                Sign::Plus => Ok(self.clone()),
            };
        }
        let order = BigInt::from(&self.prime - BigUint::one());
        let reduced = ((exponent % &order) + &order) % &order;
        // `reduced` is in [0, p-1) so the conversion cannot fail.
        let reduced = reduced.to_biguint().unwrap_or_default();
        Ok(self.with_num(self.num.modpow(&reduced, &self.prime)))
    }

    /// Raise to a non-negative power without reducing the exponent.
    pub fn pow_u(&self, exponent: &BigUint) -> Self {
        self.with_num(self.num.modpow(exponent, &self.prime))
    }
}

impl core::fmt::Display for FieldElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fe(num: u64, prime: u64) -> FieldElement {
        FieldElement::from_u64(num, prime).unwrap()
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(FieldElement::from_u64(137, 137), Err(EccError::OutOfRange));
        assert!(FieldElement::from_u64(136, 137).is_ok());
    }

    #[test]
    fn test_eq() {
        assert_eq!(fe(61, 137), fe(61, 137));
        assert_ne!(fe(61, 137), fe(37, 137));
    }

    #[test]
    fn test_add() {
        assert_eq!(fe(42, 137).add(&fe(135, 137)).unwrap(), fe(40, 137));
    }

    #[test]
    fn test_sub() {
        assert_eq!(fe(1, 137).sub(&fe(42, 137)).unwrap(), fe(96, 137));
    }

    #[test]
    fn test_mul() {
        assert_eq!(fe(2, 7).mul(&fe(5, 7)).unwrap(), fe(3, 7));
    }

    #[test]
    fn test_div() {
        assert_eq!(fe(2, 19).div(&fe(7, 19)).unwrap(), fe(3, 19));
        assert_eq!(fe(2, 19).div(&fe(0, 19)), Err(EccError::DivisionByZero));
    }

    #[test]
    fn test_pow() {
        assert_eq!(fe(3, 13).pow(&BigInt::from(3)).unwrap(), fe(1, 13));
        // 7^-3 mod 13 == 8
        assert_eq!(fe(7, 13).pow(&BigInt::from(-3)).unwrap(), fe(8, 13));
        assert_eq!(fe(0, 13).pow(&BigInt::from(-1)), Err(EccError::DivisionByZero));
        assert_eq!(fe(0, 13).pow(&BigInt::from(12)).unwrap(), fe(0, 13));
        assert_eq!(fe(0, 13).pow(&BigInt::from(0)).unwrap(), fe(1, 13));
    }

    #[test]
    fn test_field_mismatch() {
        assert_eq!(fe(1, 7).add(&fe(1, 11)), Err(EccError::FieldMismatch));
        assert_eq!(fe(1, 7).sub(&fe(1, 11)), Err(EccError::FieldMismatch));
        assert_eq!(fe(1, 7).mul(&fe(1, 11)), Err(EccError::FieldMismatch));
        assert_eq!(fe(1, 7).div(&fe(1, 11)), Err(EccError::FieldMismatch));
    }

    const PRIME: u64 = 223;

    proptest! {
        #[test]
        fn prop_additive_inverse(a in 0u64..PRIME) {
            let a = fe(a, PRIME);
            prop_assert!(a.add(&a.neg()).unwrap().is_zero());
        }

        #[test]
        fn prop_self_division_is_one(a in 1u64..PRIME) {
            let a = fe(a, PRIME);
            prop_assert_eq!(a.div(&a).unwrap(), fe(1, PRIME));
        }

        #[test]
        fn prop_exponents_add(a in 1u64..PRIME, e1 in -500i64..500, e2 in -500i64..500) {
            let a = fe(a, PRIME);
            let lhs = a.pow(&BigInt::from(e1)).unwrap().mul(&a.pow(&BigInt::from(e2)).unwrap()).unwrap();
            let rhs = a.pow(&BigInt::from(e1 + e2)).unwrap();
            prop_assert_eq!(lhs, rhs);
        }
    }
}
