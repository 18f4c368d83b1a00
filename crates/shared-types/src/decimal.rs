//! Fixed-point decimal with 18 fractional digits, used for rates and
//! fractions (inflation, community tax, slash fractions, gas prices).

use crate::errors::TypesError;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const PRECISION: u32 = 18;
const SCALE: u128 = 1_000_000_000_000_000_000;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal(u128);

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);
    pub const ONE: Decimal = Decimal(SCALE);

    pub fn from_int(value: u128) -> Self {
        Self(value.saturating_mul(SCALE))
    }

    /// `num / den`, truncated. A zero denominator yields zero.
    pub fn from_ratio(num: u128, den: u128) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        let value = U256::from(num) * U256::from(SCALE) / U256::from(den);
        Self(clamp(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply an integer by this decimal, truncating toward zero.
    pub fn mul_int(&self, value: u128) -> u128 {
        clamp(U256::from(value) * U256::from(self.0) / U256::from(SCALE))
    }

    /// Multiply an integer by this decimal, rounding up.
    pub fn mul_int_ceil(&self, value: u128) -> u128 {
        let product = U256::from(value) * U256::from(self.0);
        let scale = U256::from(SCALE);
        let mut quotient = product / scale;
        if !(product % scale).is_zero() {
            quotient += U256::one();
        }
        clamp(quotient)
    }

    pub fn mul(&self, other: Decimal) -> Decimal {
        Decimal(clamp(U256::from(self.0) * U256::from(other.0) / U256::from(SCALE)))
    }

    /// `self / other`, truncated. Division by zero yields zero.
    pub fn quo(&self, other: Decimal) -> Decimal {
        Decimal::from_ratio(self.0, other.0)
    }

    pub fn quo_int(&self, value: u128) -> Decimal {
        if value == 0 {
            return Decimal::ZERO;
        }
        Decimal(self.0 / value)
    }

    pub fn checked_sub(&self, other: Decimal) -> Option<Decimal> {
        self.0.checked_sub(other.0).map(Decimal)
    }

    pub fn saturating_add(&self, other: Decimal) -> Decimal {
        Decimal(self.0.saturating_add(other.0))
    }
}

fn clamp(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{int}.0");
        }
        let frac = format!("{:0width$}", frac, width = PRECISION as usize);
        write!(f, "{int}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

impl FromStr for Decimal {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidDecimal(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty()
            || frac_part.len() > PRECISION as usize
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let int: u128 = int_part.parse().map_err(|_| invalid())?;
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = PRECISION as usize);
            padded.parse().map_err(|_| invalid())?
        };
        int.checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac))
            .map(Decimal)
            .ok_or_else(invalid)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quo() {
        let half: Decimal = "0.5".parse().unwrap();
        let quarter: Decimal = "0.25".parse().unwrap();
        assert_eq!(quarter.quo(half), half);
        assert_eq!(Decimal::ONE.quo_int(4), quarter);
        assert_eq!(Decimal::ONE.quo(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_parse_and_display() {
        let d: Decimal = "0.05".parse().unwrap();
        assert_eq!(d.to_string(), "0.05");
        assert_eq!("1".parse::<Decimal>().unwrap(), Decimal::ONE);
        assert_eq!(Decimal::ONE.to_string(), "1.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(".5".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("-1".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_mul_int_truncates_and_ceils() {
        let third = Decimal::from_ratio(1, 3);
        assert_eq!(third.mul_int(10), 3);
        assert_eq!(third.mul_int_ceil(10), 4);
        assert_eq!(Decimal::ONE.mul_int_ceil(7), 7);
    }

    #[test]
    fn test_ordering() {
        let a: Decimal = "0.334".parse().unwrap();
        let b: Decimal = "0.5".parse().unwrap();
        assert!(a < b);
        assert_eq!(b.checked_sub(a).unwrap().to_string(), "0.166");
        assert!(a.checked_sub(b).is_none());
    }
}
