//! # Coins
//!
//! Multi-denomination token amounts.
//!
//! `Coins` keeps denominations sorted and never stores zero amounts, so two
//! `Coins` values are equal exactly when they represent the same amounts.
//! Amounts are serialized as decimal strings because JSON numbers cannot carry
//! a full `u128`.

use crate::decimal::Decimal;
use crate::errors::TypesError;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single denomination amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TypesError::InvalidCoins(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() || !valid_denom(denom) {
            return Err(TypesError::InvalidCoins(s.to_string()));
        }
        let amount = amount
            .parse()
            .map_err(|_| TypesError::InvalidCoins(s.to_string()))?;
        Ok(Self::new(denom, amount))
    }
}

/// Denominations are lowercase alphanumerics plus `/`, starting with a letter.
pub fn valid_denom(denom: &str) -> bool {
    let mut chars = denom.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && denom.len() <= 128
        && denom
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '/' || c == '-')
}

/// A set of coins, at most one entry per denomination, no zero entries.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_coin(coin: Coin) -> Self {
        let mut coins = Self::new();
        if coin.amount > 0 {
            coins.0.insert(coin.denom, coin.amount);
        }
        coins
    }

    pub fn single(denom: &str, amount: u128) -> Self {
        Self::from_coin(Coin::new(denom, amount))
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0.iter().map(|(d, a)| Coin::new(d.clone(), *a))
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, TypesError> {
        let mut out = self.clone();
        for (denom, amount) in &other.0 {
            let entry = out.0.entry(denom.clone()).or_insert(0);
            *entry = entry
                .checked_add(*amount)
                .ok_or_else(|| TypesError::Overflow(denom.clone()))?;
        }
        Ok(out)
    }

    /// Subtract `other`, failing if any denomination would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Result<Coins, TypesError> {
        let mut out = self.clone();
        for (denom, amount) in &other.0 {
            let have = out.amount_of(denom);
            if have < *amount {
                return Err(TypesError::InsufficientCoins {
                    have: self.to_string(),
                    need: other.to_string(),
                });
            }
            if have == *amount {
                out.0.remove(denom);
            } else {
                out.0.insert(denom.clone(), have - amount);
            }
        }
        Ok(out)
    }

    /// True when every denomination of `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.0.iter().all(|(d, a)| self.amount_of(d) >= *a)
    }

    /// True when at least one denomination of `other` is covered by `self`.
    pub fn is_any_gte(&self, other: &Coins) -> bool {
        other.0.iter().any(|(d, a)| self.amount_of(d) >= *a)
    }

    /// Scale every amount by `dec`, truncating.
    pub fn mul_dec(&self, dec: Decimal) -> Coins {
        self.0
            .iter()
            .map(|(denom, amount)| Coin::new(denom.clone(), dec.mul_int(*amount)))
            .collect()
    }

    /// Scale every amount by `num / den`, truncating.
    pub fn mul_ratio(&self, num: u128, den: u128) -> Coins {
        if den == 0 {
            return Coins::new();
        }
        let mut out = Coins::new();
        for (denom, amount) in &self.0 {
            let scaled = U256::from(*amount) * U256::from(num) / U256::from(den);
            let scaled = if scaled > U256::from(u128::MAX) {
                u128::MAX
            } else {
                scaled.as_u128()
            };
            if scaled > 0 {
                out.0.insert(denom.clone(), scaled);
            }
        }
        out
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl fmt::Debug for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coins({})", self)
    }
}

impl FromStr for Coins {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut coins = Coins::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let coin: Coin = part.parse()?;
            if coins.0.contains_key(&coin.denom) {
                return Err(TypesError::InvalidCoins(format!("duplicate denom in {s}")));
            }
            coins = coins.checked_add(&Coins::from_coin(coin))?;
        }
        Ok(coins)
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        let mut coins = Coins::new();
        for coin in iter {
            if coin.amount == 0 {
                continue;
            }
            let entry = coins.0.entry(coin.denom).or_insert(0);
            *entry = entry.saturating_add(coin.amount);
        }
        coins
    }
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let list: Vec<Coin> = self.iter().collect();
        list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Coin>::deserialize(deserializer)?;
        if let Some(bad) = list.iter().find(|c| !valid_denom(&c.denom)) {
            return Err(serde::de::Error::custom(format!("invalid denom {}", bad.denom)));
        }
        Ok(list.into_iter().collect())
    }
}

/// Serde helper: `u128` as a decimal string.
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coins() {
        let coins: Coins = "100ubld, 5uist".parse().unwrap();
        assert_eq!(coins.amount_of("ubld"), 100);
        assert_eq!(coins.amount_of("uist"), 5);
        assert_eq!(coins.to_string(), "100ubld,5uist");
    }

    #[test]
    fn test_parse_rejects_duplicates_and_garbage() {
        assert!("1ubld,2ubld".parse::<Coins>().is_err());
        assert!("ubld".parse::<Coins>().is_err());
        assert!("10UBLD".parse::<Coins>().is_err());
    }

    #[test]
    fn test_sub_removes_zero_entries() {
        let a = Coins::single("ubld", 10);
        let b = Coins::single("ubld", 10);
        let diff = a.checked_sub(&b).unwrap();
        assert!(diff.is_zero());
        assert_eq!(diff, Coins::new());
    }

    #[test]
    fn test_sub_underflow_fails() {
        let a = Coins::single("ubld", 5);
        let b = Coins::single("ubld", 6);
        assert!(matches!(
            a.checked_sub(&b),
            Err(TypesError::InsufficientCoins { .. })
        ));
    }

    #[test]
    fn test_mul_ratio_truncates() {
        let coins = Coins::single("ubld", 10);
        assert_eq!(coins.mul_ratio(1, 3).amount_of("ubld"), 3);
        assert!(coins.mul_ratio(0, 3).is_zero());
    }

    #[test]
    fn test_any_and_all_gte() {
        let have: Coins = "10ubld,1uist".parse().unwrap();
        let need: Coins = "5ubld,2uist".parse().unwrap();
        assert!(!have.is_all_gte(&need));
        assert!(have.is_any_gte(&need));
    }

    #[test]
    fn test_json_shape_uses_string_amounts() {
        let coins = Coins::single("ubld", 42);
        let json = serde_json::to_string(&coins).unwrap();
        assert_eq!(json, r#"[{"denom":"ubld","amount":"42"}]"#);
    }
}
