//! Node-local ante settings.

use shared_types::{Coins, Decimal, TypesError};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Minimum price per unit of gas a validator accepts into its mempool.
///
/// Parsed from `"0.025ubld,1uatom"`. A fee satisfies the prices when it pays
/// `ceil(price * gas_limit)` in at least one of the listed denoms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinGasPrices(BTreeMap<String, Decimal>);

impl MinGasPrices {
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Decimal::is_zero)
    }

    /// The fee required for `gas_limit` in each denom.
    pub fn required_fees(&self, gas_limit: u64) -> Coins {
        let mut fees = Coins::new();
        for (denom, price) in &self.0 {
            let amount = price.mul_int_ceil(u128::from(gas_limit));
            if amount > 0 {
                if let Ok(sum) = fees.checked_add(&Coins::single(denom, amount)) {
                    fees = sum;
                }
            }
        }
        fees
    }
}

impl FromStr for MinGasPrices {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut prices = BTreeMap::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let split = entry
                .find(|c: char| c.is_ascii_alphabetic())
                .ok_or_else(|| TypesError::InvalidCoins(format!("gas price {entry} has no denom")))?;
            let (amount, denom) = entry.split_at(split);
            let price: Decimal = amount.parse()?;
            if prices.insert(denom.to_string(), price).is_some() {
                return Err(TypesError::InvalidCoins(format!("duplicate gas price denom {denom}")));
            }
        }
        Ok(Self(prices))
    }
}

impl fmt::Display for MinGasPrices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(d, p)| format!("{p}{d}")).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_required_fees() {
        let prices: MinGasPrices = "0.025ubld, 1uatom".parse().unwrap();
        let fees = prices.required_fees(100_001);
        assert_eq!(fees.amount_of("ubld"), 2_501);
        assert_eq!(fees.amount_of("uatom"), 100_001);
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!("".parse::<MinGasPrices>().unwrap().is_empty());
        assert!("0ubld".parse::<MinGasPrices>().unwrap().is_empty());
        assert!("0.5".parse::<MinGasPrices>().is_err());
        assert!("1ubld,2ubld".parse::<MinGasPrices>().is_err());
    }
}
