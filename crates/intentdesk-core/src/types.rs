use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Token amounts, prices and fee fractions use 18-decimal fixed point.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Fixed-point unit (`1.0`).
pub const ONE: Amount = 1_000_000_000_000_000_000;

const ADDRESS_HEX_LEN: usize = 40;

/// Account identifier in `0x` + 40 hex digit form, stored lower case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let trimmed = value.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ProtocolError::InvalidAddress(value.to_string()))?;

        if hex.len() != ADDRESS_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidAddress(value.to_string()));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(ADDRESS_HEX_LEN)))
    }

    /// Deterministic address derived from a small integer; handy for fixtures.
    pub fn from_index(index: u64) -> Self {
        Self(format!("0x{:0>40x}", index))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Serde adapter writing amounts as decimal strings.
///
/// 18-decimal values routinely exceed `u64`, which neither TOML nor buffered
/// (internally tagged) JSON can carry as numbers. Small integers are still
/// accepted on input.
pub mod amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::Amount;

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
            Ok(value as Amount)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
            Amount::try_from(value).map_err(|_| E::custom("amount must not be negative"))
        }

        fn visit_u128<E: de::Error>(self, value: u128) -> Result<Amount, E> {
            Ok(value)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
            value
                .trim()
                .parse::<Amount>()
                .map_err(|err| E::custom(format!("invalid amount '{value}': {err}")))
        }
    }
}

/// `floor(a * b / denominator)` without overflowing the intermediate product
/// whenever the result itself fits in `u128`.
pub fn mul_div(a: Amount, b: Amount, denominator: Amount) -> Option<Amount> {
    if denominator == 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / denominator);
    }

    // a*b/d = (a/d)*b + (a%d)*(b/d) + (a%d)*(b%d)/d
    let (a_whole, a_rem) = (a / denominator, a % denominator);
    let (b_whole, b_rem) = (b / denominator, b % denominator);
    let first = a_whole.checked_mul(b)?;
    let second = a_rem.checked_mul(b_whole)?;
    let third = a_rem.checked_mul(b_rem)? / denominator;
    first.checked_add(second)?.checked_add(third)
}
