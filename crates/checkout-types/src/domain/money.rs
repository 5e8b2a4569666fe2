use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Non-negative amount of money held as integer cents.
///
/// Arithmetic is checked: amounts arrive from untrusted payloads, so an
/// overflowing total is reported as `None` instead of wrapping.
///
/// The remote API speaks plain JSON decimals (`999.99`), so serde goes
/// through `f64` and rounds to the nearest cent on the way in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { cents: 0 };

    pub fn from_cents(cents: i64) -> anyhow::Result<Self> {
        if cents < 0 {
            anyhow::bail!("amount must not be negative: {cents} cents");
        }
        Ok(Self { cents })
    }

    pub fn from_decimal(amount: f64) -> anyhow::Result<Self> {
        if !amount.is_finite() {
            anyhow::bail!("amount must be finite");
        }
        let cents = (amount * 100.0).round();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        if cents >= i64::MAX as f64 {
            anyhow::bail!("amount too large: {amount}");
        }
        Self::from_cents(cents as i64)
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn as_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(|cents| Money { cents })
    }

    pub fn checked_mul(self, qty: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(qty))
            .map(|cents| Money { cents })
    }

    /// Sum of `amounts`, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, Money::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Money::from_decimal(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(Money::from_cents(99999).unwrap().to_string(), "999.99");
        assert_eq!(Money::from_cents(500).unwrap().to_string(), "5.00");
        assert_eq!(Money::from_cents(7).unwrap().to_string(), "0.07");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(Money::from_cents(-1).is_err());
        assert!(Money::from_decimal(-0.5).is_err());
        assert!(serde_json::from_str::<Money>("-3.0").is_err());
    }

    #[test]
    fn decimal_wire_format_rounds_to_cents() {
        let m: Money = serde_json::from_str("999.99").unwrap();
        assert_eq!(m.cents(), 99999);
        assert_eq!(serde_json::to_string(&m).unwrap(), "999.99");

        let tiny: Money = serde_json::from_str("0.1").unwrap();
        assert_eq!(tiny.cents(), 10);
    }

    #[test]
    fn arithmetic_sums_line_totals() {
        let unit = Money::from_cents(250).unwrap();
        let total = Money::checked_sum([unit.checked_mul(2).unwrap(), unit]).unwrap();
        assert_eq!(total.cents(), 750);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let huge = Money::from_cents(i64::MAX / 2 + 1).unwrap();
        assert!(huge.checked_mul(2).is_none());
        assert!(huge.checked_add(huge).is_none());
        assert!(Money::checked_sum([huge, huge, Money::ZERO]).is_none());
        assert!(Money::from_decimal(1e30).is_err());
        assert!(serde_json::from_str::<Money>("1e300").is_err());
    }
}
