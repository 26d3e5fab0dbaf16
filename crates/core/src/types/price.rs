//! Whole-unit price in New Taiwan dollars.
//!
//! The catalog only carries integer amounts, so the price serializes as a
//! bare integer (`890`) and formats for display with thousands separators
//! (`NT$ 1,890`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// A price in whole New Taiwan dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Currency prefix used for display.
    pub const SYMBOL: &'static str = "NT$";

    /// Create a new price from a whole-unit amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Format the amount with `,` thousands separators, without the symbol.
    #[must_use]
    pub fn grouped(&self) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
        if self.0 < 0 {
            out.push('-');
        }
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Self::SYMBOL, self.grouped())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display_groups_thousands() {
        assert_eq!(Price::new(890).to_string(), "NT$ 890");
        assert_eq!(Price::new(1890).to_string(), "NT$ 1,890");
        assert_eq!(Price::new(1_234_567).to_string(), "NT$ 1,234,567");
        assert_eq!(Price::new(0).to_string(), "NT$ 0");
    }

    #[test]
    fn test_price_negative_grouping() {
        assert_eq!(Price::new(-2490).grouped(), "-2,490");
    }

    #[test]
    fn test_price_serializes_as_integer() {
        let json = serde_json::to_string(&Price::new(1290)).expect("serialize");
        assert_eq!(json, "1290");
    }
}
