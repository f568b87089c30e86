use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a desk participant: a trader submitting interests or the
/// market maker answering them.
///
/// Owner identity is what keeps a participant from being matched against
/// their own book.
///
/// # Examples
///
/// ```
/// use carry_engine::core::trader::TraderId;
///
/// let josh = TraderId::new("josh");
/// assert_eq!(josh.as_str(), "josh");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraderId(String);

impl TraderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for TraderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Desk role. Only the market maker may respond to interests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trader,
    MarketMaker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trader_ordering_and_display() {
        let a = TraderId::new("bushy");
        let b = TraderId::new("dorans");
        assert!(a < b);
        assert_eq!(format!("{}", b), "dorans");
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::MarketMaker).unwrap(), "\"marketmaker\"");
    }
}
