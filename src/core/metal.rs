use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base metals traded as carries on the LME.
///
/// Each metal has a fixed contract size. Every valuation in the engine is
/// scaled by [`Metal::tons_per_lot`], so this table is part of the wire
/// contract with the rest of the desk.
///
/// # Examples
///
/// ```
/// use carry_engine::core::metal::Metal;
///
/// let ni: Metal = "NI".parse().unwrap();
/// assert_eq!(ni, Metal::Nickel);
/// assert_eq!(ni.tons_per_lot(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metal {
    #[serde(alias = "AH")]
    Aluminum,
    #[serde(alias = "CA")]
    Copper,
    #[serde(alias = "PB")]
    Lead,
    #[serde(alias = "ZS")]
    Zinc,
    #[serde(alias = "NI")]
    Nickel,
    #[serde(alias = "SN")]
    Tin,
}

impl Metal {
    pub const ALL: [Metal; 6] = [
        Metal::Aluminum,
        Metal::Copper,
        Metal::Lead,
        Metal::Zinc,
        Metal::Nickel,
        Metal::Tin,
    ];

    /// Metric tons per lot.
    pub fn tons_per_lot(self) -> i64 {
        match self {
            Metal::Aluminum | Metal::Copper | Metal::Lead | Metal::Zinc => 25,
            Metal::Nickel => 6,
            Metal::Tin => 5,
        }
    }

    /// Two-letter LME contract code.
    pub fn lme_code(self) -> &'static str {
        match self {
            Metal::Aluminum => "AH",
            Metal::Copper => "CA",
            Metal::Lead => "PB",
            Metal::Zinc => "ZS",
            Metal::Nickel => "NI",
            Metal::Tin => "SN",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metal::Aluminum => "Aluminum",
            Metal::Copper => "Copper",
            Metal::Lead => "Lead",
            Metal::Zinc => "Zinc",
            Metal::Nickel => "Nickel",
            Metal::Tin => "Tin",
        }
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown metal '{0}'")]
pub struct UnknownMetal(pub String);

impl FromStr for Metal {
    type Err = UnknownMetal;

    /// Accepts full names (case-insensitive) or LME codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Metal::ALL
            .into_iter()
            .find(|m| {
                m.name().eq_ignore_ascii_case(needle) || m.lme_code().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownMetal(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tons_per_lot_table() {
        assert_eq!(Metal::Aluminum.tons_per_lot(), 25);
        assert_eq!(Metal::Copper.tons_per_lot(), 25);
        assert_eq!(Metal::Lead.tons_per_lot(), 25);
        assert_eq!(Metal::Zinc.tons_per_lot(), 25);
        assert_eq!(Metal::Nickel.tons_per_lot(), 6);
        assert_eq!(Metal::Tin.tons_per_lot(), 5);
    }

    #[test]
    fn test_parse_names_and_codes() {
        assert_eq!("aluminum".parse::<Metal>().unwrap(), Metal::Aluminum);
        assert_eq!("SN".parse::<Metal>().unwrap(), Metal::Tin);
        assert_eq!(" zs ".parse::<Metal>().unwrap(), Metal::Zinc);
        assert!("Gold".parse::<Metal>().is_err());
    }

    #[test]
    fn test_serde_accepts_code_alias() {
        let m: Metal = serde_json::from_str("\"CA\"").unwrap();
        assert_eq!(m, Metal::Copper);
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"Copper\"");
    }
}
