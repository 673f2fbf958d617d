use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Subscription tier of a referred user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Registered but never subscribed
    #[default]
    None,
    Basic,
    Pro,
    Business,
}

impl Plan {
    /// Plans a billing event can carry. `None` is only a referral's initial state.
    pub const SELLABLE: [Plan; 3] = [Plan::Basic, Plan::Pro, Plan::Business];

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::None => "none",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Plan::None),
            "basic" => Ok(Plan::Basic),
            "pro" => Ok(Plan::Pro),
            "business" => Ok(Plan::Business),
            _ => Err(ParseError::UnknownPlan(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("PRO".parse::<Plan>().unwrap(), Plan::Pro);
        assert_eq!(" Business ".parse::<Plan>().unwrap(), Plan::Business);
    }

    #[test]
    fn parse_rejects_unknown_tier() {
        assert_eq!(
            "enterprise".parse::<Plan>(),
            Err(ParseError::UnknownPlan("enterprise".into()))
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        for plan in Plan::SELLABLE {
            let json = serde_json::to_string(&plan).unwrap();
            assert_eq!(json, format!("\"{}\"", plan));
            let restored: Plan = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, plan);
        }
    }
}
