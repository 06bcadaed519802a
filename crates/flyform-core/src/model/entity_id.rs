// ── Server-assigned identity ──
//
// Concourse hands out integer ids for teams and pipelines. Names are
// mutable, ids are not, so the id is what a record keeps between runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Canonical identifier for any remote entity.
///
/// Immutable once the remote side assigns it. Rendered as a plain decimal
/// string, which is also the form callers use when importing by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// True when `token` is this id in its decimal string form.
    pub fn matches_token(self, token: &str) -> bool {
        !token.is_empty() && self.to_string() == token
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_is_plain_decimal() {
        assert_eq!(EntityId::new(42).to_string(), "42");
    }

    #[test]
    fn from_str_round_trips() {
        let id: EntityId = "17".parse().unwrap();
        assert_eq!(id, EntityId::new(17));
    }

    #[test]
    fn from_str_rejects_names() {
        assert!("build".parse::<EntityId>().is_err());
    }

    #[test]
    fn matches_token_requires_exact_decimal() {
        let id = EntityId::new(7);
        assert!(id.matches_token("7"));
        assert!(!id.matches_token("07"));
        assert!(!id.matches_token(""));
        assert!(!id.matches_token("seven"));
    }
}
