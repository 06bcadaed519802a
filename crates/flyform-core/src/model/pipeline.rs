// ── Pipeline domain types ──

use std::fmt;
use std::num::ParseIntError;

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;
use crate::document::{ParsedConfig, RawConfigText};

/// A pipeline as the remote side reports it. Config lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: EntityId,
    pub name: String,
    pub team_name: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub public: bool,
}

// ── ConfigVersion ───────────────────────────────────────────────────

/// Opaque version token stamped on a pipeline's config by the remote side.
///
/// Every config write presents the last observed token. The remote side
/// issues decimal tokens, but nothing enforces that until a write needs
/// the number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigVersion(String);

impl ConfigVersion {
    /// Token presented when creating a pipeline.
    pub fn initial() -> Self {
        Self("1".into())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_number(&self) -> Result<u64, ParseIntError> {
        self.0.trim().parse()
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ConfigVersion {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for ConfigVersion {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Config and its version, as last persisted remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedConfig {
    pub config: ParsedConfig,
    pub version: ConfigVersion,
}

/// Non-fatal remark returned alongside a config write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigWarning {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Outcome of a pipeline config create-or-update call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWrite {
    pub created: bool,
    pub updated: bool,
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigWrite {
    pub fn applied(&self) -> bool {
        self.created || self.updated
    }
}

// ── PipelineRecord ──────────────────────────────────────────────────

/// Caller-owned state of one pipeline.
///
/// `id` and `config_version` are computed remotely and absent until the
/// pipeline has been created or imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub team: String,
    pub name: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub public: bool,
    pub config: RawConfigText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<ConfigVersion>,
}

impl PipelineRecord {
    pub fn new(
        team: impl Into<String>,
        name: impl Into<String>,
        config: impl Into<RawConfigText>,
    ) -> Self {
        Self {
            team: team.into(),
            name: name.into(),
            config: config.into(),
            ..Self::default()
        }
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn initial_version_is_one() {
        assert_eq!(ConfigVersion::initial().as_number().unwrap(), 1);
    }

    #[test]
    fn non_numeric_version_fails_to_parse() {
        assert!(ConfigVersion::new("v7").as_number().is_err());
    }

    #[test]
    fn warning_display_includes_type() {
        let warning = ConfigWarning {
            kind: "deprecation".into(),
            message: "use across".into(),
        };
        assert_eq!(warning.to_string(), "[deprecation] use across");
    }

    #[test]
    fn write_applied_when_created_or_updated() {
        assert!(!ConfigWrite::default().applied());
        assert!(
            ConfigWrite {
                updated: true,
                ..ConfigWrite::default()
            }
            .applied()
        );
    }
}
