// ── Pipeline configuration documents ──
//
// Callers hand over YAML text; comparisons happen on the parsed tree.
// The remote side re-serializes whatever it stores, so the text it
// returns almost never byte-matches what was submitted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Failure to turn configuration text into a [`ParsedConfig`].
#[derive(Debug, Error)]
pub enum ConfigParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pipeline config must be a mapping at the top level, found {found}")]
    NotAMapping { found: &'static str },
}

// ── RawConfigText ───────────────────────────────────────────────────

/// Pipeline configuration exactly as the caller wrote it.
///
/// Kept verbatim in records so that a Read which finds no structural
/// change leaves the caller's formatting alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawConfigText(String);

impl RawConfigText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True for empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse into the comparison-capable form.
    ///
    /// Blank text parses to an empty document, which is what a freshly
    /// imported record carries before its first Read.
    pub fn parse(&self) -> Result<ParsedConfig, ConfigParseError> {
        if self.is_blank() {
            return Ok(ParsedConfig::empty());
        }
        let value: Value = serde_yaml::from_str(&self.0)?;
        ParsedConfig::from_value(value)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RawConfigText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RawConfigText {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RawConfigText {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── ParsedConfig ────────────────────────────────────────────────────

/// Structural form of a pipeline configuration.
///
/// Anchors and aliases are already expanded by the YAML loader and `<<`
/// merge keys are applied on construction. Equality is structural: mapping
/// key order and whitespace do not participate.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConfig(Value);

impl ParsedConfig {
    /// A document with no keys.
    pub fn empty() -> Self {
        Self(Value::Mapping(Mapping::new()))
    }

    /// Build from an already-decoded YAML value.
    pub fn from_value(mut value: Value) -> Result<Self, ConfigParseError> {
        value.apply_merge()?;
        match value {
            Value::Null => Ok(Self::empty()),
            Value::Mapping(_) => Ok(Self(value)),
            other => Err(ConfigParseError::NotAMapping {
                found: value_kind(&other),
            }),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_mapping().is_none_or(Mapping::is_empty)
    }

    /// Re-serialize as YAML text.
    pub fn to_canonical_text(&self) -> Result<RawConfigText, ConfigParseError> {
        Ok(RawConfigText(serde_yaml::to_string(&self.0)?))
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
