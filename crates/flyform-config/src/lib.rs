//! Declarations and persisted state for flyform.
//!
//! A TOML manifest declares the teams and pipelines that should exist; a
//! state file keeps the records the reconcilers returned last time, so the
//! next run can Read and Update instead of Create. Both convert to and from
//! `flyform_core` records.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use flyform_core::{PipelineRecord, RawConfigText, TeamRecord};

/// Manifest file looked up in the working directory.
pub const MANIFEST_FILE: &str = "flyform.toml";

const STATE_FILE: &str = "state.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("manifest not found at {}", path.display())]
    MissingManifest { path: PathBuf },

    #[error("cannot read pipeline config {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse state: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Manifest ────────────────────────────────────────────────────────

/// Desired teams and pipelines.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub teams: Vec<TeamDecl>,

    #[serde(default)]
    pub pipelines: Vec<PipelineDecl>,

    /// Directory `config_file` paths are relative to.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeamDecl {
    pub name: String,

    /// Users granted the member role.
    #[serde(default)]
    pub auth_users: Vec<String>,

    /// Groups granted the member role.
    #[serde(default)]
    pub auth_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineDecl {
    pub team: String,
    pub name: String,

    #[serde(default)]
    pub paused: bool,

    #[serde(default)]
    pub public: bool,

    /// Inline pipeline YAML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Pipeline YAML file, relative to the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl Manifest {
    /// Load `path`, overlay `FLYFORM_*` environment variables (nested keys
    /// separated by `__`), and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingManifest {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FLYFORM_").split("__"));

        let mut manifest: Self = figment.extract()?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        manifest.validate()?;
        debug!(
            path = %path.display(),
            teams = manifest.teams.len(),
            pipelines = manifest.pipelines.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut team_names = HashSet::new();
        for (i, team) in self.teams.iter().enumerate() {
            if team.name.trim().is_empty() {
                return Err(invalid(format!("teams[{i}].name"), "must not be empty"));
            }
            if !team_names.insert(team.name.as_str()) {
                return Err(invalid(
                    format!("teams[{i}].name"),
                    format!("team '{}' is declared twice", team.name),
                ));
            }
        }

        let mut pipeline_keys = HashSet::new();
        for (i, pipeline) in self.pipelines.iter().enumerate() {
            if pipeline.team.trim().is_empty() {
                return Err(invalid(format!("pipelines[{i}].team"), "must not be empty"));
            }
            if pipeline.name.trim().is_empty() {
                return Err(invalid(format!("pipelines[{i}].name"), "must not be empty"));
            }
            if pipeline.config.is_some() == pipeline.config_file.is_some() {
                return Err(invalid(
                    format!("pipelines[{i}]"),
                    "exactly one of 'config' or 'config_file' must be set",
                ));
            }
            if !pipeline_keys.insert(state_key(&pipeline.team, &pipeline.name)) {
                return Err(invalid(
                    format!("pipelines[{i}].name"),
                    format!(
                        "pipeline '{}' is declared twice in team '{}'",
                        pipeline.name, pipeline.team
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn team_records(&self) -> Vec<TeamRecord> {
        self.teams
            .iter()
            .map(|team| {
                TeamRecord::new(team.name.clone())
                    .with_users(team.auth_users.iter().cloned())
                    .with_groups(team.auth_groups.iter().cloned())
            })
            .collect()
    }

    /// Desired pipeline records, with `config_file`s read from disk.
    pub fn pipeline_records(&self) -> Result<Vec<PipelineRecord>, ConfigError> {
        self.pipelines
            .iter()
            .map(|pipeline| {
                let config = match (&pipeline.config, &pipeline.config_file) {
                    (Some(inline), _) => RawConfigText::new(inline.clone()),
                    (None, Some(file)) => self.read_config_file(file)?,
                    (None, None) => {
                        return Err(invalid(
                            format!("pipelines.{}", pipeline.name),
                            "no config given",
                        ));
                    }
                };
                Ok(PipelineRecord::new(pipeline.team.clone(), pipeline.name.clone(), config)
                    .paused(pipeline.paused)
                    .public(pipeline.public))
            })
            .collect()
    }

    fn read_config_file(&self, file: &Path) -> Result<RawConfigText, ConfigError> {
        let path = self.base_dir.join(file);
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::ConfigFile { path, source })?;
        Ok(RawConfigText::new(text))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Default manifest location: `./flyform.toml`.
pub fn manifest_path() -> PathBuf {
    PathBuf::from(MANIFEST_FILE)
}

/// Resolve the state file path via XDG / platform conventions.
pub fn state_path() -> PathBuf {
    ProjectDirs::from("dev", "flyform", "flyform").map_or_else(
        || dirs_fallback().join(STATE_FILE),
        |dirs| dirs.data_dir().join(STATE_FILE),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".local");
    p.push("share");
    p.push("flyform");
    p
}

// ── State ───────────────────────────────────────────────────────────

/// Records observed after the last run.
///
/// Teams are keyed by name, pipelines by `team/name`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub teams: BTreeMap<String, TeamRecord>,

    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineRecord>,
}

/// Key of a pipeline in [`State::pipelines`].
pub fn state_key(team: &str, name: &str) -> String {
    format!("{team}/{name}")
}

impl State {
    pub fn team(&self, name: &str) -> Option<&TeamRecord> {
        self.teams.get(name)
    }

    pub fn pipeline(&self, team: &str, name: &str) -> Option<&PipelineRecord> {
        self.pipelines.get(&state_key(team, name))
    }

    /// Store records returned by the reconcilers.
    ///
    /// A record whose id is already stored under another key replaces
    /// that entry, so renames do not leave stale keys behind.
    pub fn merge_observed<T, P>(&mut self, teams: T, pipelines: P)
    where
        T: IntoIterator<Item = TeamRecord>,
        P: IntoIterator<Item = PipelineRecord>,
    {
        for team in teams {
            if team.id.is_some() {
                self.teams.retain(|_, known| known.id != team.id);
            }
            self.teams.insert(team.name.clone(), team);
        }
        for pipeline in pipelines {
            if pipeline.id.is_some() {
                self.pipelines.retain(|_, known| known.id != pipeline.id);
            }
            self.pipelines
                .insert(state_key(&pipeline.team, &pipeline.name), pipeline);
        }
        self.updated_at = Some(Utc::now());
    }

    /// Drop a team that Read reported as gone.
    pub fn forget_team(&mut self, name: &str) -> Option<TeamRecord> {
        self.teams.remove(name)
    }

    /// Drop a pipeline that Read reported as gone.
    pub fn forget_pipeline(&mut self, team: &str, name: &str) -> Option<PipelineRecord> {
        self.pipelines.remove(&state_key(team, name))
    }
}

/// Load state from `path`, or an empty state when the file does not exist.
pub fn load_state(path: &Path) -> Result<State, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file, starting empty");
        return Ok(State::default());
    }
    let text = std::fs::read_to_string(path)?;
    let state: State = toml::from_str(&text)?;
    debug!(
        path = %path.display(),
        teams = state.teams.len(),
        pipelines = state.pipelines.len(),
        "state loaded"
    );
    Ok(state)
}

/// Serialize state to TOML and write it to `path`.
pub fn save_state(path: &Path, state: &State) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(state)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use flyform_core::EntityId;

    fn pipeline_decl(team: &str, name: &str) -> PipelineDecl {
        PipelineDecl {
            team: team.into(),
            name: name.into(),
            paused: false,
            public: false,
            config: Some("jobs: []\n".into()),
            config_file: None,
        }
    }

    #[test]
    fn duplicate_pipeline_in_same_team_is_rejected() {
        let manifest = Manifest {
            pipelines: vec![pipeline_decl("ops", "build"), pipeline_decl("ops", "build")],
            ..Manifest::default()
        };
        let err = manifest.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid pipelines[1].name: pipeline 'build' is declared twice in team 'ops'"
        );
    }

    #[test]
    fn same_pipeline_name_in_two_teams_is_fine() {
        let manifest = Manifest {
            pipelines: vec![pipeline_decl("ops", "build"), pipeline_decl("dev", "build")],
            ..Manifest::default()
        };
        manifest.validate().unwrap();
    }

    #[test]
    fn pipeline_needs_exactly_one_config_source() {
        let mut both = pipeline_decl("ops", "build");
        both.config_file = Some("build.yml".into());
        let mut neither = pipeline_decl("ops", "build");
        neither.config = None;

        for decl in [both, neither] {
            let manifest = Manifest {
                pipelines: vec![decl],
                ..Manifest::default()
            };
            assert!(matches!(
                manifest.validate(),
                Err(ConfigError::Validation { ref field, .. }) if field == "pipelines[0]"
            ));
        }
    }

    #[test]
    fn merge_replaces_renamed_entries_by_id() {
        let mut state = State::default();
        let mut record = TeamRecord::new("ops");
        record.id = Some(EntityId::new(7));
        state.merge_observed([record.clone()], Vec::<PipelineRecord>::new());

        record.name = "platform".into();
        state.merge_observed([record], Vec::<PipelineRecord>::new());

        assert!(state.team("ops").is_none());
        assert_eq!(state.team("platform").unwrap().id, Some(EntityId::new(7)));
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn state_path_ends_with_state_file() {
        assert!(state_path().ends_with(STATE_FILE));
    }
}
