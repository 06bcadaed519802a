// ── Remote client facade ──
//
// The reconcilers talk to Concourse only through this trait. Transport,
// authentication and wire format live behind it; a facade implementation
// hands back decoded entities and reports failures as `ClientError`.
//
// Every call blocks until the remote side answers.

use thiserror::Error;

use crate::model::{
    ConfigVersion, ConfigWarning, ConfigWrite, Pipeline, Team, TeamSpec, TeamWrite,
    VersionedConfig,
};

/// Failure modes of a facade call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Connection refused, timeout, DNS failure, etc.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The addressed resource does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// A config write presented a version that is no longer current.
    #[error("config version conflict: presented {presented}, current {current}")]
    VersionConflict { presented: String, current: String },

    /// The remote side refused the request. Config writes may carry warnings.
    #[error("request rejected: {message}")]
    Rejected {
        message: String,
        warnings: Vec<ConfigWarning>,
    },

    /// The response could not be decoded.
    #[error("unreadable response: {message}")]
    Decode { message: String },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Warnings attached to a rejected write, if any.
    pub fn warnings(&self) -> &[ConfigWarning] {
        match self {
            Self::Rejected { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

/// Authenticated handle to one Concourse installation.
///
/// Pipeline calls are scoped to a team. Toggle and rename calls report
/// `Ok(false)` when the addressed pipeline or team does not exist.
pub trait ConcourseClient {
    // ── Teams ────────────────────────────────────────────────────────

    fn list_teams(&self) -> Result<Vec<Team>, ClientError>;

    /// Create the team if absent, otherwise replace its auth.
    fn create_or_update_team(&self, team: &TeamSpec) -> Result<TeamWrite, ClientError>;

    fn rename_team(&self, old_name: &str, new_name: &str) -> Result<bool, ClientError>;

    fn destroy_team(&self, name: &str) -> Result<(), ClientError>;

    // ── Pipelines ────────────────────────────────────────────────────

    fn list_pipelines(&self, team: &str) -> Result<Vec<Pipeline>, ClientError>;

    fn pipeline(&self, team: &str, name: &str) -> Result<Option<Pipeline>, ClientError>;

    /// Persisted config and version; `None` when the pipeline has none.
    fn pipeline_config(&self, team: &str, name: &str)
    -> Result<Option<VersionedConfig>, ClientError>;

    /// Create the pipeline with `raw` as its config, or update the config
    /// if `version` is still current. `check_only` validates without saving.
    fn create_or_update_pipeline_config(
        &self,
        team: &str,
        name: &str,
        version: &ConfigVersion,
        raw: &[u8],
        check_only: bool,
    ) -> Result<ConfigWrite, ClientError>;

    fn rename_pipeline(&self, team: &str, old_name: &str, new_name: &str)
    -> Result<bool, ClientError>;

    fn pause_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError>;

    fn unpause_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError>;

    fn expose_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError>;

    fn hide_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError>;

    fn delete_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError>;
}
