// ── Domain model ──
//
// Remote entities as the facade reports them, plus the caller-owned
// records that reconcilers read and return.

pub mod entity_id;
pub mod pipeline;
pub mod team;

use strum::Display;

pub use entity_id::EntityId;
pub use pipeline::{
    ConfigVersion, ConfigWarning, ConfigWrite, Pipeline, PipelineRecord, VersionedConfig,
};
pub use team::{MEMBER_ROLE, RoleAuth, Team, TeamAuth, TeamRecord, TeamSpec, TeamWrite};

/// Which remote entity type an operation or error concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Team,
    Pipeline,
}
