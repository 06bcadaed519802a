//! Declarative reconciliation of Concourse teams and pipelines.
//!
//! Callers hold records describing what should exist; this crate converges
//! a Concourse installation towards them, one entity at a time:
//!
//! - **[`ConcourseClient`]**: blocking facade over the remote API. Every
//!   remote effect goes through it, which keeps the reconcilers testable
//!   against [`testing::InMemoryConcourse`].
//!
//! - **[`reconcile`]**: create / read / update / delete / exists / import
//!   for [`TeamRecord`]s and [`PipelineRecord`]s. Read returns `Ok(None)`
//!   when the entity is gone upstream.
//!
//! - **Documents** ([`document`], [`diff`]): pipeline configs are compared
//!   structurally, so reordered keys or re-anchored YAML never trigger a
//!   write.
//!
//! - **Identity** ([`resolve`]): the remote side has no get-by-name, so
//!   entities are found by scanning listings for an id or name match.

pub mod client;
pub mod diff;
pub mod document;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod resolve;
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientError, ConcourseClient};
pub use diff::{ChangeKind, ConfigChange, differs, summarize};
pub use document::{ConfigParseError, ParsedConfig, RawConfigText};
pub use error::CoreError;
pub use reconcile::Toggle;

pub use model::{
    ConfigVersion, ConfigWarning, ConfigWrite, EntityId, EntityKind, MEMBER_ROLE, Pipeline,
    PipelineRecord, RoleAuth, Team, TeamAuth, TeamRecord, TeamSpec, TeamWrite, VersionedConfig,
};
