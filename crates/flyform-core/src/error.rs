// ── Core error types ──
//
// Every remote failure is wrapped with the entity and sub-step it
// happened in. There is no `From<ClientError>`: call sites must say
// what they were doing.

use std::num::ParseIntError;

use thiserror::Error;

use crate::client::ClientError;
use crate::document::ConfigParseError;
use crate::model::EntityKind;

/// Unified error type for reconciler operations.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Identity ─────────────────────────────────────────────────────
    #[error("{kind} with id or name \"{identifier}\" not found")]
    NotFound {
        kind: EntityKind,
        identifier: String,
    },

    #[error("{kind} \"{name}\" already exists in team \"{team}\"")]
    AlreadyExists {
        kind: EntityKind,
        name: String,
        team: String,
    },

    // ── Writes ───────────────────────────────────────────────────────
    #[error("could not create/update {kind} \"{name}\": neither 'created' nor 'updated' was reported")]
    CreationFailed { kind: EntityKind, name: String },

    #[error("{kind} \"{name}\" was written but cannot be read back: {detail}")]
    PostWriteVerificationFailed {
        kind: EntityKind,
        name: String,
        detail: String,
        #[source]
        source: Option<ClientError>,
    },

    #[error(
        "{kind} \"{name}\" is left partially applied after {step} failed; no rollback was attempted: {source}"
    )]
    PartialApplication {
        kind: EntityKind,
        name: String,
        step: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error(
        "unable to update configuration of pipeline \"{name}\" of team \"{team}\" (current version: {version}): {reason}{warnings}"
    )]
    ConfigWriteRejected {
        team: String,
        name: String,
        version: u64,
        reason: String,
        /// Concatenated warnings, prefixed with `", "` when non-empty.
        warnings: String,
        #[source]
        source: Option<ClientError>,
    },

    // ── Versions ─────────────────────────────────────────────────────
    #[error(
        "config of pipeline \"{name}\" of team \"{team}\" changed remotely (presented version {presented}); read again before updating"
    )]
    VersionConflict {
        team: String,
        name: String,
        presented: String,
        #[source]
        source: ClientError,
    },

    #[error("unable to parse config version \"{version}\" of pipeline \"{name}\": {source}")]
    VersionParse {
        name: String,
        version: String,
        #[source]
        source: ParseIntError,
    },

    // ── Documents ────────────────────────────────────────────────────
    #[error("unable to parse {document} of pipeline \"{name}\": {source}")]
    ConfigParse {
        name: String,
        document: &'static str,
        #[source]
        source: ConfigParseError,
    },

    // ── Remote calls ─────────────────────────────────────────────────
    #[error("{step} failed for {kind} \"{identifier}\": {source}")]
    RemoteCall {
        kind: EntityKind,
        identifier: String,
        step: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The facade error underneath, if this error wraps one.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::RemoteCall { source, .. } | Self::VersionConflict { source, .. } => Some(source),
            Self::PostWriteVerificationFailed { source, .. }
            | Self::ConfigWriteRejected { source, .. } => source.as_ref(),
            Self::PartialApplication { source, .. } => source.client_error(),
            _ => None,
        }
    }
}

/// `map_err` adapter wrapping a facade error with operation context.
pub(crate) fn remote(
    kind: EntityKind,
    identifier: &str,
    step: &'static str,
) -> impl FnOnce(ClientError) -> CoreError {
    let identifier = identifier.to_owned();
    move |source| CoreError::RemoteCall {
        kind,
        identifier,
        step,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_call_message_names_step_and_entity() {
        let err = remote(EntityKind::Pipeline, "ops/build", "pause pipeline")(
            ClientError::Transport {
                message: "connection reset".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "pause pipeline failed for pipeline \"ops/build\": transport error: connection reset"
        );
        assert!(err.client_error().is_some());
    }

    #[test]
    fn partial_application_exposes_inner_client_error() {
        let inner = remote(EntityKind::Pipeline, "build", "expose pipeline")(
            ClientError::NotFound {
                resource: "build".into(),
            },
        );
        let err = CoreError::PartialApplication {
            kind: EntityKind::Pipeline,
            name: "build".into(),
            step: "expose pipeline".into(),
            source: Box::new(inner),
        };
        assert!(err.client_error().is_some_and(ClientError::is_not_found));
    }
}
