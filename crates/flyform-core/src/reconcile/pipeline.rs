// ── Pipeline reconciler ──
//
// Lifecycle: absent -> exists (config written) -> deleted. Paused and
// public are orthogonal flags, each flipped by its own toggle call and
// never carried by the config write. Config writes are guarded by the
// remote version token; nothing else is.

use tracing::{debug, info, warn};

use crate::client::ConcourseClient;
use crate::diff::{differs, summarize};
use crate::document::{ParsedConfig, RawConfigText};
use crate::error::{CoreError, remote};
use crate::model::{ConfigVersion, ConfigWarning, EntityKind, PipelineRecord, VersionedConfig};
use crate::reconcile::{Toggle, team};
use crate::resolve::resolve;

const KIND: EntityKind = EntityKind::Pipeline;

/// Create the pipeline, then flip paused/public away from the remote
/// defaults where the record asks for it.
///
/// A toggle failure after the config write is reported as
/// [`CoreError::PartialApplication`]; the pipeline stays as written.
pub fn create<C>(client: &C, desired: &PipelineRecord) -> Result<PipelineRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let team = desired.team.as_str();
    let name = desired.name.as_str();
    parse(name, &desired.config, "desired config")?;

    debug!(team, pipeline = name, "checking pipeline is absent");
    let existing = client
        .pipeline(team, name)
        .map_err(remote(KIND, name, "fetch pipeline before create"))?;
    if existing.is_some() {
        return Err(CoreError::AlreadyExists {
            kind: KIND,
            name: name.to_owned(),
            team: team.to_owned(),
        });
    }

    debug!(team, pipeline = name, "creating pipeline config");
    let write = client
        .create_or_update_pipeline_config(
            team,
            name,
            &ConfigVersion::initial(),
            desired.config.as_bytes(),
            false,
        )
        .map_err(remote(KIND, name, "create pipeline config"))?;
    if !write.applied() {
        return Err(CoreError::CreationFailed {
            kind: KIND,
            name: name.to_owned(),
        });
    }
    log_warnings(team, name, &write.warnings);

    let pipeline = client
        .pipeline(team, name)
        .map_err(remote(KIND, name, "fetch pipeline after create"))?
        .ok_or_else(|| CoreError::PostWriteVerificationFailed {
            kind: KIND,
            name: name.to_owned(),
            detail: "pipeline is not visible after create".into(),
            source: None,
        })?;
    let persisted = match client.pipeline_config(team, name) {
        Ok(Some(persisted)) => persisted,
        Ok(None) => {
            return Err(CoreError::PostWriteVerificationFailed {
                kind: KIND,
                name: name.to_owned(),
                detail: "config is not readable after create".into(),
                source: None,
            });
        }
        Err(source) => {
            return Err(CoreError::PostWriteVerificationFailed {
                kind: KIND,
                name: name.to_owned(),
                detail: "config read-back failed".into(),
                source: Some(source),
            });
        }
    };
    info!(
        team,
        pipeline = name,
        id = %pipeline.id,
        version = %persisted.version,
        "pipeline created"
    );

    if pipeline.paused != desired.paused {
        toggle_after_write(client, team, name, Toggle::paused(desired.paused))?;
    }
    if pipeline.public != desired.public {
        toggle_after_write(client, team, name, Toggle::public(desired.public))?;
    }

    Ok(PipelineRecord {
        id: Some(pipeline.id),
        team: team.to_owned(),
        name: pipeline.name,
        paused: desired.paused,
        public: desired.public,
        config: desired.config.clone(),
        config_version: Some(persisted.version),
    })
}

/// Refresh a record from the remote side.
///
/// Returns `Ok(None)` when the pipeline is not listed; the caller should
/// drop its identity. The record's config text and version survive
/// untouched unless the remote config differs structurally, in which case
/// both are replaced with the remote canonical form. A listed pipeline
/// whose config cannot be fetched keeps the last known config and version.
pub fn read<C>(client: &C, current: &PipelineRecord) -> Result<Option<PipelineRecord>, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let token = current.id.map(|id| id.to_string()).unwrap_or_default();
    read_by_token(client, current, &token)
}

/// Converge an existing pipeline from `current` (last observed) to
/// `desired`, then Read.
///
/// Order: rename, paused, public, config. Both flag toggles are attempted
/// even if the first fails; the config write is skipped after any toggle
/// failure.
pub fn update<C>(
    client: &C,
    current: &PipelineRecord,
    desired: &PipelineRecord,
) -> Result<PipelineRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    if desired.team != current.team {
        return Err(CoreError::Unsupported {
            operation: format!(
                "moving pipeline \"{}\" from team \"{}\" to team \"{}\"",
                current.name, current.team, desired.team
            ),
        });
    }
    let team = current.team.as_str();
    let desired_config = parse(&desired.name, &desired.config, "desired config")?;
    let last_known = parse(&current.name, &current.config, "last known config")?;

    if desired.name != current.name {
        rename(client, team, &current.name, &desired.name)?;
    }
    let name = desired.name.as_str();

    apply_flag_changes(client, team, name, current, desired)?;

    let mut config_version = current.config_version.clone();
    if differs(&last_known, &desired_config) {
        config_version = Some(write_config(
            client,
            team,
            name,
            &desired.config,
            &desired_config,
        )?);
    } else {
        debug!(team, pipeline = name, "config unchanged, skipping write");
    }

    let next = PipelineRecord {
        id: current.id,
        config_version,
        ..desired.clone()
    };
    read(client, &next)?.ok_or_else(|| CoreError::NotFound {
        kind: KIND,
        identifier: name.to_owned(),
    })
}

/// Delete by name within the record's team. Errors surface unchanged.
pub fn delete<C>(client: &C, current: &PipelineRecord) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let team = current.team.as_str();
    let name = current.name.as_str();
    debug!(team, pipeline = name, "deleting pipeline");
    let existed = client
        .delete_pipeline(team, name)
        .map_err(remote(KIND, name, "delete pipeline"))?;
    if existed {
        info!(team, pipeline = name, "pipeline deleted");
    } else {
        debug!(team, pipeline = name, "pipeline was already absent");
    }
    Ok(())
}

/// Whether a pipeline named like the record exists in the record's team.
///
/// A missing team answers `false` without listing its pipelines.
pub fn exists<C>(client: &C, current: &PipelineRecord) -> Result<bool, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let team = current.team.as_str();
    if !team::team_exists(client, team)? {
        debug!(team, pipeline = %current.name, "team absent, pipeline cannot exist");
        return Ok(false);
    }
    let pipelines = client
        .list_pipelines(team)
        .map_err(remote(EntityKind::Team, team, "list pipelines"))?;
    Ok(pipelines
        .iter()
        .any(|p| p.name == current.name && p.team_name == current.team))
}

/// Attach an existing pipeline of `team`, found by id or name.
pub fn import<C>(client: &C, team: &str, id_or_name: &str) -> Result<PipelineRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let seed = PipelineRecord {
        team: team.to_owned(),
        ..PipelineRecord::default()
    };
    read_by_token(client, &seed, id_or_name)?.ok_or_else(|| CoreError::NotFound {
        kind: KIND,
        identifier: id_or_name.to_owned(),
    })
}

// ── Steps ───────────────────────────────────────────────────────────

fn read_by_token<C>(
    client: &C,
    current: &PipelineRecord,
    token: &str,
) -> Result<Option<PipelineRecord>, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let team = current.team.as_str();
    let pipelines = client
        .list_pipelines(team)
        .map_err(remote(EntityKind::Team, team, "list pipelines"))?;
    let Some(found) = resolve(token, &pipelines, &current.name) else {
        debug!(team, token, name = %current.name, "pipeline gone upstream");
        return Ok(None);
    };

    let last_known = parse(&found.name, &current.config, "last known config")?;
    let server = client
        .pipeline_config(team, &found.name)
        .map_err(remote(KIND, &found.name, "fetch pipeline config"))?;

    let mut observed = PipelineRecord {
        id: Some(found.id),
        team: found.team_name.clone(),
        name: found.name.clone(),
        paused: found.paused,
        public: found.public,
        config: current.config.clone(),
        config_version: current.config_version.clone(),
    };
    let Some(VersionedConfig { config, version }) = server else {
        debug!(team, pipeline = %found.name, "pipeline listed without config, keeping last known");
        return Ok(Some(observed));
    };
    if differs(&last_known, &config) {
        debug!(team, pipeline = %found.name, %version, "remote config differs from last known");
        observed.config =
            config
                .to_canonical_text()
                .map_err(|source| CoreError::ConfigParse {
                    name: found.name.clone(),
                    document: "remote config",
                    source,
                })?;
        observed.config_version = Some(version);
    } else if observed.config_version.is_none() {
        observed.config_version = Some(version);
    }
    Ok(Some(observed))
}

fn rename<C>(client: &C, team: &str, old_name: &str, new_name: &str) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    debug!(team, from = old_name, to = new_name, "renaming pipeline");
    let found = client
        .rename_pipeline(team, old_name, new_name)
        .map_err(remote(KIND, old_name, "rename pipeline"))?;
    if !found {
        return Err(CoreError::NotFound {
            kind: KIND,
            identifier: old_name.to_owned(),
        });
    }
    info!(team, from = old_name, to = new_name, "pipeline renamed");
    Ok(())
}

fn apply_flag_changes<C>(
    client: &C,
    team: &str,
    name: &str,
    current: &PipelineRecord,
    desired: &PipelineRecord,
) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let toggles = [
        (desired.paused != current.paused).then_some(Toggle::paused(desired.paused)),
        (desired.public != current.public).then_some(Toggle::public(desired.public)),
    ];
    let mut first_failure = None;
    for toggle in toggles.into_iter().flatten() {
        if let Err(err) = apply_toggle(client, team, name, toggle) {
            warn!(team, pipeline = name, %toggle, error = %err, "pipeline toggle failed");
            first_failure.get_or_insert(err);
        }
    }
    first_failure.map_or(Ok(()), Err)
}

fn apply_toggle<C>(client: &C, team: &str, name: &str, toggle: Toggle) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    debug!(team, pipeline = name, %toggle, "toggling pipeline");
    let found = toggle
        .apply(client, team, name)
        .map_err(remote(KIND, name, toggle.step()))?;
    if !found {
        return Err(CoreError::NotFound {
            kind: KIND,
            identifier: name.to_owned(),
        });
    }
    info!(team, pipeline = name, %toggle, "pipeline toggled");
    Ok(())
}

fn toggle_after_write<C>(client: &C, team: &str, name: &str, toggle: Toggle) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    apply_toggle(client, team, name, toggle).map_err(|source| {
        warn!(team, pipeline = name, %toggle, "pipeline written but toggle failed");
        CoreError::PartialApplication {
            kind: KIND,
            name: name.to_owned(),
            step: toggle.step().to_owned(),
            source: Box::new(source),
        }
    })
}

/// Write `raw` against the current remote version and return the version
/// the record should now carry (remote + 1 after a write).
fn write_config<C>(
    client: &C,
    team: &str,
    name: &str,
    raw: &RawConfigText,
    desired: &ParsedConfig,
) -> Result<ConfigVersion, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let existing = client
        .pipeline_config(team, name)
        .map_err(remote(KIND, name, "fetch pipeline config"))?
        .ok_or_else(|| CoreError::NotFound {
            kind: KIND,
            identifier: format!("{team}/{name}"),
        })?;
    let current = existing
        .version
        .as_number()
        .map_err(|source| CoreError::VersionParse {
            name: name.to_owned(),
            version: existing.version.to_string(),
            source,
        })?;

    if !differs(&existing.config, desired) {
        debug!(team, pipeline = name, version = %existing.version, "remote config already matches");
        return Ok(existing.version);
    }
    for change in summarize(&existing.config, desired) {
        debug!(team, pipeline = name, %change, "config change");
    }

    debug!(team, pipeline = name, version = %existing.version, "writing pipeline config");
    match client.create_or_update_pipeline_config(team, name, &existing.version, raw.as_bytes(), false) {
        Ok(write) if write.applied() => {
            log_warnings(team, name, &write.warnings);
            let next = ConfigVersion::from(current + 1);
            info!(team, pipeline = name, from = current, to = %next, "pipeline config updated");
            Ok(next)
        }
        Ok(write) => Err(CoreError::ConfigWriteRejected {
            team: team.to_owned(),
            name: name.to_owned(),
            version: current,
            reason: "neither 'created' nor 'updated' was reported".into(),
            warnings: join_warnings(&write.warnings),
            source: None,
        }),
        Err(source) if source.is_version_conflict() => Err(CoreError::VersionConflict {
            team: team.to_owned(),
            name: name.to_owned(),
            presented: existing.version.to_string(),
            source,
        }),
        Err(source) => Err(CoreError::ConfigWriteRejected {
            team: team.to_owned(),
            name: name.to_owned(),
            version: current,
            reason: source.to_string(),
            warnings: join_warnings(source.warnings()),
            source: Some(source),
        }),
    }
}

fn parse(
    name: &str,
    text: &RawConfigText,
    document: &'static str,
) -> Result<ParsedConfig, CoreError> {
    text.parse().map_err(|source| CoreError::ConfigParse {
        name: name.to_owned(),
        document,
        source,
    })
}

fn log_warnings(team: &str, name: &str, warnings: &[ConfigWarning]) {
    for warning in warnings {
        warn!(team, pipeline = name, %warning, "config write warning");
    }
}

fn join_warnings(warnings: &[ConfigWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let joined = warnings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(", {joined}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_prefixed_and_comma_joined() {
        let warnings = vec![
            ConfigWarning {
                kind: "pipeline".into(),
                message: "unused resource".into(),
            },
            ConfigWarning {
                kind: "invalid_identifier".into(),
                message: "bad name".into(),
            },
        ];
        assert_eq!(
            join_warnings(&warnings),
            ", [pipeline] unused resource, [invalid_identifier] bad name"
        );
        assert_eq!(join_warnings(&[]), "");
    }

    #[test]
    fn unparseable_config_names_the_document() {
        let err = parse("build", &RawConfigText::new("- not\n- a mapping\n"), "desired config")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to parse desired config of pipeline \"build\": \
             pipeline config must be a mapping at the top level, found a sequence"
        );
    }
}
