//! In-memory [`ConcourseClient`] for tests.
//!
//! Keeps teams, pipelines and config versions the way a Concourse server
//! would, records every facade call in order, and lets a test inject a
//! failure for any call kind.
//!
//! ```
//! use flyform_core::testing::{CallKind, InMemoryConcourse};
//! use flyform_core::{PipelineRecord, reconcile};
//!
//! let concourse = InMemoryConcourse::new();
//! concourse.seed_team("main", &[], &[]);
//! let desired = PipelineRecord::new("main", "build", "jobs: []\n").paused(true);
//! reconcile::pipeline::create(&concourse, &desired).unwrap();
//! assert_eq!(concourse.count(CallKind::PausePipeline), 1);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;

use strum::{Display, EnumDiscriminants};

use crate::client::{ClientError, ConcourseClient};
use crate::document::{ParsedConfig, RawConfigText};
use crate::model::{
    ConfigVersion, ConfigWarning, ConfigWrite, EntityId, Pipeline, RoleAuth, Team, TeamAuth,
    TeamSpec, TeamWrite, VersionedConfig, MEMBER_ROLE,
};

/// One facade call, with the arguments that identify its target.
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(CallKind), derive(Hash, Display))]
pub enum RemoteCall {
    ListTeams,
    CreateOrUpdateTeam {
        name: String,
    },
    RenameTeam {
        old_name: String,
        new_name: String,
    },
    DestroyTeam {
        name: String,
    },
    ListPipelines {
        team: String,
    },
    Pipeline {
        team: String,
        name: String,
    },
    PipelineConfig {
        team: String,
        name: String,
    },
    CreateOrUpdatePipelineConfig {
        team: String,
        name: String,
        version: String,
        check_only: bool,
    },
    RenamePipeline {
        team: String,
        old_name: String,
        new_name: String,
    },
    PausePipeline {
        team: String,
        name: String,
    },
    UnpausePipeline {
        team: String,
        name: String,
    },
    ExposePipeline {
        team: String,
        name: String,
    },
    HidePipeline {
        team: String,
        name: String,
    },
    DeletePipeline {
        team: String,
        name: String,
    },
}

#[derive(Debug, Clone)]
struct StoredPipeline {
    pipeline: Pipeline,
    config: ParsedConfig,
    version: String,
}

#[derive(Debug, Default)]
struct Server {
    last_id: i64,
    teams: Vec<Team>,
    pipelines: Vec<StoredPipeline>,
    calls: Vec<RemoteCall>,
    failures: HashMap<CallKind, ClientError>,
    warnings: Vec<ConfigWarning>,
    silent_writes: bool,
    conceal_created: bool,
    withhold_configs: bool,
}

impl Server {
    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        EntityId::new(self.last_id)
    }

    fn team_mut(&mut self, name: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.name == name)
    }

    fn has_team(&self, name: &str) -> bool {
        self.teams.iter().any(|t| t.name == name)
    }

    fn stored(&self, team: &str, name: &str) -> Option<&StoredPipeline> {
        self.pipelines
            .iter()
            .find(|p| p.pipeline.team_name == team && p.pipeline.name == name)
    }

    fn stored_mut(&mut self, team: &str, name: &str) -> Option<&mut StoredPipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.pipeline.team_name == team && p.pipeline.name == name)
    }

    fn flag(&mut self, team: &str, name: &str, set: impl FnOnce(&mut Pipeline)) -> bool {
        self.stored_mut(team, name)
            .map(|stored| set(&mut stored.pipeline))
            .is_some()
    }
}

/// Single-threaded fake Concourse installation.
#[derive(Debug, Default)]
pub struct InMemoryConcourse {
    server: RefCell<Server>,
}

impl InMemoryConcourse {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ──────────────────────────────────────────────────────

    /// Add a team whose member role grants `users` and `groups`.
    pub fn seed_team(&self, name: &str, users: &[&str], groups: &[&str]) -> EntityId {
        let mut server = self.server.borrow_mut();
        let id = server.next_id();
        let mut auth = TeamAuth::new();
        auth.insert(
            MEMBER_ROLE.to_owned(),
            RoleAuth {
                users: users.iter().map(|u| (*u).to_owned()).collect(),
                groups: groups.iter().map(|g| (*g).to_owned()).collect(),
            },
        );
        server.teams.push(Team {
            id,
            name: name.to_owned(),
            auth,
        });
        id
    }

    /// Add a pipeline at config version `1`, unpaused and hidden.
    ///
    /// # Panics
    ///
    /// Panics if `config` is not a YAML mapping.
    pub fn seed_pipeline(&self, team: &str, name: &str, config: &str) -> EntityId {
        let parsed = match RawConfigText::new(config).parse() {
            Ok(parsed) => parsed,
            Err(err) => panic!("seed config for pipeline {name} does not parse: {err}"),
        };
        let mut server = self.server.borrow_mut();
        let id = server.next_id();
        server.pipelines.push(StoredPipeline {
            pipeline: Pipeline {
                id,
                name: name.to_owned(),
                team_name: team.to_owned(),
                paused: false,
                public: false,
            },
            config: parsed,
            version: ConfigVersion::initial().to_string(),
        });
        id
    }

    /// Force the stored version token, e.g. to something non-numeric.
    pub fn set_config_version(&self, team: &str, name: &str, token: &str) {
        if let Some(stored) = self.server.borrow_mut().stored_mut(team, name) {
            token.clone_into(&mut stored.version);
        }
    }

    /// Replace a pipeline's config as someone else would, bumping its version.
    ///
    /// # Panics
    ///
    /// Panics if `config` is not a YAML mapping.
    pub fn edit_config(&self, team: &str, name: &str, config: &str) {
        let parsed = match RawConfigText::new(config).parse() {
            Ok(parsed) => parsed,
            Err(err) => panic!("edited config for pipeline {name} does not parse: {err}"),
        };
        if let Some(stored) = self.server.borrow_mut().stored_mut(team, name) {
            stored.config = parsed;
            stored.version = bump(&stored.version);
        }
    }

    pub fn set_flags(&self, team: &str, name: &str, paused: bool, public: bool) {
        self.server.borrow_mut().flag(team, name, |p| {
            p.paused = paused;
            p.public = public;
        });
    }

    // ── Behaviour knobs ──────────────────────────────────────────────

    /// Make every call of `kind` fail with `error` until cleared.
    pub fn fail_on(&self, kind: CallKind, error: ClientError) {
        self.server.borrow_mut().failures.insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.server.borrow_mut().failures.clear();
    }

    /// Warnings attached to every config write outcome.
    pub fn warn_on_write(&self, warnings: Vec<ConfigWarning>) {
        self.server.borrow_mut().warnings = warnings;
    }

    /// Writes succeed at the transport level but report neither created
    /// nor updated, and change nothing.
    pub fn silence_writes(&self, silent: bool) {
        self.server.borrow_mut().silent_writes = silent;
    }

    /// Pipeline creation reports success but nothing is stored.
    pub fn conceal_created(&self, conceal: bool) {
        self.server.borrow_mut().conceal_created = conceal;
    }

    /// `pipeline_config` answers `None` for every pipeline.
    pub fn withhold_configs(&self, withhold: bool) {
        self.server.borrow_mut().withhold_configs = withhold;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.server.borrow().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.server
            .borrow()
            .calls
            .iter()
            .filter(|call| CallKind::from(*call) == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.server.borrow_mut().calls.clear();
    }

    pub fn team(&self, name: &str) -> Option<Team> {
        self.server
            .borrow()
            .teams
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    pub fn stored_pipeline(&self, team: &str, name: &str) -> Option<Pipeline> {
        self.server
            .borrow()
            .stored(team, name)
            .map(|stored| stored.pipeline.clone())
    }

    pub fn stored_config(&self, team: &str, name: &str) -> Option<VersionedConfig> {
        self.server
            .borrow()
            .stored(team, name)
            .map(|stored| VersionedConfig {
                config: stored.config.clone(),
                version: ConfigVersion::new(stored.version.clone()),
            })
    }

    /// Record `call` and return the injected failure for its kind, if any.
    fn record(&self, call: RemoteCall) -> Result<(), ClientError> {
        let mut server = self.server.borrow_mut();
        let kind = CallKind::from(&call);
        server.calls.push(call);
        server.failures.get(&kind).cloned().map_or(Ok(()), Err)
    }
}

fn bump(version: &str) -> String {
    (version.parse::<u64>().unwrap_or(0) + 1).to_string()
}

fn not_found(resource: String) -> ClientError {
    ClientError::NotFound { resource }
}

impl ConcourseClient for InMemoryConcourse {
    fn list_teams(&self) -> Result<Vec<Team>, ClientError> {
        self.record(RemoteCall::ListTeams)?;
        Ok(self.server.borrow().teams.clone())
    }

    fn create_or_update_team(&self, team: &TeamSpec) -> Result<TeamWrite, ClientError> {
        self.record(RemoteCall::CreateOrUpdateTeam {
            name: team.name.clone(),
        })?;
        let mut server = self.server.borrow_mut();
        if server.silent_writes {
            let existing = server.teams.iter().find(|t| t.name == team.name).cloned();
            return Ok(TeamWrite {
                team: existing.unwrap_or_else(|| Team {
                    id: EntityId::new(0),
                    name: team.name.clone(),
                    auth: TeamAuth::new(),
                }),
                created: false,
                updated: false,
            });
        }
        if let Some(existing) = server.team_mut(&team.name) {
            existing.auth.clone_from(&team.auth);
            return Ok(TeamWrite {
                team: existing.clone(),
                created: false,
                updated: true,
            });
        }
        let created = Team {
            id: server.next_id(),
            name: team.name.clone(),
            auth: team.auth.clone(),
        };
        server.teams.push(created.clone());
        Ok(TeamWrite {
            team: created,
            created: true,
            updated: false,
        })
    }

    fn rename_team(&self, old_name: &str, new_name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::RenameTeam {
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
        })?;
        let mut server = self.server.borrow_mut();
        if server.has_team(new_name) {
            return Err(ClientError::Rejected {
                message: format!("team {new_name} already exists"),
                warnings: Vec::new(),
            });
        }
        let Some(team) = server.team_mut(old_name) else {
            return Ok(false);
        };
        new_name.clone_into(&mut team.name);
        for stored in &mut server.pipelines {
            if stored.pipeline.team_name == old_name {
                new_name.clone_into(&mut stored.pipeline.team_name);
            }
        }
        Ok(true)
    }

    fn destroy_team(&self, name: &str) -> Result<(), ClientError> {
        self.record(RemoteCall::DestroyTeam {
            name: name.to_owned(),
        })?;
        let mut server = self.server.borrow_mut();
        if !server.has_team(name) {
            return Err(not_found(format!("team {name}")));
        }
        server.teams.retain(|t| t.name != name);
        server.pipelines.retain(|p| p.pipeline.team_name != name);
        Ok(())
    }

    fn list_pipelines(&self, team: &str) -> Result<Vec<Pipeline>, ClientError> {
        self.record(RemoteCall::ListPipelines {
            team: team.to_owned(),
        })?;
        Ok(self
            .server
            .borrow()
            .pipelines
            .iter()
            .filter(|p| p.pipeline.team_name == team)
            .map(|p| p.pipeline.clone())
            .collect())
    }

    fn pipeline(&self, team: &str, name: &str) -> Result<Option<Pipeline>, ClientError> {
        self.record(RemoteCall::Pipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(self.stored_pipeline(team, name))
    }

    fn pipeline_config(
        &self,
        team: &str,
        name: &str,
    ) -> Result<Option<VersionedConfig>, ClientError> {
        self.record(RemoteCall::PipelineConfig {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        if self.server.borrow().withhold_configs {
            return Ok(None);
        }
        Ok(self.stored_config(team, name))
    }

    fn create_or_update_pipeline_config(
        &self,
        team: &str,
        name: &str,
        version: &ConfigVersion,
        raw: &[u8],
        check_only: bool,
    ) -> Result<ConfigWrite, ClientError> {
        self.record(RemoteCall::CreateOrUpdatePipelineConfig {
            team: team.to_owned(),
            name: name.to_owned(),
            version: version.to_string(),
            check_only,
        })?;
        let mut server = self.server.borrow_mut();
        let warnings = server.warnings.clone();
        let parsed = std::str::from_utf8(raw)
            .map_err(|err| err.to_string())
            .and_then(|text| RawConfigText::new(text).parse().map_err(|err| err.to_string()))
            .map_err(|message| ClientError::Rejected {
                message,
                warnings: warnings.clone(),
            })?;
        if !server.has_team(team) {
            return Err(not_found(format!("team {team}")));
        }
        if check_only || server.silent_writes {
            return Ok(ConfigWrite {
                warnings,
                ..ConfigWrite::default()
            });
        }

        if let Some(stored) = server.stored_mut(team, name) {
            if stored.version != version.as_str() {
                return Err(ClientError::VersionConflict {
                    presented: version.to_string(),
                    current: stored.version.clone(),
                });
            }
            stored.config = parsed;
            stored.version = bump(&stored.version);
            return Ok(ConfigWrite {
                created: false,
                updated: true,
                warnings,
            });
        }

        if !server.conceal_created {
            let id = server.next_id();
            server.pipelines.push(StoredPipeline {
                pipeline: Pipeline {
                    id,
                    name: name.to_owned(),
                    team_name: team.to_owned(),
                    paused: false,
                    public: false,
                },
                config: parsed,
                version: ConfigVersion::initial().to_string(),
            });
        }
        Ok(ConfigWrite {
            created: true,
            updated: false,
            warnings,
        })
    }

    fn rename_pipeline(
        &self,
        team: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, ClientError> {
        self.record(RemoteCall::RenamePipeline {
            team: team.to_owned(),
            old_name: old_name.to_owned(),
            new_name: new_name.to_owned(),
        })?;
        let mut server = self.server.borrow_mut();
        if server.stored(team, new_name).is_some() {
            return Err(ClientError::Rejected {
                message: format!("pipeline {new_name} already exists in team {team}"),
                warnings: Vec::new(),
            });
        }
        Ok(server.flag(team, old_name, |p| new_name.clone_into(&mut p.name)))
    }

    fn pause_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::PausePipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(self.server.borrow_mut().flag(team, name, |p| p.paused = true))
    }

    fn unpause_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::UnpausePipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(self.server.borrow_mut().flag(team, name, |p| p.paused = false))
    }

    fn expose_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::ExposePipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(self.server.borrow_mut().flag(team, name, |p| p.public = true))
    }

    fn hide_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::HidePipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        Ok(self.server.borrow_mut().flag(team, name, |p| p.public = false))
    }

    fn delete_pipeline(&self, team: &str, name: &str) -> Result<bool, ClientError> {
        self.record(RemoteCall::DeletePipeline {
            team: team.to_owned(),
            name: name.to_owned(),
        })?;
        let mut server = self.server.borrow_mut();
        let before = server.pipelines.len();
        server
            .pipelines
            .retain(|p| !(p.pipeline.team_name == team && p.pipeline.name == name));
        Ok(server.pipelines.len() != before)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stale_version_is_a_conflict() {
        let concourse = InMemoryConcourse::new();
        concourse.seed_team("main", &[], &[]);
        concourse.seed_pipeline("main", "build", "jobs: []\n");
        concourse.edit_config("main", "build", "jobs: [{name: a}]\n");

        let err = concourse
            .create_or_update_pipeline_config("main", "build", &ConfigVersion::initial(), b"a: 1\n", false)
            .unwrap_err();
        assert!(err.is_version_conflict());
        assert_eq!(concourse.stored_config("main", "build").unwrap().version.as_str(), "2");
    }

    #[test]
    fn injected_failure_is_recorded_and_returned() {
        let concourse = InMemoryConcourse::new();
        concourse.fail_on(
            CallKind::ListTeams,
            ClientError::Transport {
                message: "down".into(),
            },
        );
        assert!(concourse.list_teams().is_err());
        assert_eq!(concourse.calls(), vec![RemoteCall::ListTeams]);
    }

    #[test]
    fn renaming_a_team_moves_its_pipelines() {
        let concourse = InMemoryConcourse::new();
        concourse.seed_team("main", &[], &[]);
        concourse.seed_pipeline("main", "build", "jobs: []\n");

        assert!(concourse.rename_team("main", "core").unwrap());
        assert!(concourse.stored_pipeline("core", "build").is_some());
        assert!(!concourse.rename_team("main", "other").unwrap());
    }
}
