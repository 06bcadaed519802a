// ── Team reconciler ──
//
// Auth is modelled as the member role only and always written whole:
// any create-or-update call replaces the remote auth map, dropping
// grants of other roles.

use tracing::{debug, info};

use crate::client::ConcourseClient;
use crate::error::{CoreError, remote};
use crate::model::{EntityKind, Team, TeamRecord};
use crate::resolve::resolve;

const KIND: EntityKind = EntityKind::Team;

/// Create (or overwrite) the team named by the record and return it as
/// read back from the remote listing.
pub fn create<C>(client: &C, desired: &TeamRecord) -> Result<TeamRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let name = desired.name.as_str();
    debug!(
        team = name,
        users = desired.auth_users.len(),
        groups = desired.auth_groups.len(),
        "creating team"
    );
    let write = client
        .create_or_update_team(&desired.to_spec(name))
        .map_err(remote(KIND, name, "create team"))?;
    if !write.applied() {
        return Err(CoreError::CreationFailed {
            kind: KIND,
            name: name.to_owned(),
        });
    }
    info!(team = name, id = %write.team.id, created = write.created, "team created");

    let seeded = TeamRecord {
        id: Some(write.team.id),
        ..desired.clone()
    };
    read(client, &seeded)?.ok_or_else(|| CoreError::PostWriteVerificationFailed {
        kind: KIND,
        name: name.to_owned(),
        detail: "team is not listed after create".into(),
        source: None,
    })
}

/// Refresh a record from the remote listing. `Ok(None)` means the team
/// is gone upstream.
pub fn read<C>(client: &C, current: &TeamRecord) -> Result<Option<TeamRecord>, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    read_by_token(client, &token_of(current), &current.name)
}

/// Rename and/or replace auth of an existing team, then Read.
///
/// The team is addressed by the record's id; a stale id is `NotFound`
/// even when another team carries the record's name.
pub fn update<C>(
    client: &C,
    current: &TeamRecord,
    desired: &TeamRecord,
) -> Result<TeamRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let token = token_of(current);
    let identifier = if token.is_empty() { current.name.as_str() } else { token.as_str() };
    let teams = list_teams(client, identifier)?;
    // A known id is authoritative; only id-less records fall back to the name.
    let observed = match current.id {
        Some(id) => teams.iter().find(|team| team.id == id),
        None => resolve("", &teams, &current.name),
    }
    .ok_or_else(|| CoreError::NotFound {
        kind: KIND,
        identifier: identifier.to_owned(),
    })?;
    let id = observed.id;
    let mut name = observed.name.clone();

    if desired.name != name {
        debug!(id = %id, from = %name, to = %desired.name, "renaming team");
        let found = client
            .rename_team(&name, &desired.name)
            .map_err(remote(KIND, &name, "rename team"))?;
        if !found {
            return Err(CoreError::NotFound {
                kind: KIND,
                identifier: name,
            });
        }
        info!(id = %id, from = %name, to = %desired.name, "team renamed");
        name.clone_from(&desired.name);
    }

    if desired.auth_differs(current) {
        debug!(team = %name, "replacing team auth");
        let write = client
            .create_or_update_team(&desired.to_spec(&name))
            .map_err(remote(KIND, &name, "update team auth"))?;
        if !write.applied() {
            return Err(CoreError::CreationFailed { kind: KIND, name });
        }
        info!(
            team = %name,
            users = desired.auth_users.len(),
            groups = desired.auth_groups.len(),
            "team auth replaced"
        );
    }

    let next = TeamRecord {
        id: Some(id),
        name: name.clone(),
        ..desired.clone()
    };
    read(client, &next)?.ok_or(CoreError::NotFound {
        kind: KIND,
        identifier: name,
    })
}

/// Destroy the team by name. Errors surface unchanged.
pub fn delete<C>(client: &C, current: &TeamRecord) -> Result<(), CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let name = current.name.as_str();
    debug!(team = name, "destroying team");
    client
        .destroy_team(name)
        .map_err(remote(KIND, name, "destroy team"))?;
    info!(team = name, "team destroyed");
    Ok(())
}

/// Whether a team with the record's id is listed. A record without an id
/// never exists.
pub fn exists<C>(client: &C, current: &TeamRecord) -> Result<bool, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let Some(id) = current.id else {
        return Ok(false);
    };
    let teams = list_teams(client, &id.to_string())?;
    Ok(teams.iter().any(|team| team.id == id))
}

/// Attach an existing team, found by id or name.
pub fn import<C>(client: &C, id_or_name: &str) -> Result<TeamRecord, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    read_by_token(client, id_or_name, "")?.ok_or_else(|| CoreError::NotFound {
        kind: KIND,
        identifier: id_or_name.to_owned(),
    })
}

/// Whether a team called `name` is listed.
pub fn team_exists<C>(client: &C, name: &str) -> Result<bool, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    Ok(list_teams(client, name)?.iter().any(|team| team.name == name))
}

fn read_by_token<C>(
    client: &C,
    token: &str,
    fallback_name: &str,
) -> Result<Option<TeamRecord>, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    let identifier = if token.is_empty() { fallback_name } else { token };
    let teams = list_teams(client, identifier)?;
    match resolve(token, &teams, fallback_name) {
        Some(team) => Ok(Some(TeamRecord::observed(team))),
        None => {
            debug!(token, name = fallback_name, "team gone upstream");
            Ok(None)
        }
    }
}

fn list_teams<C>(client: &C, identifier: &str) -> Result<Vec<Team>, CoreError>
where
    C: ConcourseClient + ?Sized,
{
    client
        .list_teams()
        .map_err(remote(KIND, identifier, "list teams"))
}

fn token_of(record: &TeamRecord) -> String {
    record.id.map(|id| id.to_string()).unwrap_or_default()
}
