// ── Team domain types ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;

/// The only role these records model. Other roles on a remote team are
/// left out of records.
pub const MEMBER_ROLE: &str = "member";

/// Users and groups granted one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAuth {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Role name -> grants.
pub type TeamAuth = BTreeMap<String, RoleAuth>;

/// A team as the remote side reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub auth: TeamAuth,
}

impl Team {
    /// Grants of the member role, empty when the role is absent.
    pub fn member_auth(&self) -> RoleAuth {
        self.auth.get(MEMBER_ROLE).cloned().unwrap_or_default()
    }
}

/// Body of a team create-or-update call. The remote side owns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub name: String,
    pub auth: TeamAuth,
}

/// Outcome of a team create-or-update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamWrite {
    pub team: Team,
    pub created: bool,
    pub updated: bool,
}

impl TeamWrite {
    pub fn applied(&self) -> bool {
        self.created || self.updated
    }
}

/// Caller-owned state of one team.
///
/// `id` is absent until the team has been created or imported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub auth_users: Vec<String>,
    #[serde(default)]
    pub auth_groups: Vec<String>,
}

impl TeamRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Full auth map carrying only the member role.
    pub fn member_auth(&self) -> TeamAuth {
        let mut auth = TeamAuth::new();
        auth.insert(
            MEMBER_ROLE.to_owned(),
            RoleAuth {
                users: self.auth_users.clone(),
                groups: self.auth_groups.clone(),
            },
        );
        auth
    }

    /// Create-or-update body for this record under `name`.
    pub fn to_spec(&self, name: &str) -> TeamSpec {
        TeamSpec {
            name: name.to_owned(),
            auth: self.member_auth(),
        }
    }

    /// Record mirroring a remote team.
    pub fn observed(team: &Team) -> Self {
        let member = team.member_auth();
        Self {
            id: Some(team.id),
            name: team.name.clone(),
            auth_users: member.users,
            auth_groups: member.groups,
        }
    }

    pub fn auth_differs(&self, other: &Self) -> bool {
        self.auth_users != other.auth_users || self.auth_groups != other.auth_groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_record_only_surfaces_member_role() {
        let mut auth = TeamAuth::new();
        auth.insert(
            "owner".into(),
            RoleAuth {
                users: vec!["root".into()],
                groups: vec![],
            },
        );
        auth.insert(
            MEMBER_ROLE.into(),
            RoleAuth {
                users: vec!["alice".into()],
                groups: vec!["github:org".into()],
            },
        );
        let team = Team {
            id: EntityId::new(3),
            name: "ops".into(),
            auth,
        };

        let record = TeamRecord::observed(&team);
        assert_eq!(record.id, Some(EntityId::new(3)));
        assert_eq!(record.auth_users, vec!["alice".to_owned()]);
        assert_eq!(record.auth_groups, vec!["github:org".to_owned()]);
    }

    #[test]
    fn missing_member_role_yields_empty_lists() {
        let team = Team {
            id: EntityId::new(1),
            name: "main".into(),
            auth: TeamAuth::new(),
        };
        let record = TeamRecord::observed(&team);
        assert!(record.auth_users.is_empty());
        assert!(record.auth_groups.is_empty());
    }

    #[test]
    fn member_auth_replaces_whole_map() {
        let record = TeamRecord::new("ops").with_users(["alice"]);
        let auth = record.member_auth();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[MEMBER_ROLE].users, vec!["alice".to_owned()]);
        assert!(auth[MEMBER_ROLE].groups.is_empty());
    }
}
