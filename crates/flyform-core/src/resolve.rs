// ── Identity resolution ──
//
// The remote API has no get-by-name, so identity is resolved by scanning
// a listed collection. Pure functions over snapshots; fetching the list
// is the caller's job (and its failure is a real error, unlike a miss).

use crate::model::{EntityId, Pipeline, Team};

/// Anything that carries a server id and a mutable name.
pub trait Identified {
    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
}

impl Identified for Team {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identified for Pipeline {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Whether `entity` answers to `token` (its id or its name) or, when
/// given, to `fallback_name`.
pub fn matches<T: Identified>(entity: &T, token: &str, fallback_name: &str) -> bool {
    entity.id().matches_token(token)
        || (!token.is_empty() && entity.name() == token)
        || (!fallback_name.is_empty() && entity.name() == fallback_name)
}

/// First entity in `collection` answering to `token` or `fallback_name`.
///
/// `None` means the entity is gone upstream, which callers treat as a
/// normal outcome. Collection order is whatever the remote side returned.
pub fn resolve<'a, T: Identified>(
    token: &str,
    collection: &'a [T],
    fallback_name: &str,
) -> Option<&'a T> {
    collection
        .iter()
        .find(|entity| matches(*entity, token, fallback_name))
}
