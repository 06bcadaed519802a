// ── Config diff oracle ──
//
// Decides whether a pipeline config write is needed at all, and explains
// what changed when it is. Works on parsed documents only.

use std::collections::HashSet;
use std::fmt;

use serde_yaml::{Mapping, Value};
use strum::Display;

use crate::document::ParsedConfig;

/// True when the two documents are structurally different.
///
/// Same notion of difference as [`summarize`]: named lists compare by
/// `name`, so reordering jobs or resources alone is no difference.
pub fn differs(last_known: &ParsedConfig, current: &ParsedConfig) -> bool {
    last_known != current && !summarize(last_known, current).is_empty()
}

/// What happened at a given path between two documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One entry of a change summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Dotted path; named list entries use their `name` as the segment.
    pub path: String,
    pub kind: ChangeKind,
}

impl fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} <root>", self.kind)
        } else {
            write!(f, "{} {}", self.kind, self.path)
        }
    }
}

/// Ordered list of changes that turn `last_known` into `current`.
///
/// Entries follow `last_known`'s order, with additions after the keys
/// they sit beside. Lists whose entries are all mappings with a string
/// `name` (jobs, resources, groups, ...) are matched by name rather than
/// by position, so reordering jobs alone yields no entries.
pub fn summarize(last_known: &ParsedConfig, current: &ParsedConfig) -> Vec<ConfigChange> {
    let mut out = Vec::new();
    walk("", last_known.as_value(), current.as_value(), &mut out);
    out
}

fn walk(path: &str, old: &Value, new: &Value, out: &mut Vec<ConfigChange>) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Mapping(a), Value::Mapping(b)) => walk_mapping(path, a, b, out),
        (Value::Sequence(a), Value::Sequence(b)) => match (named_entries(a), named_entries(b)) {
            (Some(a), Some(b)) => walk_named(path, &a, &b, out),
            _ => push(out, path, ChangeKind::Changed),
        },
        _ => push(out, path, ChangeKind::Changed),
    }
}

fn walk_mapping(path: &str, old: &Mapping, new: &Mapping, out: &mut Vec<ConfigChange>) {
    for (key, old_value) in old {
        let child = join(path, &key_segment(key));
        match new.get(key) {
            Some(new_value) => walk(&child, old_value, new_value, out),
            None => push(out, &child, ChangeKind::Removed),
        }
    }
    for key in new.keys().filter(|k| !old.contains_key(*k)) {
        push(out, &join(path, &key_segment(key)), ChangeKind::Added);
    }
}

fn walk_named(path: &str, old: &[(&str, &Value)], new: &[(&str, &Value)], out: &mut Vec<ConfigChange>) {
    for (name, old_value) in old {
        let child = join(path, name);
        match new.iter().find(|(n, _)| n == name) {
            Some((_, new_value)) => walk(&child, old_value, new_value, out),
            None => push(out, &child, ChangeKind::Removed),
        }
    }
    for (name, _) in new.iter().filter(|(n, _)| !old.iter().any(|(o, _)| o == n)) {
        push(out, &join(path, name), ChangeKind::Added);
    }
}

/// `Some` only if every entry is a mapping carrying a unique string `name`.
fn named_entries(seq: &[Value]) -> Option<Vec<(&str, &Value)>> {
    if seq.is_empty() {
        return None;
    }
    let entries = seq
        .iter()
        .map(|entry| {
            let name = entry.as_mapping()?.get("name")?.as_str()?;
            Some((name, entry))
        })
        .collect::<Option<Vec<_>>>()?;
    let unique = entries
        .iter()
        .map(|(name, _)| *name)
        .collect::<HashSet<_>>()
        .len()
        == entries.len();
    unique.then_some(entries)
}

fn key_segment(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_else(|_| "?".into()),
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_owned()
    } else {
        format!("{path}.{segment}")
    }
}

fn push(out: &mut Vec<ConfigChange>, path: &str, kind: ChangeKind) {
    out.push(ConfigChange {
        path: path.to_owned(),
        kind,
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::RawConfigText;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ParsedConfig {
        RawConfigText::new(text).parse().unwrap()
    }

    fn rendered(changes: &[ConfigChange]) -> String {
        changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    const BASE: &str = "
resources:
- name: repo
  type: git
  source: {uri: 'https://example.com/repo.git'}
jobs:
- name: build
  plan:
  - get: repo
- name: test
  plan:
  - get: repo
";

    #[test]
    fn identical_documents_never_differ() {
        let doc = parse(BASE);
        assert!(!differs(&doc, &doc));
        assert!(summarize(&doc, &doc).is_empty());
    }

    #[test]
    fn reformatted_document_does_not_differ_either_way() {
        let a = parse(BASE);
        let b = parse(
            "jobs:\n  - {name: build, plan: [{get: repo}]}\n  - {name: test, plan: [{get: repo}]}\n\
             resources:\n  - {source: {uri: 'https://example.com/repo.git'}, type: git, name: repo}\n",
        );
        assert!(!differs(&a, &b));
        assert!(!differs(&b, &a));
    }

    #[test]
    fn reordered_jobs_are_not_reported() {
        let a = parse("jobs:\n- {name: a, plan: []}\n- {name: b, plan: []}\n");
        let b = parse("jobs:\n- {name: b, plan: []}\n- {name: a, plan: []}\n");
        assert!(summarize(&a, &b).is_empty());
        assert!(!differs(&a, &b));
    }

    #[test]
    fn duplicate_names_fall_back_to_positional_comparison() {
        let a = parse("jobs:\n- {name: a, plan: [1]}\n- {name: a, plan: [2]}\n");
        let b = parse("jobs:\n- {name: a, plan: [2]}\n- {name: a, plan: [1]}\n");
        assert!(differs(&a, &b));
        assert_eq!(rendered(&summarize(&a, &b)), "changed jobs");
    }

    #[test]
    fn named_entries_are_matched_by_name() {
        let old = parse(BASE);
        let new = parse(
            "
resources:
- name: repo
  type: git
  source: {uri: 'https://example.com/other.git'}
jobs:
- name: build
  plan:
  - get: repo
- name: deploy
  plan: []
",
        );
        let changes = summarize(&old, &new);
        insta::assert_snapshot!(
            rendered(&changes),
            @"changed resources.repo.source.uri; removed jobs.test; added jobs.deploy"
        );
    }

    #[test]
    fn top_level_keys_added_and_removed() {
        let old = parse("jobs: []\ngroups: []\n");
        let new = parse("jobs: []\nvar_sources: []\n");
        assert_eq!(
            summarize(&old, &new),
            vec![
                ConfigChange {
                    path: "groups".into(),
                    kind: ChangeKind::Removed
                },
                ConfigChange {
                    path: "var_sources".into(),
                    kind: ChangeKind::Added
                },
            ]
        );
    }

    #[test]
    fn unnamed_sequences_change_as_a_whole() {
        let old = parse("jobs:\n- name: build\n  plan:\n  - get: a\n  - get: b\n");
        let new = parse("jobs:\n- name: build\n  plan:\n  - get: b\n  - get: a\n");
        assert!(differs(&old, &new));
        assert_eq!(rendered(&summarize(&old, &new)), "changed jobs.build.plan");
    }

    #[test]
    fn empty_versus_populated_reports_each_key() {
        let old = ParsedConfig::empty();
        let new = parse("jobs: []\nresources: []\n");
        assert_eq!(
            rendered(&summarize(&old, &new)),
            "added jobs; added resources"
        );
    }
}
