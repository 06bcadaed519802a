#![allow(clippy::unwrap_used)]
// Manifest loading and state persistence on a real filesystem.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use flyform_config::{ConfigError, Manifest, State, load_state, save_state};
use flyform_core::reconcile::{pipeline, team};
use flyform_core::testing::InMemoryConcourse;

const MANIFEST: &str = r#"
[[teams]]
name = "ops"
auth_users = ["alice"]

[[pipelines]]
team = "ops"
name = "build"
paused = true
config_file = "pipelines/build.yml"

[[pipelines]]
team = "ops"
name = "lint"
config = "jobs: []\n"
"#;

const BUILD: &str = "jobs:\n- name: test\n  plan: []\n";

// ── Helpers ─────────────────────────────────────────────────────────

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pipelines")).unwrap();
    fs::write(dir.path().join("pipelines/build.yml"), BUILD).unwrap();
    fs::write(dir.path().join("flyform.toml"), MANIFEST).unwrap();
    dir
}

// ── Manifest ────────────────────────────────────────────────────────

#[test]
fn test_manifest_fills_defaults() {
    let dir = workspace();

    let manifest = Manifest::load(&dir.path().join("flyform.toml")).unwrap();

    assert_eq!(manifest.teams.len(), 1);
    assert!(manifest.teams[0].auth_groups.is_empty());
    assert!(manifest.pipelines[0].paused);
    assert!(!manifest.pipelines[0].public);
    assert!(!manifest.pipelines[1].paused);
}

#[test]
fn test_pipeline_records_read_config_files_relative_to_manifest() {
    let dir = workspace();
    let manifest = Manifest::load(&dir.path().join("flyform.toml")).unwrap();

    let records = manifest.pipeline_records().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].config.as_str(), BUILD);
    assert!(records[0].paused);
    assert_eq!(records[1].config.as_str(), "jobs: []\n");
    assert!(records.iter().all(|r| r.id.is_none()));
}

#[test]
fn test_team_records_carry_member_auth() {
    let dir = workspace();
    let manifest = Manifest::load(&dir.path().join("flyform.toml")).unwrap();

    let records = manifest.team_records();

    assert_eq!(records[0].name, "ops");
    assert_eq!(records[0].auth_users, vec!["alice".to_owned()]);
}

#[test]
fn test_missing_manifest_is_reported() {
    let dir = TempDir::new().unwrap();

    let err = Manifest::load(&dir.path().join("flyform.toml")).unwrap_err();

    assert!(matches!(err, ConfigError::MissingManifest { .. }));
}

#[test]
fn test_missing_config_file_names_the_path() {
    let dir = workspace();
    fs::remove_file(dir.path().join("pipelines/build.yml")).unwrap();
    let manifest = Manifest::load(&dir.path().join("flyform.toml")).unwrap();

    let err = manifest.pipeline_records().unwrap_err();

    let ConfigError::ConfigFile { path, .. } = &err else {
        panic!("expected ConfigFile, got: {err:?}");
    };
    assert!(path.ends_with("pipelines/build.yml"));
}

#[test]
fn test_empty_team_name_fails_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flyform.toml");
    fs::write(&path, "[[teams]]\nname = \"\"\n").unwrap();

    let err = Manifest::load(&path).unwrap_err();

    assert_eq!(err.to_string(), "invalid teams[0].name: must not be empty");
}

#[test]
fn test_malformed_manifest_is_a_loading_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flyform.toml");
    fs::write(&path, "[[teams]\nname = ").unwrap();

    let err = Manifest::load(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Figment(_)), "got: {err:?}");
}

// ── State ───────────────────────────────────────────────────────────

#[test]
fn test_absent_state_file_loads_empty() {
    let dir = TempDir::new().unwrap();

    let state = load_state(&dir.path().join("state.toml")).unwrap();

    assert_eq!(state, State::default());
}

#[test]
fn test_observed_records_survive_a_save_and_load() {
    let dir = workspace();
    let manifest = Manifest::load(&dir.path().join("flyform.toml")).unwrap();
    let concourse = InMemoryConcourse::new();

    let teams = manifest
        .team_records()
        .iter()
        .map(|desired| team::create(&concourse, desired).unwrap())
        .collect::<Vec<_>>();
    let pipelines = manifest
        .pipeline_records()
        .unwrap()
        .iter()
        .map(|desired| pipeline::create(&concourse, desired).unwrap())
        .collect::<Vec<_>>();

    let mut state = State::default();
    state.merge_observed(teams, pipelines);
    let path = dir.path().join("nested/state/state.toml");
    save_state(&path, &state).unwrap();

    let loaded = load_state(&path).unwrap();
    assert_eq!(loaded, state);

    let build = loaded.pipeline("ops", "build").unwrap();
    assert_eq!(build.config_version.as_ref().unwrap().as_str(), "1");
    assert_eq!(pipeline::read(&concourse, build).unwrap().as_ref(), Some(build));
}
