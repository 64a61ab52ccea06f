//! CLI integration tests for pspm.
//!
//! These tests only exercise offline flows: local skills, linking,
//! removal, and input validation. Registry and GitHub paths are covered
//! by unit tests against in-memory fakes.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the pspm binary command.
fn pspm() -> Command {
    Command::cargo_bin("pspm").unwrap()
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// Lay out a local skill directory next to the project.
fn make_skill(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("SKILL.md"), format!("# {name}\n")).unwrap();
}

fn make_project(root: &Path) -> std::path::PathBuf {
    let project = root.join("project");
    fs::create_dir_all(&project).unwrap();
    project
}

// ============================================================================
// pspm add (local skills)
// ============================================================================

#[test]
fn test_add_local_skill() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    pspm()
        .args(["add", "../my-skill", "--agent", "claude-code"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("file:../my-skill local"));

    // manifest, lockfile, store symlink, and agent link all exist
    assert!(project.join("pspm.json").exists());
    let lock = fs::read_to_string(project.join("pspm-lock.json")).unwrap();
    assert!(lock.contains("\"localPackages\""));
    assert!(lock.contains("\"lockfileVersion\": 5"));

    let store = project.join(".pspm/skills/_local/my-skill");
    assert!(fs::symlink_metadata(&store).unwrap().file_type().is_symlink());

    let agent_link = project.join(".claude/skills/my-skill");
    assert!(fs::symlink_metadata(&agent_link)
        .unwrap()
        .file_type()
        .is_symlink());
    assert!(agent_link.join("SKILL.md").exists());
}

#[test]
fn test_add_bare_path_normalises_to_file_key() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "tools");

    pspm()
        .args(["add", "../tools", "--agent", "none"])
        .current_dir(&project)
        .assert()
        .success();

    let manifest = fs::read_to_string(project.join("pspm.json")).unwrap();
    assert!(manifest.contains("\"file:../tools\""));
}

#[test]
fn test_add_invalid_specifier_fails() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());

    pspm()
        .args(["add", "definitely not a specifier"])
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("definitely not a specifier"));

    assert!(!project.join("pspm.json").exists());
    assert!(!project.join("pspm-lock.json").exists());
}

#[test]
fn test_add_missing_local_path_fails() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());

    pspm()
        .args(["add", "./nowhere"])
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_add_rejects_non_skill_directory() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    fs::create_dir_all(tmp.path().join("plain-dir")).unwrap();

    pspm()
        .args(["add", "../plain-dir"])
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("SKILL.md"));
}

// ============================================================================
// pspm install
// ============================================================================

#[test]
fn test_install_reproduces_local_deps_from_manifest() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    pspm()
        .args(["add", "../my-skill", "--agent", "none"])
        .current_dir(&project)
        .assert()
        .success();

    // wipe the store and relink directories, keep manifest + lockfile
    fs::remove_dir_all(project.join(".pspm/skills")).unwrap();

    pspm()
        .args(["install", "--agent", "codex"])
        .current_dir(&project)
        .assert()
        .success();

    assert!(project.join(".codex/skills/my-skill").join("SKILL.md").exists());
}

#[test]
fn test_install_frozen_fails_on_stale_lockfile() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());

    // manifest declares a dependency; no lockfile entry pins it
    fs::write(
        project.join("pspm.json"),
        r#"{ "dependencies": { "@user/alice/a": "^1.0.0" } }
"#,
    )
    .unwrap();
    fs::write(
        project.join("pspm-lock.json"),
        r#"{ "lockfileVersion": 2, "registryUrl": "https://pspm.dev" }
"#,
    )
    .unwrap();

    pspm()
        .args(["install", "--frozen-lockfile"])
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("@user/alice/a"))
        .stderr(predicate::str::contains("frozen-lockfile"));
}

#[test]
fn test_install_nothing_to_do_succeeds() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());

    pspm()
        .args(["install", "--agent", "none"])
        .current_dir(&project)
        .assert()
        .success();
}

// ============================================================================
// pspm remove
// ============================================================================

#[test]
fn test_remove_local_skill() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    pspm()
        .args(["add", "../my-skill", "--agent", "claude-code"])
        .current_dir(&project)
        .assert()
        .success();

    pspm()
        .args(["remove", "my-skill"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("- file:../my-skill"));

    let manifest = fs::read_to_string(project.join("pspm.json")).unwrap();
    assert!(!manifest.contains("my-skill"));
    assert!(fs::symlink_metadata(project.join(".pspm/skills/_local/my-skill")).is_err());
    assert!(fs::symlink_metadata(project.join(".claude/skills/my-skill")).is_err());
    // the source directory is untouched
    assert!(tmp.path().join("my-skill/SKILL.md").exists());
}

#[test]
fn test_remove_unknown_fails() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());

    pspm()
        .args(["remove", "ghost"])
        .current_dir(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

// ============================================================================
// pspm link
// ============================================================================

#[test]
fn test_link_rebuilds_agent_directories() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    pspm()
        .args(["add", "../my-skill", "--agent", "cursor"])
        .current_dir(&project)
        .assert()
        .success();

    fs::remove_dir_all(project.join(".cursor")).unwrap();

    pspm()
        .args(["link", "--agent", "cursor"])
        .current_dir(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 link(s) updated"));

    assert!(project.join(".cursor/skills/my-skill/SKILL.md").exists());
}

#[test]
fn test_link_respects_manifest_agent_override() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    pspm()
        .args(["add", "../my-skill", "--agent", "none"])
        .current_dir(&project)
        .assert()
        .success();

    // redirect claude-code through a manifest override
    let manifest = fs::read_to_string(project.join("pspm.json")).unwrap();
    let mut parsed: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    parsed["agents"] = serde_json::json!({ "claude-code": { "skillsDir": "custom/skills" } });
    fs::write(
        project.join("pspm.json"),
        serde_json::to_string_pretty(&parsed).unwrap(),
    )
    .unwrap();

    pspm()
        .args(["link", "--agent", "claude-code"])
        .current_dir(&project)
        .assert()
        .success();

    assert!(project.join("custom/skills/my-skill/SKILL.md").exists());
    assert!(!project.join(".claude").exists());
}

// ============================================================================
// lockfile migration
// ============================================================================

#[test]
fn test_legacy_lockfile_renamed_on_next_write() {
    let tmp = temp_dir();
    let project = make_project(tmp.path());
    make_skill(tmp.path(), "my-skill");

    fs::write(
        project.join("skill-lock.json"),
        r#"{ "lockfileVersion": 1, "skills": {} }
"#,
    )
    .unwrap();

    pspm()
        .args(["add", "../my-skill", "--agent", "none"])
        .current_dir(&project)
        .assert()
        .success();

    assert!(project.join("pspm-lock.json").exists());
    assert!(!project.join("skill-lock.json").exists());
}
