#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn coach(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("coach").unwrap();
    cmd.current_dir(dir.path())
        .env("COACH_ROOT", dir.path())
        .env_remove("COACH_USER");
    cmd
}

fn init_workspace(dir: &TempDir) {
    coach(dir).args(["init", "--name", "acme"]).assert().success();
}

fn json_of(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn new_protocol(dir: &TempDir, title: &str) -> String {
    let v = json_of(coach(dir).args([
        "protocol", "new", "--title", title, "--task", "1:1:Walk", "--task", "1:3:Journal",
    ]));
    v["id"].as_str().unwrap().to_string()
}

fn add_user(dir: &TempDir, id: &str) {
    coach(dir)
        .args(["user", "add", id, "--name", &format!("User {id}")])
        .assert()
        .success();
}

const RESET: &str = r##"
title: 8-Week Reset
theme_color: "#22c55e"
visibility:
  mode: tier_based
  tiers: [premium]
weeks:
  - theme: Foundations
    days:
      - day: 1
        tasks:
          - title: Morning pages
            type: reflection
            duration_minutes: 10
      - day: 3
        tasks:
          - title: Breathing
            type: action
  - days:
      - day: 7
        tasks:
          - title: Weekly review
"##;

// ---------------------------------------------------------------------------
// coach init / config
// ---------------------------------------------------------------------------

#[test]
fn init_creates_workspace() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    assert!(dir.path().join(".coach/config.yaml").exists());
    assert!(dir.path().join(".coach/coach.sqlite3").exists());
    assert!(dir.path().join(".coach/exports").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    coach(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().unwrap();
    coach(&dir)
        .args(["protocol", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

#[test]
fn config_validate_warns_without_webhook() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    coach(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"));
}

#[test]
fn config_validate_fails_on_bad_webhook() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let path = dir.path().join(".coach/config.yaml");
    let mut config: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    config["agent"]["webhook_url"] = serde_yaml::Value::from("hooks.example.com");
    std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

    coach(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}

// ---------------------------------------------------------------------------
// coach protocol
// ---------------------------------------------------------------------------

#[test]
fn protocol_new_list_show() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let id = new_protocol(&dir, "Sleep Basics");

    coach(&dir)
        .args(["protocol", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sleep Basics"));

    let shown = json_of(coach(&dir).args(["protocol", "show", &id]));
    assert_eq!(shown["stats"]["total_tasks"], 2);
    assert_eq!(shown["stats"]["days_with_tasks"], 2);
}

#[test]
fn protocol_new_without_tasks_fails() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    coach(&dir)
        .args(["protocol", "new", "--title", "Empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("task"));
}

#[test]
fn protocol_new_rejects_bad_task_spec() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    coach(&dir)
        .args(["protocol", "new", "--title", "X", "--task", "1:9:Never"])
        .assert()
        .failure();
}

#[test]
fn import_then_export() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let doc = dir.path().join("reset.yaml");
    std::fs::write(&doc, RESET).unwrap();

    let imported = json_of(coach(&dir).args(["protocol", "import", doc.to_str().unwrap()]));
    assert_eq!(imported["stats"]["total_weeks"], 2);
    assert_eq!(imported["stats"]["total_tasks"], 3);
    let id = imported["id"].as_str().unwrap();

    coach(&dir).args(["protocol", "export", id]).assert().success();
    let exported = dir.path().join(".coach/exports/8-week-reset.yaml");
    let text = std::fs::read_to_string(exported).unwrap();
    assert!(text.contains("Morning pages"));
    assert!(text.contains("tier_based"));

    let out = dir.path().join("copy.json");
    coach(&dir)
        .args(["protocol", "export", id, "--out", out.to_str().unwrap()])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(json["weeks"][1]["days"][0]["day"], 7);
}

#[test]
fn validate_document() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.yaml");
    std::fs::write(&good, RESET).unwrap();
    coach(&dir)
        .args(["protocol", "validate", good.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));

    let bad = dir.path().join("bad.yaml");
    std::fs::write(&bad, "title: Bad\nweeks:\n  - days:\n      - day: 8\n").unwrap();
    coach(&dir)
        .args(["protocol", "validate", bad.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid protocol"));
}

// ---------------------------------------------------------------------------
// coach assign
// ---------------------------------------------------------------------------

#[test]
fn assign_conflict_requires_override() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    for u in ["u1", "u2", "u3"] {
        add_user(&dir, u);
    }
    let first = new_protocol(&dir, "Morning");
    let second = new_protocol(&dir, "Evening");

    let outcome = json_of(coach(&dir).args(["assign", "run", &first, "--user", "u1", "--user", "u2"]));
    assert_eq!(outcome["success"], 2);

    let check = json_of(coach(&dir).args([
        "assign", "check", &second, "--user", "u1", "--user", "u2", "--user", "u3",
    ]));
    assert_eq!(check["conflicts"].as_array().unwrap().len(), 2);
    assert_eq!(check["can_assign_without_override"], false);

    coach(&dir)
        .args(["assign", "run", &second, "--user", "u1", "--user", "u2", "--user", "u3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--override"));

    let outcome = json_of(coach(&dir).args([
        "assign", "run", &second, "--user", "u1", "--user", "u2", "--user", "u3", "--override",
    ]));
    assert_eq!(outcome["success"], 3);
    assert_eq!(outcome["failed"], 0);

    let first_rows = json_of(coach(&dir).args(["assign", "list", &first]));
    assert!(first_rows.as_array().unwrap().is_empty());
}

#[test]
fn assign_by_group_and_track_progress() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    add_user(&dir, "u1");
    add_user(&dir, "u2");
    let group = json_of(coach(&dir).args(["group", "create", "Cohort A"]));
    let group_id = group["id"].as_str().unwrap().to_string();
    for u in ["u1", "u2"] {
        coach(&dir).args(["group", "add-member", &group_id, u]).assert().success();
    }
    let members = json_of(coach(&dir).args(["group", "members", &group_id]));
    assert_eq!(members, serde_json::json!(["u1", "u2"]));

    let id = new_protocol(&dir, "Cohort protocol");
    let outcome = json_of(coach(&dir).args(["assign", "run", &id, "--group", &group_id]));
    assert_eq!(outcome["success"], 2);
    let assignment = outcome["results"][0]["assignment_id"].as_str().unwrap().to_string();

    let updated = json_of(coach(&dir).args([
        "assign", "progress", &assignment, "--week", "1", "--day", "7",
    ]));
    assert_eq!(updated["status"], "completed");

    let rows = json_of(coach(&dir).args(["assign", "list", &id, "--all"]));
    let done = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["assignment_id"] == assignment.as_str())
        .unwrap();
    assert_eq!(done["progress_percent"], 100);
}

#[test]
fn abandon_assignment() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    add_user(&dir, "u1");
    let id = new_protocol(&dir, "Short");
    let outcome = json_of(coach(&dir).args(["assign", "run", &id, "--user", "u1"]));
    let assignment = outcome["results"][0]["assignment_id"].as_str().unwrap().to_string();

    coach(&dir)
        .args(["assign", "abandon", &assignment])
        .assert()
        .success()
        .stdout(predicate::str::contains("Abandoned"));
    coach(&dir)
        .args(["assign", "progress", &assignment, "--week", "1", "--day", "2"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// coach lesson
// ---------------------------------------------------------------------------

#[test]
fn lesson_tactics_reorder() {
    let dir = TempDir::new().unwrap();
    init_workspace(&dir);
    let lesson = json_of(coach(&dir).args(["lesson", "create", "--title", "Focus"]));
    let lesson_id = lesson["id"].as_str().unwrap().to_string();
    for t in ["One", "Two", "Three"] {
        coach(&dir)
            .args(["lesson", "add-tactic", &lesson_id, "--title", t])
            .assert()
            .success();
    }

    let moved = json_of(coach(&dir).args([
        "lesson", "reorder", &lesson_id, "--from", "3", "--to", "1",
    ]));
    let titles: Vec<&str> = moved
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Three", "One", "Two"]);

    coach(&dir)
        .args(["lesson", "reorder", &lesson_id, "--from", "9", "--to", "1"])
        .assert()
        .failure();
    let after = json_of(coach(&dir).args(["lesson", "tactics", &lesson_id]));
    assert_eq!(after[0]["title"], "Three");
}
