use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tracing::info;

fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .expect("Failed to find workspace root")
        .join("testdata")
        .join("scenarios")
        .join(name)
}

fn hotedit() -> Command {
    let mut cmd = Command::cargo_bin("hotedit").unwrap();
    cmd.env_remove("HOTEDIT_CONFIG").arg("--no-file-log");
    cmd
}

#[test]
fn test_help_command() {
    hotedit_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    let mut cmd = Command::cargo_bin("hotedit").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active statement tracking"));
}

#[test]
fn test_version_command() {
    hotedit_common::logging::ensure_test_logging(None);
    let mut cmd = Command::cargo_bin("hotedit").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("hotedit"));
}

#[test]
fn test_missing_subcommand() {
    hotedit_common::logging::ensure_test_logging(None);
    let mut cmd = Command::cargo_bin("hotedit").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_check_scenario() {
    hotedit_common::logging::ensure_test_logging(None);
    hotedit()
        .arg("check")
        .arg(scenario("a_cs.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (2 documents, 7 steps)"));
}

#[test]
fn test_check_rejects_invalid_scenario() {
    hotedit_common::logging::ensure_test_logging(None);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[[steps]]\naction = \"query\"\npath = \"/missing.cs\"\n").unwrap();

    hotedit()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown document"));

    let path = dir.path().join("grown.toml");
    std::fs::write(
        &path,
        r#"
[[documents]]
path = "/a.cs"
text = "a();\nb();\n"
spans = [{ ordinal = 0, span = "0:0-0:4", flags = "leaf-frame" }]

[[steps]]
action = "adjust"
path = "/a.cs"
spans = [
    { ordinal = 0, span = "0:0-0:4", flags = "leaf-frame" },
    { ordinal = 1, span = "1:0-1:4", flags = "leaf-frame" },
]
"#,
    )
    .unwrap();

    for command in ["check", "replay"] {
        hotedit()
            .arg(command)
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("the adjustment reports 2"))
            .stderr(predicate::str::contains("panicked").not());
    }
}

#[test]
fn test_replay_a_cs() {
    hotedit_common::logging::ensure_test_logging(None);
    info!("Replaying the A.cs scenario");

    hotedit()
        .arg("replay")
        .arg(scenario("a_cs.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("step 0 query /src/A.cs: 1 active statement(s)"))
        .stdout(predicate::str::contains("#0 [(10,8)-(10,29)) leaf-frame"))
        .stdout(predicate::str::contains("#0 [(11,8)-(11,29)) leaf-frame"))
        .stdout(predicate::str::contains("#0 [(4,8)-(4,25)) method-up-to-date|non-leaf-frame"))
        .stdout(predicate::str::contains("step 5 query /src/A.cs: 0 active statement(s)"));
}

#[test]
fn test_replay_json_output() {
    hotedit_common::logging::ensure_test_logging(None);
    let output =
        hotedit().arg("replay").arg("--json").arg(scenario("late_open.toml")).output().unwrap();
    assert!(output.status.success());

    let reports = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0]["step"], 0);
    assert_eq!(reports[0]["spans"].as_array().unwrap().len(), 0);
    assert_eq!(reports[1]["action"], "adjust");
    assert_eq!(reports[2]["spans"][0]["line_span"]["start"]["line"], 3);
    assert_eq!(reports[2]["spans"][0]["flags"], "leaf-frame|partially-executed");
}

#[test]
fn test_replay_with_config_file() {
    hotedit_common::logging::ensure_test_logging(None);
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("hotedit.toml");
    std::fs::write(&config, "track_opened_documents = false\n").unwrap();

    // C.cs is only opened after tracking started, so nothing is tracked
    hotedit()
        .arg("replay")
        .arg("--config")
        .arg(&config)
        .arg(scenario("late_open.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("step 4 query /src/C.cs: 0 active statement(s)"));
}

#[test]
fn test_replay_missing_file() {
    hotedit_common::logging::ensure_test_logging(None);
    hotedit()
        .arg("replay")
        .arg("/definitely/not/here.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario file"));
}
