#![allow(deprecated)]
use assert_cmd::Command;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn coffee(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("coffee").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("COFFEE_CONFIG")
        .env_remove("AIRTABLE_API_KEY")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("coffee.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

fn store_config(dir: &TempDir, store_url: &str) -> PathBuf {
    write_config(
        dir,
        &format!(
            "store:\n  base_url: \"{store_url}/v0\"\n  base_id: appTEST\n  batch_pause_ms: 0\n\
             gateway:\n  send_pause_ms: 0\n\
             pools:\n  pause_ms: 0\n\
             journal:\n  path: state/journal.redb\n"
        ),
    )
}

// ---------------------------------------------------------------------------
// CLI surface
// ---------------------------------------------------------------------------

#[test]
fn help_lists_every_job() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("match-all")
                .and(predicate::str::contains("invite"))
                .and(predicate::str::contains("midweek"))
                .and(predicate::str::contains("weekend"))
                .and(predicate::str::contains("sweep"))
                .and(predicate::str::contains("runs")),
        );
}

#[test]
fn dry_run_and_test_are_mutually_exclusive() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .args(["--dry-run", "--test", "midweek"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn malformed_week_start_is_rejected() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .args(["--week-start", "04/03/2024", "sweep"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected YYYY-MM-DD"));
}

#[test]
fn bad_community_slug_is_rejected() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .args(["--dry-run", "match", "--community", "Not A Slug"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --community"));
}

// ---------------------------------------------------------------------------
// coffee config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_fails_without_base_id() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] store.base_id is empty"));
}

#[test]
fn config_validate_passes_with_warnings_only() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "store:\n  base_id: appXYZ\n");
    coffee(&dir)
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning] admin.chat_id"));
}

#[test]
fn config_show_includes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "admin:\n  chat_id: \"777\"\n");
    coffee(&dir)
        .arg("--config")
        .arg(&path)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"pairings\": \"Pairings\"")
                .and(predicate::str::contains("\"chat_id\": \"777\""))
                .and(predicate::str::contains("\"reactivate_engaged\": false")),
        );
}

// ---------------------------------------------------------------------------
// Startup failures
// ---------------------------------------------------------------------------

#[test]
fn live_run_without_store_key_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "store:\n  base_id: appXYZ\n");
    coffee(&dir)
        .arg("--config")
        .arg(&path)
        .arg("match")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AIRTABLE_API_KEY"));
}

#[test]
fn test_mode_requires_an_admin() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "store:\n  base_id: appXYZ\n");
    coffee(&dir)
        .arg("--config")
        .arg(&path)
        .env("AIRTABLE_API_KEY", "key")
        .env("TELEGRAM_BOT_TOKEN", "token")
        .args(["--test", "invite"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("admin.chat_id"));
}

// ---------------------------------------------------------------------------
// Jobs against a mocked store
// ---------------------------------------------------------------------------

#[test]
fn dry_run_match_pairs_without_writing_and_is_journaled() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let config = store_config(&dir, &server.url());

    let pairings = server
        .mock("GET", "/v0/appTEST/Pairings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"records":[]}"#)
        .create();
    let participants = server
        .mock("GET", "/v0/appTEST/Participants")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"records":[
                {"id":"recAna","fields":{"Name":"Ana","Telegram_ID":"101","Consent":true,
                 "Next_Week_Status":"Active","Matching_Context":"global"}},
                {"id":"recBo","fields":{"Name":"Bo","Telegram_ID":"102","Consent":true,
                 "Next_Week_Status":"Active"}}
            ]}"#,
        )
        .create();
    let audit = server
        .mock("POST", "/v0/appTEST/Notification_Logs")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""Status":"Dry-Run""#.to_string()),
            Matcher::Regex(r#""Script":"match""#.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"records":[{"id":"recLog","fields":{}}]}"#)
        .expect(2)
        .create();
    let writes = server
        .mock("POST", "/v0/appTEST/Pairings")
        .expect(0)
        .create();

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .env("AIRTABLE_API_KEY", "test-key")
        .args(["--dry-run", "--json", "--week-start", "2024-03-06", "match", "--seed", "7"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"week_start\": \"2024-03-04\"")
                .and(predicate::str::contains("recAna"))
                .and(predicate::str::contains("recBo"))
                .and(predicate::str::contains("\"pairing_id\": null"))
                .and(predicate::str::contains("\"dry_run\": 2")),
        );

    pairings.assert();
    participants.assert();
    audit.assert();
    writes.assert();

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .arg("runs")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("match")
                .and(predicate::str::contains("dry_run"))
                .and(predicate::str::contains("completed")),
        );
}

#[test]
fn match_all_fails_when_communities_cannot_be_listed() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let config = store_config(&dir, &server.url());
    server
        .mock("GET", "/v0/appTEST/Communities")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream unavailable")
        .create();

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .env("AIRTABLE_API_KEY", "test-key")
        .args(["--dry-run", "match-all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("match-all failed").and(predicate::str::contains("503")));

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn match_all_with_a_failed_pool_exits_nonzero_and_is_journaled_as_failed() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new();
    let config = store_config(&dir, &server.url());
    server
        .mock("GET", "/v0/appTEST/Communities")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"records":[]}"#)
        .create();
    server
        .mock("GET", "/v0/appTEST/Participants")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"records":[]}"#)
        .create();
    server
        .mock("GET", "/v0/appTEST/Pairings")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream unavailable")
        .create();

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .env("AIRTABLE_API_KEY", "test-key")
        .args(["--dry-run", "--json", "match-all"])
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("\"global_matched\": false")
                .and(predicate::str::contains("\"errors\": [")),
        )
        .stderr(predicate::str::contains("matching failed for global"));

    coffee(&dir)
        .arg("--config")
        .arg(&config)
        .arg("runs")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("match-all")
                .and(predicate::str::contains("failed"))
                .and(predicate::str::contains("completed").not()),
        );
}

#[test]
fn runs_on_a_fresh_journal_is_empty() {
    let dir = TempDir::new().unwrap();
    coffee(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded."));
}
