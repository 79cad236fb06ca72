// ABOUTME: Integration tests for the fieldhand CLI binary.
// ABOUTME: Covers extract and pick on HTML files, a full crawl against a mock site, and CSV export.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const DETAIL: &str = r#"<!DOCTYPE html>
<html>
<head><style>.tel::before { content: attr(data-phone); }</style></head>
<body>
<h1 class="name">Ali Veli</h1>
<div class="contact"><span class="tel" data-phone="0555 123 45 67"></span></div>
<p class="note">Prefers email</p>
</body>
</html>"#;

fn fieldhand_cmd() -> Command {
    let mut cmd = Command::cargo_bin("fieldhand").unwrap();
    cmd.env_remove("FIELDHAND_STORE_URL")
        .env_remove("FIELDHAND_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn extract_from_html_file() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("detail.html");
    fs::write(&html_path, DETAIL).unwrap();

    fieldhand_cmd()
        .arg("extract")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://crm.example.com/c/1")
        .arg("--map")
        .arg("full_name=h1.name")
        .arg("--map")
        .arg("phone=.contact .tel")
        .arg("--map")
        .arg("email=.missing")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""full_name": "Ali Veli""#))
        .stdout(predicate::str::contains(r#""phone": "0555 123 45 67""#))
        .stdout(predicate::str::contains(r#""email": """#));
}

#[test]
fn extract_uses_matching_site_config() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("detail.html");
    let config_path = temp_dir.path().join("sites.json");
    fs::write(&html_path, DETAIL).unwrap();
    fs::write(
        &config_path,
        r#"[
            {"id": "other", "site_name": "Other", "site_url": "https://other.org", "field_mappings": {"full_name": "p.note"}},
            {"id": "crm", "site_name": "CRM", "site_url": "crm.example.com", "field_mappings": {"full_name": "h1.name"}}
        ]"#,
    )
    .unwrap();

    fieldhand_cmd()
        .arg("extract")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://crm.example.com/c/1")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""full_name": "Ali Veli""#));
}

#[test]
fn extract_without_mapping_fails() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("detail.html");
    fs::write(&html_path, DETAIL).unwrap();

    fieldhand_cmd()
        .arg("extract")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://crm.example.com/c/1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty field mapping"));
}

#[test]
fn pick_synthesizes_selector() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("detail.html");
    fs::write(&html_path, DETAIL).unwrap();

    fieldhand_cmd()
        .arg("pick")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://crm.example.com/c/1")
        .arg("--selector")
        .arg("div span")
        .arg("--field")
        .arg("phone")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""selector": "span.tel""#))
        .stdout(predicate::str::contains(r#""sample_value": "0555 123 45 67""#));
}

#[test]
fn crawl_mock_site_to_jsonl() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/customers");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(
                r#"<table><tr class="row"><td><a href="/c/1">1</a></td></tr>
                   <tr class="row"><td><a href="/c/2">2</a></td></tr></table>"#,
            );
    });
    let first = server.mock(|when, then| {
        when.method(GET).path("/c/1");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(DETAIL);
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/c/2");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(r#"<h1 class="name">No Phone</h1>"#);
    });

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("records.jsonl");
    let checkpoint = temp_dir.path().join("crawl.json");

    fieldhand_cmd()
        .arg("crawl")
        .arg("--url")
        .arg(server.url("/customers"))
        .arg("--allow-private-networks")
        .arg("--map")
        .arg("full_name=h1.name")
        .arg("--map")
        .arg("phone=.tel")
        .arg("--map")
        .arg("customer_list=tr.row")
        .arg("--config-id")
        .arg("crm")
        .arg("--output")
        .arg(&output)
        .arg("--checkpoint")
        .arg(&checkpoint)
        .arg("--settle-ms")
        .arg("0")
        .arg("--pacing-ms")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/2] visiting"))
        .stdout(predicate::str::contains("saved: Ali Veli (0555 123 45 67)"))
        .stdout(predicate::str::contains("skipped: no phone"))
        .stdout(predicate::str::contains("finished: 1/2 records saved"));

    list.assert();
    first.assert();
    second.assert();

    let records = fs::read_to_string(&output).unwrap();
    assert_eq!(records.lines().count(), 1);
    assert!(records.contains(r#""site_config_id":"crm""#));
    assert!(!checkpoint.exists());
}

#[test]
fn crawl_requires_a_store() {
    let temp_dir = TempDir::new().unwrap();
    let html_path = temp_dir.path().join("list.html");
    fs::write(&html_path, r#"<a class="c" href="/c/1">1</a>"#).unwrap();

    fieldhand_cmd()
        .arg("crawl")
        .arg("--html")
        .arg(&html_path)
        .arg("--url")
        .arg("https://crm.example.com/list")
        .arg("--map")
        .arg("phone=.tel")
        .arg("--list-selector")
        .arg("a.c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("choose a record store"));
}

#[test]
fn resume_without_checkpoint_fails() {
    let temp_dir = TempDir::new().unwrap();

    fieldhand_cmd()
        .arg("crawl")
        .arg("--resume")
        .arg("--output")
        .arg(temp_dir.path().join("records.jsonl"))
        .arg("--checkpoint")
        .arg(temp_dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no running crawl to resume"));
}

#[test]
fn export_writes_csv_with_site_names() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("records.jsonl");
    let config = temp_dir.path().join("site.json");
    let output = temp_dir.path().join("out.csv");

    fs::write(
        &input,
        concat!(
            r#"{"id":"1","site_config_id":"crm","full_name":"Ali Veli","email":"ali@example.com","phone":"0555 123 45 67","address":"","notes":"vip","source_url":"https://crm.example.com/c/1","created_at":"2024-05-01T10:00:00Z"}"#,
            "\n",
            r#"{"id":"2","site_config_id":"crm","full_name":"No Phone","email":"","phone":"","address":"","notes":"","source_url":"https://crm.example.com/c/2","created_at":"2024-05-01T10:00:01Z"}"#,
            "\n"
        ),
    )
    .unwrap();
    fs::write(
        &config,
        r#"{"id": "crm", "site_name": "CRM", "site_url": "https://crm.example.com", "field_mappings": {}}"#,
    )
    .unwrap();

    fieldhand_cmd()
        .arg("export")
        .arg("--input")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(
        csv,
        "\u{feff}Full Name,Email,Phone,Address,Notes\n\"Ali Veli\",\"ali@example.com\",\"+90 555 123 45 67\",\"\",\"CRM - vip\""
    );
}
