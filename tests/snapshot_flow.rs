use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

const TODAY: &str = "2025-01-20";

fn outlook_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("outlook"))
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) {
    let mut cmd = outlook_cmd();
    cmd.env("OUTLOOK_HOME", home.path());
    cmd.env("OUTLOOK_TODAY", TODAY);
    cmd.args(args);
    cmd.assert().success();
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let mut cmd = outlook_cmd();
    cmd.env("OUTLOOK_HOME", home.path());
    cmd.env("OUTLOOK_TODAY", TODAY);
    cmd.args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

fn seed(home: &tempfile::TempDir) {
    run_ok(home, &["savings", "set", "2500"]);
    run_ok(home, &["income", "add", "3100", "--monthly", "--date", "2025-01-01", "-d", "Salary"]);
    run_ok(home, &["expense", "add", "1100", "--monthly", "--date", "2024-09-01", "-d", "Rent"]);
    run_ok(home, &["invest", "add", "200", "--monthly", "--annual-return", "7", "--date", "2025-02-01"]);
    run_ok(home, &["alloc", "add", "8000", "--annual-return", "4"]);
    run_ok(
        home,
        &["loan", "give", "Ana", "600", "--start", "2025-01-15", "--monthly", "150", "--end", "2025-05-15"],
    );
}

#[test]
fn export_then_import_reproduces_the_projection() {
    let source = tempfile::tempdir().expect("tempdir");
    seed(&source);
    let before = run_ok_out(&source, &["project", "--months", "36", "--format", "tsv"]);

    let file = source.path().join("backup").join("outlook.json");
    let file_arg = file.to_str().expect("utf8 path");
    run_ok(&source, &["export", file_arg]);

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&file).expect("read export")).expect("json");
    assert_eq!(doc["version"], "1.2");
    assert!(doc["exportDate"].as_str().is_some());
    for key in [
        "incomeEntries",
        "expenseEntries",
        "loansGiven",
        "loansTaken",
        "investmentEntries",
        "realizedEntries",
        "portfolioAllocations",
    ] {
        assert!(doc[key].is_array(), "{key} missing from export");
    }
    assert_eq!(doc["loansGiven"][0]["mode"], "monthly");
    assert_eq!(doc["incomeEntries"][0]["type"], "monthly");

    let target = tempfile::tempdir().expect("tempdir");
    run_ok(&target, &["import", file_arg]);
    let after = run_ok_out(&target, &["project", "--months", "36", "--format", "tsv"]);
    assert_eq!(before, after);
}

#[test]
fn import_without_required_collection_changes_nothing() {
    let home = tempfile::tempdir().expect("tempdir");
    run_ok(&home, &["income", "add", "42", "-d", "Keep me"]);

    let file = home.path().join("broken.json");
    fs::write(
        &file,
        r#"{"incomeEntries": [], "expenseEntries": [], "loansTaken": []}"#,
    )
    .expect("write");

    outlook_cmd()
        .env("OUTLOOK_HOME", home.path())
        .args(["import", file.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid data format: missing loansGiven"));

    let list = run_ok_out(&home, &["income", "list"]);
    assert!(list.contains("Keep me"));
}

#[test]
fn legacy_document_is_migrated_on_import() {
    let home = tempfile::tempdir().expect("tempdir");
    let file = home.path().join("legacy.json");
    fs::write(
        &file,
        r#"{
            "incomeEntries": [
                {"id": 1700000000000, "amount": "1500", "description": "Salary", "date": "2024-12-01", "type": "monthly"}
            ],
            "expenseEntries": [
                {"id": 1700000000001, "amount": "abc", "description": "Typo", "date": "2025-01-03"}
            ],
            "loansGiven": [
                {"id": 1700000000002, "person": "Li", "startDate": "2025-01-05", "totalSum": 90, "mode": "weekly"}
            ],
            "loansTaken": [],
            "startingSavings": "1000",
            "initialInvestmentValue": 5000
        }"#,
    )
    .expect("write");

    run_ok(&home, &["import", file.to_str().expect("utf8 path")]);

    let allocs = run_ok_out(&home, &["alloc", "list"]);
    assert!(allocs.contains("Initial Investment"));
    assert!(allocs.contains("5000.00"));
    assert!(allocs.contains("0%"));

    let out = run_ok_out(&home, &["project", "--months", "1", "--format", "json"]);
    let rows: Vec<serde_json::Value> = serde_json::from_str(&out).expect("json");
    assert_eq!(rows[0]["income"].as_f64(), Some(1500.0));
    assert_eq!(rows[0]["expenses"].as_f64(), Some(0.0));
    assert_eq!(rows[0]["netLoans"].as_f64(), Some(0.0));
    assert_eq!(rows[0]["total"].as_f64(), Some(2500.0));
    assert_eq!(rows[0]["totalWorth"].as_f64(), Some(7500.0));

    let loans = run_ok_out(&home, &["loan", "list"]);
    assert!(loans.contains("unknown"));

    let export = home.path().join("again.json");
    run_ok(&home, &["export", export.to_str().expect("utf8 path")]);
    let raw = fs::read_to_string(&export).expect("read export");
    assert!(!raw.contains("initialInvestmentValue"));
    assert!(raw.contains("\"1700000000000\""));
}

#[test]
fn import_with_bad_date_is_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    let file = home.path().join("bad-date.json");
    fs::write(
        &file,
        r#"{"incomeEntries": [{"id": "x", "amount": 1, "date": "not-a-date"}],
            "expenseEntries": [], "loansGiven": [], "loansTaken": []}"#,
    )
    .expect("write");

    outlook_cmd()
        .env("OUTLOOK_HOME", home.path())
        .args(["import", file.to_str().expect("utf8 path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}
