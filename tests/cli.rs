use assert_cmd::Command;
use std::time::Instant;

use flowboard::editor::EditorSession;
use flowboard::{export, FlowchartStore, NodeKind, Position};

fn seed_store(dir: &std::path::Path) -> String {
    let mut store = FlowchartStore::on_disk(dir).unwrap();
    let mut session = EditorSession::new("feat-login");
    let now = Instant::now();
    let a = session.drop_node(NodeKind::Start, Position::new(0.0, 0.0), now);
    let b = session.drop_node(NodeKind::End, Position::new(200.0, 0.0), now);
    session.connect(&a, None, &b, None, now).unwrap();
    session.rename("Login Flow").unwrap();
    session.save(&mut store).unwrap();
    session.chart().unwrap().id.clone()
}

#[test]
fn list_shows_saved_flowcharts() {
    let dir = tempfile::TempDir::new().unwrap();
    let id = seed_store(dir.path());

    let mut cmd = Command::cargo_bin("flowboard").unwrap();
    cmd.args([
        "list",
        "--feature",
        "feat-login",
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]);
    let assert = cmd.assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(output.contains(&id));
    assert!(output.contains("Login Flow"));
    assert!(output.contains("2 nodes"));
}

#[test]
fn show_prints_reimportable_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let id = seed_store(dir.path());

    let mut cmd = Command::cargo_bin("flowboard").unwrap();
    cmd.args([
        "show",
        "--feature",
        "feat-login",
        "--id",
        &id,
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]);
    let assert = cmd.assert().success();
    let json = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let chart = export::import_json(&json).unwrap();
    assert_eq!(chart.name, "Login Flow");
    assert_eq!(chart.edges.len(), 1);
}

#[test]
fn create_makes_an_empty_flowchart() {
    let dir = tempfile::TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("flowboard").unwrap();
    cmd.args([
        "create",
        "--feature",
        "feat-signup",
        "--name",
        "Signup Flow",
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]);
    cmd.assert().success();

    let store = FlowchartStore::on_disk(dir.path()).unwrap();
    let items = store.list("feat-signup").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Signup Flow");
    assert_eq!(items[0].node_count, 0);
}

#[test]
fn rename_updates_the_saved_name() {
    let dir = tempfile::TempDir::new().unwrap();
    let id = seed_store(dir.path());

    let mut cmd = Command::cargo_bin("flowboard").unwrap();
    cmd.args([
        "rename",
        "--feature",
        "feat-login",
        "--id",
        &id,
        "--name",
        "Login v2",
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]);
    cmd.assert().success();

    let store = FlowchartStore::on_disk(dir.path()).unwrap();
    assert_eq!(store.load("feat-login", &id).unwrap().name, "Login v2");
}

#[test]
fn export_refuses_unknown_id() {
    let dir = tempfile::TempDir::new().unwrap();
    seed_store(dir.path());

    let mut cmd = Command::cargo_bin("flowboard").unwrap();
    cmd.args([
        "export",
        "--feature",
        "feat-login",
        "--id",
        "flow-missing",
        "--data-dir",
        dir.path().to_str().unwrap(),
    ]);
    cmd.assert().failure();
}
