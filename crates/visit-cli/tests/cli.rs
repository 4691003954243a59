use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serde_json::Value;

fn fixture(name: &str) -> &'static str {
    match name {
        "visit_row" => include_str!("fixtures/visit_row.yml"),
        "visits" => include_str!("fixtures/visits.json"),
        "labels_fr" => include_str!("fixtures/labels_fr.yml"),
        _ => panic!("unknown fixture {}", name),
    }
}

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        temp.child("visit_row.yml")
            .write_str(fixture("visit_row"))
            .expect("layout");
        temp.child("visits.json")
            .write_str(fixture("visits"))
            .expect("records");
        temp.child("labels_fr.yml")
            .write_str(fixture("labels_fr"))
            .expect("labels");
        Self { temp }
    }

    fn path(&self, name: &str) -> String {
        self.temp.path().join(name).display().to_string()
    }

    fn render(&self) -> Command {
        let mut cmd = binary();
        cmd.args([
            "render",
            "--config",
            self.path("visit_row.yml").as_str(),
            "--records",
            self.path("visits.json").as_str(),
            "--page-size",
            "2",
        ]);
        cmd
    }
}

fn binary() -> Command {
    Command::cargo_bin("visit-summary").expect("binary")
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf8 stdout")
}

fn stderr_of_failure(cmd: &mut Command) -> String {
    let output = cmd.assert().failure().get_output().stderr.clone();
    String::from_utf8(output).expect("utf8 stderr")
}

#[test]
fn renders_newest_page_as_text() {
    let workspace = Workspace::new();
    let stdout = stdout_of(&mut workspace.render());

    assert!(stdout.starts_with("# visit_date"));
    assert!(stdout.contains("5 Dec 2019"));
    assert!(stdout.contains("20 Nov 2019"));
    assert!(!stdout.contains("1 Oct 2019"));
    assert!(stdout.contains("## diagnosis"));
    assert!(stdout.contains("   Diagnosis: Fever"));
    assert!(stdout.contains("!  Treatment: Paracetamol (500mg. 3 days)"));
    assert!(stdout.contains("Malaria RDT: Negative"));
    assert!(stdout.trim_end().ends_with("Page 1 of 2"));
}

#[test]
fn renders_last_page_as_json() {
    let workspace = Workspace::new();
    let stdout = stdout_of(workspace.render().args(["--page", "2", "--format", "json"]));
    let output: Value = serde_json::from_str(&stdout).expect("json output");

    assert_eq!(output["page"], 2);
    assert_eq!(output["total_pages"], 2);
    assert_eq!(output["has_next"], false);
    assert_eq!(output["has_previous"], true);
    assert_eq!(output["counter"], "Page 2 of 2");

    let visits = output["visits"].as_array().expect("visits");
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0]["items"][0]["kind"], "group");
    assert_eq!(visits[0]["items"][1]["key"], "visit_date");
    assert_eq!(visits[0]["items"][1]["text"], "1 Oct 2019");
}

#[test]
fn label_overrides_apply() {
    let workspace = Workspace::new();
    let labels = workspace.path("labels_fr.yml");
    let stdout = stdout_of(workspace.render().args(["--labels", labels.as_str()]));

    assert!(stdout.contains("Traitement: Paracetamol (500mg. 3 days)"));
    assert!(stdout.contains("Diagnostic: Fever"));
    assert!(stdout.contains("Diagnosis type: Confirmed"));
    assert!(stdout.contains("Page 1 sur 2"));
}

#[test]
fn unknown_client_has_no_visits() {
    let workspace = Workspace::new();
    let stdout = stdout_of(workspace.render().args(["--entity", "someone-else"]));
    assert_eq!(stdout.trim(), "No visits recorded.");
}

#[test]
fn page_out_of_range_fails() {
    let workspace = Workspace::new();
    let stderr = stderr_of_failure(workspace.render().args(["--page", "5"]));
    assert!(stderr.contains("page 5 is out of range (2 pages)"));
}

#[test]
fn missing_layout_fails() {
    let workspace = Workspace::new();
    let mut cmd = binary();
    cmd.args([
        "render",
        "--config",
        workspace.path("nowhere.yml").as_str(),
        "--records",
        workspace.path("visits.json").as_str(),
    ]);
    let stderr = stderr_of_failure(&mut cmd);
    assert!(stderr.contains("failed to read config `nowhere.yml`"));
}

#[test]
fn check_reports_layout_size() {
    let workspace = Workspace::new();
    let mut cmd = binary();
    cmd.args(["check", "--config", workspace.path("visit_row.yml").as_str()]);
    assert_eq!(stdout_of(&mut cmd).trim(), "ok: 4 entries, 6 fields");
}

#[test]
fn check_rejects_broken_expressions() {
    let temp = TempDir::new().expect("temp dir");
    let layout = temp.child("broken.yml");
    layout
        .write_str("group: Vitals\nfields:\n  - key: bp\n    relevance: \"age >\"\n")
        .expect("layout");

    let mut cmd = binary();
    cmd.args(["check", "--config", layout.path().display().to_string().as_str()]);
    let stderr = stderr_of_failure(&mut cmd);
    assert!(stderr.contains("field `bp` relevance"));
    assert!(stderr.contains("1 invalid expression(s)"));
}

#[test]
fn check_normalizes_legacy_keys() {
    let temp = TempDir::new().expect("temp dir");
    let layout = temp.child("legacy.yml");
    layout
        .write_str("subGroup: Meds\nfields:\n  - key: treatment\n    isRedFont: \"x == 1\"\n")
        .expect("layout");

    let mut cmd = binary();
    cmd.args([
        "check",
        "--config",
        layout.path().display().to_string().as_str(),
        "--normalize",
    ]);
    let stdout = stdout_of(&mut cmd);
    assert!(stdout.contains("sub_group: Meds"));
    assert!(stdout.contains("highlight:"));
    assert!(!stdout.contains("isRedFont"));
}

#[test]
fn schema_is_json() {
    let stdout = stdout_of(binary().arg("schema"));
    let schema: Value = serde_json::from_str(&stdout).expect("schema json");
    assert!(schema.is_object());
}

#[test]
fn eval_prints_outcome() {
    let stdout = stdout_of(binary().args(["eval", "--expr", "age > 18", "--fact", "age=40"]));
    assert_eq!(stdout.trim(), "true");

    let stdout = stdout_of(binary().args(["eval", "--expr", "diagnosis == null"]));
    assert_eq!(stdout.trim(), "true");
}

#[test]
fn eval_fails_on_unknown_fact() {
    let stderr = stderr_of_failure(binary().args(["eval", "--expr", "age > 18"]));
    assert!(stderr.contains("age > 18"));
}
