//! Integration tests for `launchpad plan --json` output.

use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "launchpad-cli", "--bin", "launchpad", "--"]);
    cmd
}

fn plan_json(dir: &std::path::Path) -> serde_json::Value {
    let output = cargo_bin()
        .args(["--json", "plan"])
        .arg(dir)
        .output()
        .expect("Failed to run plan command");
    assert!(
        output.status.success(),
        "plan failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON")
}

#[test]
fn test_plan_next_project_with_lockfile() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("package.json"),
        r#"{ "dependencies": { "next": "14.0.0", "react": "18.2.0" }, "scripts": { "dev": "next dev" } }"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

    let json = plan_json(dir.path());
    assert_eq!(json["kind"], "node");
    assert!(json.get("static_site").is_none());
    assert_eq!(json["start_script"], "dev");
    assert_eq!(json["dev_server"]["name"], "Next.js");

    let install = json["install"].as_array().unwrap();
    assert_eq!(install.len(), 5);
    assert_eq!(install[0]["precondition"], "strict_lockfile");
    assert_eq!(install[0]["argv"][1], "ci");
    assert_eq!(install[2]["precondition"], "peer_conflict");
}

#[test]
fn test_plan_static_site_synthesizes_server() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("public")).unwrap();
    std::fs::write(dir.path().join("public/index.html"), "<h1>hi</h1>").unwrap();

    let json = plan_json(dir.path());
    assert_eq!(json["kind"], "static");
    assert_eq!(json["static_site"]["doc_root"], "public");
    assert_eq!(json["start_script"], "start");
    assert_eq!(json["dev_server"]["name"], "Express");
    assert_eq!(json["dev_server"]["env"]["PORT"], "3000");

    let install = json["install"].as_array().unwrap();
    assert_eq!(install.len(), 4, "no lockfile means no clean install step");
}
