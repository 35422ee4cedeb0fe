//! Checks that DAG files in the shapes `dagctl run`/`dagctl resume`
//! accept actually deserialize into `dagctl_core::Dag`.

use dagctl_core::Dag;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn yaml_dag_deserializes() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "dag.yaml",
        r#"
tasks:
  - id: fetch
    tool: "http:get"
    arguments: {}
    depends_on: []
    kind: mcp_tool
  - id: summarize
    tool: "capability:summarize"
    arguments: {}
    depends_on: ["fetch"]
    kind: capability
"#,
    );
    let content = fs::read_to_string(&path).unwrap();
    let dag: Dag = serde_yaml::from_str(&content).unwrap();
    assert_eq!(dag.tasks.len(), 2);
    assert_eq!(dag.tasks[1].depends_on, vec!["fetch".to_string()]);
}

#[test]
fn json_dag_deserializes() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "dag.json",
        r#"{"tasks": [{"id": "only", "tool": "http:get", "arguments": {}, "depends_on": [], "kind": "mcp_tool"}]}"#,
    );
    let content = fs::read_to_string(&path).unwrap();
    let dag: Dag = serde_json::from_str(&content).unwrap();
    assert_eq!(dag.tasks.len(), 1);
    assert_eq!(dag.tasks[0].id, "only");
}

#[test]
fn empty_dag_is_valid() {
    let dag: Dag = serde_yaml::from_str("tasks: []").unwrap();
    assert!(dag.tasks.is_empty());
}
