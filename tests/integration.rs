use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qry_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qry");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("data")).unwrap();

    // An installed package the CLI can index without touching the network.
    let pkg = root.join("site").join("demo_pkg");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(
        pkg.join("client.py"),
        "import json\nimport time\n\ndef fetch(url):\n    \"\"\"Retry with exponential backoff.\"\"\"\n    return url\n\ndef retry_delay(attempt):\n    return 2 ** attempt\n",
    )
    .unwrap();
    fs::write(
        pkg.join("README.md"),
        "# demo_pkg\n\nA demo HTTP client with retry budgets and backoff policies.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[storage]
root = "{}/data"

[packages]
roots = ["{}/site"]

[server]
bind = "127.0.0.1:7402"
"#,
        root.display(),
        root.display()
    );

    let config_path = root.join("quarry.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qry(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qry_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qry binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_index_package_and_search() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qry(&config_path, &["index", "package", "demo_pkg"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Indexed demo_pkg"));

    // stdout is piped, so search output is JSON.
    let (stdout, stderr, success) =
        run_qry(&config_path, &["search", "retry backoff", "demo_pkg"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let results: serde_json::Value = serde_json::from_str(&stdout).expect("search output is JSON");
    assert_eq!(results[0]["identifier"], "demo_pkg");
    assert_eq!(results[0]["outcome"], "hits");
    assert!(!results[0]["hits"].as_array().unwrap().is_empty());
}

#[test]
fn test_search_results_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_qry(&config_path, &["index", "package", "demo_pkg"]);
    let (stdout1, _, _) = run_qry(&config_path, &["search", "backoff", "demo_pkg"]);
    let (stdout2, _, _) = run_qry(&config_path, &["search", "backoff", "demo_pkg"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_unknown_resource_reports_not_indexed() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_qry(&config_path, &["search", "anything", "ghost"]);
    assert!(success, "an unknown resource should not abort the batch");
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results[0]["identifier"], "ghost");
    assert_eq!(results[0]["outcome"], "not_indexed");
}

#[test]
fn test_search_empty_query_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qry(&config_path, &["search", "", "demo_pkg"]);
    assert!(!success, "Empty query should fail");
    assert!(
        stderr.contains("must not be empty"),
        "Should reject empty query, got: {}",
        stderr
    );
}

#[test]
fn test_resources_lists_registered() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_qry(&config_path, &["resources"]);
    assert!(success);
    assert!(stdout.contains("No resources registered."));

    run_qry(&config_path, &["index", "package", "demo_pkg"]);

    let (stdout, _, success) = run_qry(&config_path, &["resources"]);
    assert!(success);
    assert!(stdout.contains("demo_pkg"));
    assert!(stdout.contains("package"));
    assert!(stdout.contains("indexed"));
}

#[test]
fn test_status_reports_build_state() {
    let (_tmp, config_path) = setup_test_env();

    run_qry(&config_path, &["index", "package", "demo_pkg"]);
    let (stdout, _, success) = run_qry(&config_path, &["status", "demo_pkg"]);
    assert!(success);
    assert!(stdout.contains("demo_pkg: indexed"));
    assert!(stdout.contains("chunks"));
}

#[test]
fn test_status_missing_resource_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qry(&config_path, &["status", "ghost"]);
    assert!(!success, "status of unknown resource should fail");
    assert!(
        stderr.contains("not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_rename_and_delete_flow() {
    let (_tmp, config_path) = setup_test_env();

    run_qry(&config_path, &["index", "package", "demo_pkg"]);

    let (stdout, stderr, success) = run_qry(&config_path, &["rename", "demo_pkg", "dp"]);
    assert!(success, "rename failed: {}", stderr);
    assert!(stdout.contains("Renamed demo_pkg to dp"));

    // The identifier column changes; the on-disk location keeps its name.
    let (stdout, _, _) = run_qry(&config_path, &["resources"]);
    assert!(stdout.lines().any(|l| l.starts_with("dp ")));
    assert!(!stdout.lines().any(|l| l.starts_with("demo_pkg")));

    let (stdout, _, success) = run_qry(&config_path, &["delete", "dp"]);
    assert!(success);
    assert!(stdout.contains("Deleted dp"));

    let (stdout, _, _) = run_qry(&config_path, &["resources"]);
    assert!(stdout.contains("No resources registered."));
}

#[test]
fn test_rename_missing_resource_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qry(&config_path, &["rename", "ghost", "spectre"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_pkg_read_line_range() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_qry(
        &config_path,
        &[
            "pkg", "read", "demo_pkg", "client.py", "--start", "1", "--end", "2",
        ],
    );
    assert!(success, "pkg read failed: {}", stderr);
    assert!(stdout.contains("import json"));
    assert!(stdout.contains("import time"));
    assert!(!stdout.contains("def fetch"));
}

#[test]
fn test_pkg_read_invalid_range_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qry(
        &config_path,
        &[
            "pkg", "read", "demo_pkg", "client.py", "--start", "9", "--end", "2",
        ],
    );
    assert!(!success, "Reversed range should fail");
    assert!(
        stderr.contains("invalid line range"),
        "Should report invalid range, got: {}",
        stderr
    );
}

#[test]
fn test_pkg_grep_missing_package_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_qry(&config_path, &["pkg", "grep", "ghost", "def "]);
    assert!(!success, "grep of unknown package should fail");
    assert!(stderr.contains("not found"));
}

#[test]
fn test_graph_renders_imports() {
    let (_tmp, config_path) = setup_test_env();

    run_qry(&config_path, &["index", "package", "demo_pkg"]);
    let (stdout, stderr, success) = run_qry(&config_path, &["graph", "demo_pkg"]);
    assert!(success, "graph failed: {}", stderr);
    assert!(stdout.contains("Import graph for demo_pkg"));
    assert!(stdout.contains("client.py"));
    assert!(stdout.contains("json"));
}

#[test]
fn test_init_project_writes_config() {
    let (tmp, config_path) = setup_test_env();
    let project = tmp.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    let project_arg = project.to_str().unwrap();

    let (stdout, stderr, success) =
        run_qry(&config_path, &["init-project", project_arg]);
    assert!(success, "init-project failed: {}", stderr);
    assert!(stdout.contains("Wrote"));

    let written = project.join(".cursor").join("mcp.json");
    assert!(written.exists());
    let content = fs::read_to_string(&written).unwrap();
    assert!(content.contains("mcpServers"));
    assert!(content.contains("quarry"));

    // A second run without --force must not clobber.
    let (_, stderr, success) = run_qry(&config_path, &["init-project", project_arg]);
    assert!(!success, "init-project should refuse to overwrite");
    assert!(stderr.contains("already exists"));

    let (_, _, success) = run_qry(&config_path, &["init-project", project_arg, "--force"]);
    assert!(success, "init-project --force should overwrite");
}

#[test]
fn test_init_project_unknown_profile_fails() {
    let (tmp, config_path) = setup_test_env();
    let project = tmp.path().join("proj");
    fs::create_dir_all(&project).unwrap();

    let (_, stderr, success) = run_qry(
        &config_path,
        &[
            "init-project",
            project.to_str().unwrap(),
            "--profile",
            "emacs",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("unknown profile"));
}

#[test]
fn test_completions_generate() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_qry(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("qry"));
}
