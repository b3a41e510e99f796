//! End-to-end tests of the `docrag` binary.
//!
//! Both providers point at an unreachable Ollama URL, so every embedding
//! degrades to a zero vector and every generation fails fast. That is
//! enough to drive ingest, status, ask and reset without network access.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn docrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docrag");
    path
}

fn write_config(root: &Path, extra: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[embedding]
provider = "ollama"
model = "nomic-embed-text"
url = "{url}"
timeout_secs = 2

[generation]
provider = "ollama"
model = "llama3"
url = "{url}"
timeout_secs = 2
max_retries = 1

[store]
backend = "sqlite"
path = "{root}/data/docrag.sqlite"
{extra}
"#,
        url = UNREACHABLE,
        root = root.display(),
        extra = extra
    );

    let config_path = config_dir.join("docrag.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();
    fs::write(files_dir.join("diagram.png"), b"\x89PNG\r\n").unwrap();

    let config_path = write_config(&root, "");
    (tmp, config_path)
}

fn run_docrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_docrag_with(config_path, args, |_| {})
}

fn run_docrag_with(
    config_path: &Path,
    args: &[&str],
    customize: impl FnOnce(&mut Command),
) -> (String, String, bool) {
    let binary = docrag_binary();
    let mut command = Command::new(&binary);
    command
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "docrag=warn");
    customize(&mut command);
    let output = command
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn record_count(stdout: &str) -> usize {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("records"))
        .map(|rest| rest.trim().parse().unwrap())
        .expect("status output has a records line")
}

fn files_dir(config_path: &Path) -> String {
    let root = config_path.parent().unwrap().parent().unwrap();
    root.join("files").to_string_lossy().to_string()
}

#[test]
fn test_status_on_fresh_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docrag(&config_path, &["status"]);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rag_documents"));
    assert!(stdout.contains("ollama:nomic-embed-text"));
    assert_eq!(record_count(&stdout), 0);
}

#[test]
fn test_ask_before_ingest_reports_no_documents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docrag(&config_path, &["ask", "What is Rust?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No documents in collection 'rag_documents'"));
    assert!(!stdout.contains("Error generating response"));
}

#[test]
fn test_ingest_skips_unsupported_and_degrades() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    let (stdout, stderr, success) =
        run_docrag(&config_path, &["ingest", &files, "--progress", "json"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 2 file(s)"), "stdout={}", stdout);
    assert!(stdout.contains("Skipped 1 file(s)"));
    assert!(stdout.contains("could not be embedded"));
    assert!(stderr.contains("\"event\":\"skipped\""));
    assert!(stderr.contains("diagram.png"));

    let (stdout, _, _) = run_docrag(&config_path, &["status"]);
    assert_eq!(record_count(&stdout), 2);
}

#[test]
fn test_ask_after_ingest_returns_generation_error_text() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);
    run_docrag(&config_path, &["ingest", &files, "--progress", "off"]);

    let (stdout, stderr, success) =
        run_docrag(&config_path, &["ask", "What is Kubernetes?", "--sources"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Error generating response"));
    assert!(stdout.contains("Source Chunks:"));
}

#[test]
fn test_reset_empties_collection() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);
    run_docrag(&config_path, &["ingest", &files, "--progress", "off"]);

    let (stdout, stderr, success) = run_docrag(&config_path, &["reset"]);
    assert!(success, "reset failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("reset"));

    let (stdout, _, _) = run_docrag(&config_path, &["status"]);
    assert_eq!(record_count(&stdout), 0);
}

#[test]
fn test_reingest_persists_across_runs() {
    let (_tmp, config_path) = setup_test_env();
    let files = files_dir(&config_path);

    run_docrag(&config_path, &["ingest", &files, "--progress", "off"]);
    run_docrag(&config_path, &["ingest", &files, "--progress", "off"]);

    let (stdout, _, _) = run_docrag(&config_path, &["status"]);
    assert_eq!(record_count(&stdout), 4);
}

#[test]
fn test_invalid_overlap_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "\n[chunking]\nchunk_size = 100\noverlap = 100\n");

    let (_, stderr, success) = run_docrag(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("overlap"), "stderr={}", stderr);
}

#[test]
fn test_chroma_backend_requires_environment() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path(), "");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("backend = \"sqlite\"", "backend = \"chroma\"");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_docrag_with(&config_path, &["status"], |cmd| {
        cmd.env_remove("CHROMA_URL")
            .env_remove("CHROMA_API_KEY")
            .env_remove("CHROMA_TENANT")
            .env_remove("CHROMA_DATABASE");
    });
    assert!(!success);
    assert!(stderr.contains("CHROMA_URL"), "stderr={}", stderr);
}

#[test]
fn test_gemini_requires_api_key() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("docrag.toml");
    fs::write(
        &config_path,
        format!(
            "[store]\nbackend = \"sqlite\"\npath = \"{}/data/docrag.sqlite\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_docrag_with(&config_path, &["ask", "anything"], |cmd| {
        cmd.env_remove("GOOGLE_API_KEY");
    });
    assert!(!success);
    assert!(stderr.contains("GOOGLE_API_KEY"), "stderr={}", stderr);
}
