//! Tests for the human formatter output.

use super::*;
use crate::cli::analysis::{run_analysis, AnalysisRunOptions};
use lockscan_config::CliOverrides;
use std::fs;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "name": "web",
  "version": "1.0.0",
  "dependencies": { "ui": "^1.0.0", "charts": "^1.0.0", "ghost": "^1.0.0" }
}"#;

const YARN_LOCK: &str = r#"# yarn lockfile v1

ui@^1.0.0:
  version "1.2.0"
  dependencies:
    color "^1.0.0"

charts@^1.0.0:
  version "1.0.0"
  dependencies:
    color "^2.0.0"

color@^1.0.0:
  version "1.4.0"

color@^2.0.0:
  version "2.0.1"
"#;

fn analysis(dir: &TempDir) -> Analysis {
    colored::control::set_override(false);
    fs::write(dir.path().join("package.json"), MANIFEST).unwrap();
    fs::write(dir.path().join("yarn.lock"), YARN_LOCK).unwrap();
    run_analysis(&AnalysisRunOptions {
        path: dir.path().to_path_buf(),
        lockfile: None,
        config: None,
        overrides: CliOverrides::default(),
        importer: ".".to_string(),
    })
    .unwrap()
}

fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
    let mut buf = Vec::new();
    write(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_duplicate_report() {
    let dir = TempDir::new().unwrap();
    let analysis = analysis(&dir);
    let summary = analysis.duplicates();

    let output = render(|buf| HumanFormatter.write_duplicates(&analysis, &summary, buf));

    assert!(output.starts_with("Duplicate packages in yarn.lock (yarn)"));
    assert!(output.contains("color  2 versions, 2 instances"));
    assert!(output.contains("web@1.0.0 > ui@1.2.0 > color@1.4.0"));
    assert!(output.contains("web@1.0.0 > charts@1.0.0 > color@2.0.1"));
    assert!(output.contains("(transitive)"));
    assert!(output.contains("Duplicated packages: 1"));
}

#[test]
fn test_unresolved_section() {
    let dir = TempDir::new().unwrap();
    let analysis = analysis(&dir);
    let summary = analysis.duplicates();

    let output = render(|buf| HumanFormatter.write_duplicates(&analysis, &summary, buf));

    assert!(output.contains("Unresolved dependencies (1):"));
    assert!(output.contains("ghost@^1.0.0  via (root)"));
}

#[test]
fn test_empty_report() {
    let dir = TempDir::new().unwrap();
    let analysis = analysis(&dir);
    let summary = DuplicateSummary::default();

    let output = render(|buf| HumanFormatter.write_duplicates(&analysis, &summary, buf));

    assert!(output.contains("No duplicate packages found."));
    assert!(output.contains("Total packages: 0"));
}

#[test]
fn test_tree_drawing() {
    let dir = TempDir::new().unwrap();
    let analysis = analysis(&dir);

    let output = render(|buf| HumanFormatter.write_tree(&analysis, buf));
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines[3], "web@1.0.0");
    assert_eq!(lines[4], "├─ ui@1.2.0");
    assert_eq!(lines[5], "│ └─ color@1.4.0");
    assert_eq!(lines[6], "└─ charts@1.0.0");
    assert_eq!(lines[7], "  └─ color@2.0.1");
    assert!(output.contains("4 packages, 4 nodes"));
}

#[test]
fn test_tree_shows_alias() {
    colored::control::set_override(false);
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"name": "cli", "dependencies": {"string-width-cjs": "npm:string-width@^4.2.0"}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("yarn.lock"),
        "\"string-width-cjs@npm:string-width@^4.2.0\":\n  version \"4.2.3\"\n",
    )
    .unwrap();
    let analysis = run_analysis(&AnalysisRunOptions {
        path: dir.path().to_path_buf(),
        lockfile: None,
        config: None,
        overrides: CliOverrides::default(),
        importer: ".".to_string(),
    })
    .unwrap();

    let output = render(|buf| HumanFormatter.write_tree(&analysis, buf));
    assert!(output.contains("└─ string-width-cjs (npm:string-width@4.2.3)"));
    assert!(!output.contains("Unresolved"));
}
