use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use secscan_core::{
    summarize, Aggregator, Adapter, ClangTidyAdapter, CppcheckAdapter, DependencyAdapter,
    PatternScanAdapter, PermissionAdapter, Severity,
};

// Explicit modes keep the permission checks independent of the test umask.
fn write_plain(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
}

fn write_fixture_project(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    write_plain(
        &root.join("src").join("vulnerable.cpp"),
        concat!(
            "#include <cstring>\n",
            "\n",
            "void copy(char* dst, const char* src) {\n",
            "    strcpy(dst, src);\n",
            "}\n",
            "\n",
            "std::string query(const std::string& name) {\n",
            "    return \"SELECT * FROM users WHERE name = '\" + name + \"'\";\n",
            "}\n",
        ),
    );
    write_plain(
        &root.join("CMakeLists.txt"),
        "find_package(Qt6)\nfind_package(SQLite3 3.40.0)\n",
    );

    let data = root.join("data.json");
    fs::write(&data, "{}\n").unwrap();
    fs::set_permissions(&data, fs::Permissions::from_mode(0o755)).unwrap();
}

fn aggregator_with_unavailable_analyzers() -> Aggregator {
    // The two external analyzers point at binaries that cannot exist, so the
    // run exercises the degrade-to-empty path alongside real findings.
    let adapters: Vec<Box<dyn Adapter>> = vec![
        Box::new(CppcheckAdapter::with_program("secscan-no-such-binary")),
        Box::new(ClangTidyAdapter::with_program("secscan-no-such-binary")),
        Box::new(PatternScanAdapter::new()),
        Box::new(DependencyAdapter::new()),
        Box::new(PermissionAdapter::new()),
    ];
    Aggregator::new(adapters)
}

#[tokio::test]
async fn full_scan_collects_findings_from_available_backends() {
    let temp = tempfile::tempdir().unwrap();
    write_fixture_project(temp.path());

    let result = aggregator_with_unavailable_analyzers()
        .run(temp.path())
        .await;

    assert!(result.static_analysis.is_empty());
    assert!(result.code_quality.is_empty());
    assert_eq!(result.security_issues.len(), 3);
    assert_eq!(result.dependency_scan.len(), 1);

    let summary = &result.summary;
    assert_eq!(summary.total_issues, 4);
    assert_eq!(summary.severity_breakdown.high, 2);
    assert_eq!(summary.severity_breakdown.medium, 1);
    assert_eq!(summary.severity_breakdown.low, 1);
    assert_eq!(summary.severity_breakdown.info, 0);
    assert_eq!(summary.categories.security_issues, 3);
    assert_eq!(summary.categories.dependency_scan, 1);
    assert_eq!(summary.categories.static_analysis, 0);
}

#[tokio::test]
async fn repeated_scans_of_an_unchanged_tree_agree() {
    let temp = tempfile::tempdir().unwrap();
    write_fixture_project(temp.path());

    let aggregator = aggregator_with_unavailable_analyzers();
    let first = aggregator.run(temp.path()).await;
    let second = aggregator.run(temp.path()).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn summary_stays_consistent_with_buckets() {
    let temp = tempfile::tempdir().unwrap();
    write_fixture_project(temp.path());

    let result = aggregator_with_unavailable_analyzers()
        .run(temp.path())
        .await;

    // Recomputing over the final buckets reproduces the stored summary.
    assert_eq!(summarize(&result), result.summary);

    let highs = result
        .security_issues
        .iter()
        .filter(|finding| finding.severity == Severity::High)
        .count();
    assert_eq!(result.summary.severity_breakdown.high, highs);
}
