use std::fs;
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::{Adapter, AdapterError, Bucket, Category, Finding, Severity, Tool};

const MANIFEST: &str = "CMakeLists.txt";

/// Packages tracked for advisory purposes, with their minimum safe version.
static SENSITIVE_PACKAGES: &[(&str, &str)] = &[("Qt6", "6.5.0"), ("SQLite3", "3.40.0")];

static FIND_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)find_package\s*\(\s*(\w+)(?:\s+(\d+(?:\.\d+)*))?").unwrap());

/// Flags sensitive `find_package` declarations that leave the version
/// unspecified. An explicitly pinned version is never flagged, even an old
/// one; there is no numeric version comparison here.
pub struct DependencyAdapter;

impl DependencyAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DependencyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for DependencyAdapter {
    fn tool(&self) -> Tool {
        Tool::DependencyScanner
    }

    fn bucket(&self) -> Bucket {
        Bucket::DependencyScan
    }

    #[instrument(name = "dependency_scan", skip_all)]
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
        let manifest = project_root.join(MANIFEST);
        if !manifest.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&manifest)?;
        let findings = scan_manifest(&content);
        debug!(findings = findings.len(), "dependency scan completed");
        Ok(findings)
    }
}

fn scan_manifest(content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for declaration in FIND_PACKAGE.captures_iter(content) {
        let package = declaration.get(1).map_or("", |m| m.as_str());
        let version = declaration.get(2);

        let Some((_, min_safe)) = SENSITIVE_PACKAGES
            .iter()
            .find(|(name, _)| *name == package)
        else {
            continue;
        };
        if version.is_some() {
            continue;
        }

        findings.push(Finding {
            tool: Tool::DependencyScanner,
            category: Category::Dependency,
            severity: Severity::Medium,
            message: format!("Version not specified for {package}. Recommend >= {min_safe}"),
            location: None,
            raw_match: None,
        });
    }
    findings
}
