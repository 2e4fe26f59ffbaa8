use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use super::{relative_to, Adapter, AdapterError, Bucket, Category, Finding, Location, Severity, Tool};

/// Extensions that should never carry an execute bit.
const NON_EXECUTABLE_EXTENSIONS: &[&str] = &["txt", "md", "json", "xml"];

/// Audits permission bits of every regular file in the project tree.
///
/// Two independent checks per file: world-writable modes (last octal digit
/// 6 or 7) and execute bits on data-file extensions (last octal digit odd).
/// A file can produce zero, one, or two findings.
pub struct PermissionAdapter;

impl PermissionAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PermissionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for PermissionAdapter {
    fn tool(&self) -> Tool {
        Tool::PermissionChecker
    }

    fn bucket(&self) -> Bucket {
        Bucket::SecurityIssues
    }

    #[instrument(name = "permission_check", skip_all)]
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
        let mut findings = Vec::new();
        let entries = WalkDir::new(project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() || entry.path_is_symlink());

        for entry in entries {
            let path = entry.path();
            // Follows links, so a dangling symlink lands in the error arm.
            let metadata = match fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(file = %path.display(), %err, "skipping inaccessible metadata");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let other_bits = metadata.permissions().mode() & 0o7;
            let relative = relative_to(project_root, path);

            if other_bits == 6 || other_bits == 7 {
                findings.push(permission_finding(
                    Severity::Medium,
                    "File is world-writable",
                    &relative,
                ));
            }

            let data_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| NON_EXECUTABLE_EXTENSIONS.contains(&ext));
            if data_extension && other_bits % 2 == 1 {
                findings.push(permission_finding(
                    Severity::Low,
                    "Non-executable file has execute permissions",
                    &relative,
                ));
            }
        }

        debug!(findings = findings.len(), "permission check completed");
        Ok(findings)
    }
}

fn permission_finding(severity: Severity, message: &str, file: &Path) -> Finding {
    Finding {
        tool: Tool::PermissionChecker,
        category: Category::FilePermissions,
        severity,
        message: message.to_string(),
        location: Some(Location::file_only(file)),
        raw_match: None,
    }
}
