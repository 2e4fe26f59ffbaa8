use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use super::patterns::{severity_for, PATTERNS};
use super::{
    relative_to, Adapter, AdapterError, Bucket, Finding, Location, Tool, SOURCE_EXTENSIONS,
};

/// Scans source text under the project tree against the built-in pattern
/// library. Reproducible: traversal is sorted by file name and matches are
/// ordered by offset, so a fixed tree yields a fixed finding sequence.
pub struct PatternScanAdapter {
    extensions: Vec<&'static str>,
}

impl PatternScanAdapter {
    pub fn new() -> Self {
        Self {
            extensions: SOURCE_EXTENSIONS.to_vec(),
        }
    }

    /// Restrict the scan to a different extension set.
    pub fn with_extensions(extensions: &[&'static str]) -> Self {
        Self {
            extensions: extensions.to_vec(),
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn scan_text(&self, project_root: &Path, path: &Path, text: &str) -> Vec<Finding> {
        let relative = relative_to(project_root, path);
        PATTERNS
            .matches(text)
            .into_iter()
            .map(|mat| {
                let category = mat.rule.category.clone();
                Finding {
                    tool: Tool::SecurityScanner,
                    severity: severity_for(&category),
                    message: format!("Insecure {category} construct detected"),
                    category,
                    location: Some(Location::with_line(
                        relative.clone(),
                        line_at_offset(text, mat.start),
                    )),
                    raw_match: Some(text[mat.start..mat.end].to_string()),
                }
            })
            .collect()
    }
}

impl Default for PatternScanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for PatternScanAdapter {
    fn tool(&self) -> Tool {
        Tool::SecurityScanner
    }

    fn bucket(&self) -> Bucket {
        Bucket::SecurityIssues
    }

    #[instrument(name = "pattern_scan", skip_all)]
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
        let mut findings = Vec::new();
        let entries = WalkDir::new(project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() || entry.path_is_symlink())
            .filter(|entry| self.matches_extension(entry.path()));

        for entry in entries {
            let path = entry.path();
            // Lossy decode keeps non-UTF-8 source files scannable.
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(file = %path.display(), %err, "skipping unreadable file");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            findings.extend(self.scan_text(project_root, path, &text));
        }

        debug!(findings = findings.len(), "pattern scan completed");
        Ok(findings)
    }
}

/// 1-based line number of a byte offset, counting preceding line breaks.
fn line_at_offset(text: &str, offset: usize) -> u32 {
    text.as_bytes()[..offset]
        .iter()
        .filter(|&&byte| byte == b'\n')
        .count() as u32
        + 1
}
