use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use super::{
    relative_to, Adapter, AdapterError, Bucket, Category, Finding, Location, Severity, Tool,
    SOURCE_EXTENSIONS,
};

const TOOL_NAME: &str = "clang-tidy";

/// Invokes clang-tidy once per source file under `<root>/src` and parses its
/// free-text diagnostics.
///
/// A stdout line counts as a diagnostic when it has at least four
/// colon-separated fields and contains `warning:` or `error:`; everything
/// else is silently ignored.
pub struct ClangTidyAdapter {
    program: String,
}

impl ClangTidyAdapter {
    pub fn new() -> Self {
        Self {
            program: TOOL_NAME.to_string(),
        }
    }

    /// Override the invoked binary, used to exercise missing-tool handling.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ClangTidyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for ClangTidyAdapter {
    fn tool(&self) -> Tool {
        Tool::ClangTidy
    }

    fn bucket(&self) -> Bucket {
        Bucket::StaticAnalysis
    }

    #[instrument(name = "clang_tidy", skip_all)]
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
        let src_dir = project_root.join("src");
        let mut findings = Vec::new();
        if !src_dir.exists() {
            return Ok(findings);
        }

        let include_flag = format!("-I{}", project_root.join("include").display());
        let sources = WalkDir::new(&src_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
            });

        for entry in sources {
            let path = entry.path();
            let output = match Command::new(&self.program)
                .arg(path)
                .arg("--")
                .arg(&include_flag)
                .arg("-std=c++20")
                .output()
                .await
            {
                Ok(output) => output,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(AdapterError::ToolMissing { tool: TOOL_NAME });
                }
                Err(err) => {
                    warn!(file = %path.display(), %err, "clang-tidy invocation failed");
                    continue;
                }
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            findings.extend(
                stdout
                    .lines()
                    .filter_map(|line| parse_diagnostic(project_root, line)),
            );
        }

        debug!(findings = findings.len(), "clang-tidy completed");
        Ok(findings)
    }
}

/// Parse one stdout line; `None` for anything that is not a diagnostic.
fn parse_diagnostic(project_root: &Path, line: &str) -> Option<Finding> {
    let is_warning = line.contains("warning:");
    if !is_warning && !line.contains("error:") {
        return None;
    }
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 4 {
        return None;
    }

    let severity = if is_warning { "warning" } else { "error" };
    let message = parts[3..].join(":").trim().to_string();

    Some(Finding {
        tool: Tool::ClangTidy,
        category: Category::StaticAnalysis,
        severity: Severity::Passthrough(severity.to_string()),
        message,
        location: Some(Location {
            file: relative_to(project_root, Path::new(parts[0])),
            line: parts[1].trim().parse().ok(),
            column: parts[2].trim().parse().ok(),
        }),
        raw_match: None,
    })
}
