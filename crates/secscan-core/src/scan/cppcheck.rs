use std::collections::HashMap;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{Adapter, AdapterError, Bucket, Category, Finding, Location, Severity, Tool};

const TOOL_NAME: &str = "cppcheck";

/// Runs cppcheck in XML mode and normalizes its error-stream report.
///
/// The adapter relies only on `<error>` elements carrying `severity`, `id`,
/// `msg`, `file` and `line` attributes. Severity is passed through verbatim
/// (`error`, `warning`, `style`, ...), defaulting to `unknown` when absent.
pub struct CppcheckAdapter {
    program: String,
}

impl CppcheckAdapter {
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

impl Default for CppcheckAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for CppcheckAdapter {
    fn tool(&self) -> Tool {
        Tool::Cppcheck
    }

    fn bucket(&self) -> Bucket {
        Bucket::StaticAnalysis
    }

    #[instrument(name = "cppcheck", skip_all)]
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
        let output = Command::new(&self.program)
            .arg("--enable=all")
            .arg("--xml")
            .arg("--xml-version=2")
            .arg("--suppress=missingIncludeSystem")
            .arg("--suppress=unusedFunction")
            .arg(project_root.join("src"))
            .arg(project_root.join("include"))
            .output()
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => AdapterError::ToolMissing { tool: TOOL_NAME },
                _ => AdapterError::Io(err),
            })?;

        // The XML report goes to stderr; stdout carries progress noise.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let findings = parse_report(&stderr)?;
        debug!(findings = findings.len(), "cppcheck completed");
        Ok(findings)
    }
}

static ERROR_ELEMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<error\b([^>]*?)/?>").unwrap());
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#).unwrap());

/// Parse the XML error stream into findings. A non-empty stream without a
/// `<results>` document counts as malformed output.
fn parse_report(stderr: &str) -> Result<Vec<Finding>, AdapterError> {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !trimmed.contains("<results") {
        return Err(AdapterError::ParseFailure {
            tool: TOOL_NAME,
            reason: "missing <results> document on stderr".into(),
        });
    }

    let mut findings = Vec::new();
    for element in ERROR_ELEMENT.captures_iter(trimmed) {
        let attributes: HashMap<&str, String> = ATTRIBUTE
            .captures_iter(element.get(1).map_or("", |m| m.as_str()))
            .map(|attr| {
                (
                    attr.get(1).map_or("", |m| m.as_str()),
                    unescape(attr.get(2).map_or("", |m| m.as_str())),
                )
            })
            .collect();

        let severity = attributes
            .get("severity")
            .map(|raw| Severity::parse(raw))
            .unwrap_or_else(|| Severity::Passthrough("unknown".into()));
        let id = attributes
            .get("id")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let message = attributes
            .get("msg")
            .cloned()
            .unwrap_or_else(|| "No message".to_string());
        let location = attributes.get("file").map(|file| Location {
            file: file.into(),
            line: attributes.get("line").and_then(|line| line.parse().ok()),
            column: None,
        });

        findings.push(Finding {
            tool: Tool::Cppcheck,
            category: Category::Check(id),
            severity,
            message,
            location,
            raw_match: None,
        });
    }
    Ok(findings)
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<results version="2">
    <cppcheck version="2.10"/>
    <errors>
        <error id="nullPointer" severity="error" msg="Null pointer dereference: ptr" file="src/main.cpp" line="42"/>
        <error id="unusedVariable" severity="style" msg="Unused variable: &apos;tmp&apos;"/>
    </errors>
</results>"#;

    #[test]
    fn parses_error_elements_with_attributes() {
        let findings = parse_report(SAMPLE).unwrap();
        assert_eq!(findings.len(), 2);

        let first = &findings[0];
        assert_eq!(first.tool, Tool::Cppcheck);
        assert_eq!(first.category, Category::Check("nullPointer".into()));
        assert_eq!(first.severity, Severity::Passthrough("error".into()));
        assert_eq!(first.message, "Null pointer dereference: ptr");
        let location = first.location.as_ref().unwrap();
        assert_eq!(location.file, Path::new("src/main.cpp"));
        assert_eq!(location.line, Some(42));

        let second = &findings[1];
        assert_eq!(second.message, "Unused variable: 'tmp'");
        assert!(second.location.is_none());
    }

    #[test]
    fn missing_severity_defaults_to_unknown() {
        let report = r#"<results version="2"><errors><error id="x" msg="m"/></errors></results>"#;
        let findings = parse_report(report).unwrap();
        assert_eq!(findings[0].severity, Severity::Passthrough("unknown".into()));
    }

    #[test]
    fn empty_stream_yields_no_findings() {
        assert!(parse_report("").unwrap().is_empty());
        assert!(parse_report("  \n").unwrap().is_empty());
    }

    #[test]
    fn malformed_stream_is_a_parse_failure() {
        let err = parse_report("cppcheck: error while loading shared libraries").unwrap_err();
        assert!(matches!(err, AdapterError::ParseFailure { tool, .. } if tool == TOOL_NAME));
    }

    #[tokio::test]
    async fn missing_binary_reports_tool_missing() {
        let adapter = CppcheckAdapter::with_program("secscan-no-such-binary");
        let err = adapter.collect(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, AdapterError::ToolMissing { tool } if tool == TOOL_NAME));
    }
}
