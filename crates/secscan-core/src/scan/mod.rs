use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod aggregate;
pub mod clang_tidy;
pub mod cppcheck;
pub mod dependencies;
pub mod pattern_scan;
pub mod patterns;
pub mod permissions;

/// File extensions treated as scannable source code.
pub const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cxx", "cc"];

/// Severity attached to a finding at creation time and never recomputed.
///
/// The four core values drive the summary; `Passthrough` carries values
/// sourced verbatim from external tools (`error`, `warning`, `style`,
/// `unknown`, ...) which the summary counts under `info`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
    Passthrough(String),
}

impl Severity {
    /// Map a raw severity string onto the closed enum, preserving
    /// out-of-taxonomy values instead of normalizing them away.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            "info" => Self::Info,
            _ => Self::Passthrough(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
            Self::Passthrough(raw) => raw,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Identifier of the adapter that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Cppcheck,
    #[serde(rename = "clang-tidy")]
    ClangTidy,
    SecurityScanner,
    DependencyScanner,
    PermissionChecker,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cppcheck => "cppcheck",
            Self::ClangTidy => "clang-tidy",
            Self::SecurityScanner => "security_scanner",
            Self::DependencyScanner => "dependency_scanner",
            Self::PermissionChecker => "permission_checker",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification label for a finding.
///
/// Pattern-scan findings carry one of the five pattern categories; the other
/// adapters use their own domain label. `Check` passes through check
/// identifiers reported by external tools (e.g. cppcheck's `id` attribute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    BufferOverflow,
    SqlInjection,
    PathTraversal,
    HardcodedSecrets,
    WeakCrypto,
    StaticAnalysis,
    Dependency,
    FilePermissions,
    Check(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BufferOverflow => "buffer_overflow",
            Self::SqlInjection => "sql_injection",
            Self::PathTraversal => "path_traversal",
            Self::HardcodedSecrets => "hardcoded_secrets",
            Self::WeakCrypto => "weak_crypto",
            Self::StaticAnalysis => "static_analysis",
            Self::Dependency => "dependency",
            Self::FilePermissions => "file_permissions",
            Self::Check(id) => id,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "buffer_overflow" => Self::BufferOverflow,
            "sql_injection" => Self::SqlInjection,
            "path_traversal" => Self::PathTraversal,
            "hardcoded_secrets" => Self::HardcodedSecrets,
            "weak_crypto" => Self::WeakCrypto,
            "static_analysis" => Self::StaticAnalysis,
            "dependency" => Self::Dependency,
            "file_permissions" => Self::FilePermissions,
            _ => Self::Check(raw.to_string()),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Structured source reference, present when a finding points at code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path relative to the project root.
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn file_only(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    pub fn with_line(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
        }
    }
}

/// One normalized unit of analysis output. Immutable once produced;
/// duplicates across adapters are kept as-is by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub tool: Tool,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Literal matched text, pattern-scan findings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_match: Option<String>,
}

/// Destination collection for an adapter's findings. Membership is decided by
/// the producing adapter, never by severity or category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    StaticAnalysis,
    DependencyScan,
    CodeQuality,
    SecurityIssues,
}

/// Aggregate of one scan run: four finding buckets plus the derived summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub static_analysis: Vec<Finding>,
    pub dependency_scan: Vec<Finding>,
    pub code_quality: Vec<Finding>,
    pub security_issues: Vec<Finding>,
    pub summary: Summary,
}

impl ScanResult {
    pub fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<Finding> {
        match bucket {
            Bucket::StaticAnalysis => &mut self.static_analysis,
            Bucket::DependencyScan => &mut self.dependency_scan,
            Bucket::CodeQuality => &mut self.code_quality,
            Bucket::SecurityIssues => &mut self.security_issues,
        }
    }

    /// The buckets that feed the summary, in document order.
    pub fn issue_buckets(&self) -> [&[Finding]; 3] {
        [
            &self.static_analysis,
            &self.security_issues,
            &self.dependency_scan,
        ]
    }
}

/// Derived totals over a `ScanResult`. Never mutated independently of the
/// buckets; recomputed by the aggregator after every adapter has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_issues: usize,
    pub severity_breakdown: SeverityBreakdown,
    pub categories: CategoryCounts,
}

/// Per-severity counts; all four keys are always present in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

/// Per-bucket counts over the issue-bearing buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub static_analysis: usize,
    pub security_issues: usize,
    pub dependency_scan: usize,
}

/// Recoverable per-adapter failure. The aggregator logs these and treats the
/// adapter as having contributed nothing; they never abort the scan.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("`{tool}` binary not found on PATH")]
    ToolMissing { tool: &'static str },
    #[error("could not parse {tool} output: {reason}")]
    ParseFailure { tool: &'static str, reason: String },
    #[error("i/o failure during scan: {0}")]
    Io(#[from] std::io::Error),
}

/// One analysis backend normalized behind a common seam. Adapters own their
/// finding list until it is handed to the aggregator; they never mutate a
/// finding after emission.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Identifier stamped on every finding this adapter emits.
    fn tool(&self) -> Tool;

    /// Bucket this adapter's findings land in.
    fn bucket(&self) -> Bucket;

    /// Produce all findings for the project tree rooted at `project_root`.
    async fn collect(&self, project_root: &Path) -> Result<Vec<Finding>, AdapterError>;
}

/// Strip the project root prefix so report locations stay portable.
pub(crate) fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
