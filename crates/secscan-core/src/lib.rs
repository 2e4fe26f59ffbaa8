pub mod report;
pub mod scan;

pub use report::{render_report, OutputFormat};
pub use scan::{
    aggregate::{summarize, Aggregator},
    clang_tidy::ClangTidyAdapter,
    cppcheck::CppcheckAdapter,
    dependencies::DependencyAdapter,
    pattern_scan::PatternScanAdapter,
    permissions::PermissionAdapter,
    Adapter, AdapterError, Bucket, Category, CategoryCounts, Finding, Location, ScanResult,
    Severity, SeverityBreakdown, Summary, Tool,
};
