use std::path::Path;

use tracing::{debug, instrument, warn};

use super::clang_tidy::ClangTidyAdapter;
use super::cppcheck::CppcheckAdapter;
use super::dependencies::DependencyAdapter;
use super::pattern_scan::PatternScanAdapter;
use super::permissions::PermissionAdapter;
use super::{Adapter, CategoryCounts, ScanResult, Severity, SeverityBreakdown, Summary};

/// Runs a configured set of adapters and collects their findings into the
/// correct buckets. A failing adapter is logged and contributes nothing;
/// partial results always beat aborting the scan.
pub struct Aggregator {
    adapters: Vec<Box<dyn Adapter>>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Box<dyn Adapter>>) -> Self {
        Self { adapters }
    }

    /// All five backends in their fixed execution order.
    pub fn with_default_adapters() -> Self {
        Self::new(vec![
            Box::new(CppcheckAdapter::new()),
            Box::new(ClangTidyAdapter::new()),
            Box::new(PatternScanAdapter::new()),
            Box::new(DependencyAdapter::new()),
            Box::new(PermissionAdapter::new()),
        ])
    }

    /// Run every adapter sequentially against `project_root`, then derive the
    /// summary in one final pass. The returned aggregate is owned by the
    /// caller; nothing is shared across runs.
    #[instrument(name = "aggregate_scan", skip_all)]
    pub async fn run(&self, project_root: &Path) -> ScanResult {
        let mut result = ScanResult::default();
        for adapter in &self.adapters {
            match adapter.collect(project_root).await {
                Ok(findings) => {
                    debug!(tool = %adapter.tool(), count = findings.len(), "backend finished");
                    result.bucket_mut(adapter.bucket()).extend(findings);
                }
                Err(err) => {
                    warn!(tool = %adapter.tool(), %err, "backend contributed no findings");
                }
            }
        }
        result.summary = summarize(&result);
        result
    }
}

/// Reduce the finding buckets into severity and per-bucket counts.
///
/// Pure over the bucket contents: `total_issues` spans the three
/// issue-bearing buckets, and severities outside the four core values are
/// counted under `info`.
pub fn summarize(result: &ScanResult) -> Summary {
    let mut breakdown = SeverityBreakdown::default();
    let mut total_issues = 0;

    for bucket in result.issue_buckets() {
        for finding in bucket {
            total_issues += 1;
            match finding.severity {
                Severity::High => breakdown.high += 1,
                Severity::Medium => breakdown.medium += 1,
                Severity::Low => breakdown.low += 1,
                _ => breakdown.info += 1,
            }
        }
    }

    Summary {
        total_issues,
        severity_breakdown: breakdown,
        categories: CategoryCounts {
            static_analysis: result.static_analysis.len(),
            security_issues: result.security_issues.len(),
            dependency_scan: result.dependency_scan.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{AdapterError, Bucket, Category, Finding, Tool};
    use async_trait::async_trait;
    use proptest::prelude::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            tool: Tool::SecurityScanner,
            category: Category::WeakCrypto,
            severity,
            message: "test finding".into(),
            location: None,
            raw_match: None,
        }
    }

    struct StaticAdapter {
        bucket: Bucket,
        findings: Vec<Finding>,
    }

    #[async_trait]
    impl Adapter for StaticAdapter {
        fn tool(&self) -> Tool {
            Tool::SecurityScanner
        }

        fn bucket(&self) -> Bucket {
            self.bucket
        }

        async fn collect(&self, _project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
            Ok(self.findings.clone())
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl Adapter for FailingAdapter {
        fn tool(&self) -> Tool {
            Tool::Cppcheck
        }

        fn bucket(&self) -> Bucket {
            Bucket::StaticAnalysis
        }

        async fn collect(&self, _project_root: &Path) -> Result<Vec<Finding>, AdapterError> {
            Err(AdapterError::ToolMissing { tool: "cppcheck" })
        }
    }

    #[tokio::test]
    async fn failing_backend_does_not_abort_the_scan() {
        let aggregator = Aggregator::new(vec![
            Box::new(FailingAdapter),
            Box::new(StaticAdapter {
                bucket: Bucket::SecurityIssues,
                findings: vec![finding(Severity::High), finding(Severity::Medium)],
            }),
        ]);

        let result = aggregator.run(Path::new(".")).await;
        assert!(result.static_analysis.is_empty());
        assert_eq!(result.security_issues.len(), 2);
        assert_eq!(result.summary.total_issues, 2);
        assert_eq!(result.summary.severity_breakdown.high, 1);
    }

    #[tokio::test]
    async fn buckets_follow_the_producing_adapter() {
        let aggregator = Aggregator::new(vec![
            Box::new(StaticAdapter {
                bucket: Bucket::StaticAnalysis,
                findings: vec![finding(Severity::Passthrough("warning".into()))],
            }),
            Box::new(StaticAdapter {
                bucket: Bucket::DependencyScan,
                findings: vec![finding(Severity::Medium)],
            }),
        ]);

        let result = aggregator.run(Path::new(".")).await;
        assert_eq!(result.static_analysis.len(), 1);
        assert_eq!(result.dependency_scan.len(), 1);
        assert!(result.security_issues.is_empty());
        assert!(result.code_quality.is_empty());
        assert_eq!(result.summary.categories.static_analysis, 1);
        assert_eq!(result.summary.categories.dependency_scan, 1);
    }

    #[test]
    fn passthrough_severities_count_as_info() {
        let mut result = ScanResult::default();
        result.static_analysis.push(finding(Severity::Passthrough("error".into())));
        result.static_analysis.push(finding(Severity::Passthrough("style".into())));
        result.security_issues.push(finding(Severity::Info));

        let summary = summarize(&result);
        assert_eq!(summary.total_issues, 3);
        assert_eq!(summary.severity_breakdown.info, 3);
        assert_eq!(summary.severity_breakdown.high, 0);
    }

    #[test]
    fn code_quality_is_excluded_from_totals() {
        let mut result = ScanResult::default();
        result.code_quality.push(finding(Severity::High));
        result.security_issues.push(finding(Severity::Low));

        let summary = summarize(&result);
        assert_eq!(summary.total_issues, 1);
        assert_eq!(summary.severity_breakdown.high, 0);
        assert_eq!(summary.severity_breakdown.low, 1);
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::High),
            Just(Severity::Medium),
            Just(Severity::Low),
            Just(Severity::Info),
            Just(Severity::Passthrough("warning".into())),
            Just(Severity::Passthrough("unknown".into())),
        ]
    }

    proptest! {
        #[test]
        fn summary_totals_match_bucket_lengths(
            static_sev in proptest::collection::vec(severity_strategy(), 0..16),
            security_sev in proptest::collection::vec(severity_strategy(), 0..16),
            dependency_sev in proptest::collection::vec(severity_strategy(), 0..16),
        ) {
            let mut result = ScanResult::default();
            result.static_analysis = static_sev.iter().cloned().map(finding).collect();
            result.security_issues = security_sev.iter().cloned().map(finding).collect();
            result.dependency_scan = dependency_sev.iter().cloned().map(finding).collect();

            let summary = summarize(&result);
            let expected_total = static_sev.len() + security_sev.len() + dependency_sev.len();
            prop_assert_eq!(summary.total_issues, expected_total);

            let breakdown = summary.severity_breakdown;
            prop_assert_eq!(
                breakdown.high + breakdown.medium + breakdown.low + breakdown.info,
                expected_total
            );

            let all = static_sev.iter().chain(&security_sev).chain(&dependency_sev);
            let high = all.clone().filter(|s| **s == Severity::High).count();
            prop_assert_eq!(breakdown.high, high);
            let core = [Severity::High, Severity::Medium, Severity::Low];
            let info = all.filter(|s| !core.contains(*s)).count();
            prop_assert_eq!(breakdown.info, info);
        }
    }
}
