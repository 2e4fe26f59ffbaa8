use std::fmt::Write;

use crate::scan::{Finding, ScanResult};

/// Format styles supported by the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render the aggregate as either a fixed-layout text report or the full
/// machine-readable JSON document. Writing the result anywhere is the
/// caller's concern.
pub fn render_report(result: &ScanResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
    }
}

fn render_human(result: &ScanResult) -> anyhow::Result<String> {
    let mut out = String::new();
    let banner = "=".repeat(80);
    writeln!(out, "{banner}")?;
    writeln!(out, "Security Scan Report")?;
    writeln!(out, "{banner}")?;
    writeln!(out)?;

    let summary = &result.summary;
    writeln!(out, "Total Issues Found: {}", summary.total_issues)?;
    writeln!(out)?;
    writeln!(out, "Severity Breakdown:")?;
    let breakdown = summary.severity_breakdown;
    writeln!(out, "  HIGH: {}", breakdown.high)?;
    writeln!(out, "  MEDIUM: {}", breakdown.medium)?;
    writeln!(out, "  LOW: {}", breakdown.low)?;
    writeln!(out, "  INFO: {}", breakdown.info)?;
    writeln!(out)?;

    let sections = [
        ("Static Analysis", &result.static_analysis),
        ("Dependency Scan", &result.dependency_scan),
        ("Code Quality", &result.code_quality),
        ("Security Issues", &result.security_issues),
    ];
    for (title, findings) in sections {
        if findings.is_empty() {
            continue;
        }
        writeln!(out, "{title}:")?;
        writeln!(out, "{}", "-".repeat(40))?;
        for finding in findings {
            render_finding(&mut out, finding)?;
        }
    }

    Ok(out)
}

fn render_finding(out: &mut String, finding: &Finding) -> anyhow::Result<()> {
    writeln!(
        out,
        "  [{}] {}",
        finding.severity.as_str().to_uppercase(),
        finding.message
    )?;
    if let Some(location) = &finding.location {
        writeln!(out, "    File: {}", location.file.display())?;
        if let Some(line) = location.line {
            writeln!(out, "    Line: {line}")?;
        }
    }
    writeln!(out)?;
    Ok(())
}
