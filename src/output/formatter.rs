//! Output formatters
//!
//! Renders lifecycle reports and interface scans as tables or JSON.

use serde::Serialize;

use crate::models::LifecycleReport;
use crate::sriov::{InterfaceRecord, SelectorPolicy};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            _ => None,
        }
    }
}

/// One row of the interface listing
#[derive(Serialize)]
struct InterfaceRow<'a> {
    #[serde(flatten)]
    record: &'a InterfaceRecord,
    eligible: bool,
    reason: Option<String>,
}

#[derive(Serialize)]
struct InterfaceListing<'a> {
    interfaces: Vec<InterfaceRow<'a>>,
    selected: Option<&'a str>,
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        match self.format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(value).unwrap_or_default(),
            _ => serde_json::to_string(value).unwrap_or_default(),
        }
    }

    /// Format a lifecycle report
    pub fn format_report(&self, report: &LifecycleReport) -> String {
        if self.format != OutputFormat::Table {
            return self.to_json(report);
        }

        let status = match (report.passed, self.colorize) {
            (true, true) => "\x1b[32m✓ PASS\x1b[0m",
            (false, true) => "\x1b[31m✗ FAIL\x1b[0m",
            (true, false) => "✓ PASS",
            (false, false) => "✗ FAIL",
        };

        format!(
            "{:8} {:30} {} {:>8}ms  {}",
            report.variant.name(),
            report.name,
            status,
            report.duration_ms,
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    /// Format an interface scan and the selection made from it
    pub fn format_interfaces(
        &self,
        records: &[InterfaceRecord],
        policy: &SelectorPolicy,
        selected: Option<&str>,
    ) -> String {
        let rows: Vec<InterfaceRow> = records
            .iter()
            .map(|record| {
                let reason = record.rejection(policy).map(|r| r.to_string());
                InterfaceRow {
                    record,
                    eligible: reason.is_none(),
                    reason,
                }
            })
            .collect();

        if self.format != OutputFormat::Table {
            return self.to_json(&InterfaceListing {
                interfaces: rows,
                selected,
            });
        }

        let mut output = format!(
            "{:16} {:>5} {:8} {:8} {}\n",
            "INTERFACE", "VFS", "VENDOR", "CARRIER", "STATUS"
        );
        output.push_str(&"─".repeat(60));
        output.push('\n');

        for row in &rows {
            let record = row.record;
            let carrier = match record.carrier {
                Some(c) => format!("{c:?}").to_lowercase(),
                None => "-".to_string(),
            };
            output.push_str(&format!(
                "{:16} {:>5} {:8} {:8} {}\n",
                record.name,
                record
                    .total_vfs
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                record.vendor.as_deref().unwrap_or("-"),
                carrier,
                row.reason.as_deref().unwrap_or("eligible"),
            ));
        }

        output.push_str(&format!("\nSelected: {}", selected.unwrap_or("none")));
        output
    }
}
