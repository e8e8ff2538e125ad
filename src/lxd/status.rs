//! Instance status parsing
//!
//! Reads the CSV form of `lxc list` into typed status records.

use anyhow::{Context, Result};
use serde::Serialize;

/// LXD instance states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum InstanceState {
    Running,
    Stopped,
    Frozen,
    Error,
    Unknown,
}

impl InstanceState {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "running" => InstanceState::Running,
            "stopped" => InstanceState::Stopped,
            "frozen" => InstanceState::Frozen,
            "error" => InstanceState::Error,
            _ => InstanceState::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }
}

/// One row of `lxc list`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub name: String,
    pub state: InstanceState,
    pub ipv4: Vec<String>,
}

impl InstanceStatus {
    /// Running and, when `require_address` is set, holding an IPv4 address
    pub fn is_ready(&self, require_address: bool) -> bool {
        self.state.is_running() && (!require_address || !self.ipv4.is_empty())
    }
}

/// Find the row for `name` in CSV list output.
///
/// `lxc list <name>` filters by prefix, so rows for other instances
/// may be present.
pub fn parse_list(output: &str, name: &str) -> Result<Option<InstanceStatus>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(output.as_bytes());

    for record in reader.records() {
        let record = record.context("Failed to parse instance list")?;

        if record.get(0).map(str::trim) != Some(name) {
            continue;
        }

        let state = InstanceState::from_str(record.get(1).unwrap_or(""));
        let ipv4 = record
            .get(2)
            .unwrap_or("")
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect();

        return Ok(Some(InstanceStatus {
            name: name.to_string(),
            state,
            ipv4,
        }));
    }

    Ok(None)
}
