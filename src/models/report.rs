//! Lifecycle report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which provisioning sequence produced a report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Vm,
    Sriov,
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Vm => "VM",
            Variant::Sriov => "SR-IOV",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one provision/verify/cleanup attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub name: String,
    pub variant: Variant,
    pub passed: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} ({}ms)",
            self.variant,
            self.name,
            if self.passed { "PASS" } else { "FAIL" },
            self.duration_ms
        )
    }
}
