//! SR-IOV interface selection
//!
//! Scans the host network device tree for a physical function that
//! exposes virtual functions and is not made by a disallowed vendor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Selector errors
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Failed to enumerate network interfaces under {path}: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where to look and which vendors to skip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorPolicy {
    /// Network device listing, normally `/sys/class/net`
    pub sysfs_root: PathBuf,

    /// PCI vendor IDs never picked, e.g. `0x8086`
    pub disallowed_vendors: Vec<String>,
}

impl Default for SelectorPolicy {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/net"),
            disallowed_vendors: vec!["0x8086".to_string()],
        }
    }
}

impl SelectorPolicy {
    #[cfg(test)]
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            ..Default::default()
        }
    }

    pub fn disallow(mut self, vendor: impl Into<String>) -> Self {
        self.disallowed_vendors.push(vendor.into());
        self
    }

    pub fn allow_all(mut self) -> Self {
        self.disallowed_vendors.clear();
        self
    }

    fn is_disallowed(&self, vendor: &str) -> bool {
        let vendor = normalize_vendor(vendor);
        self.disallowed_vendors
            .iter()
            .any(|v| normalize_vendor(v) == vendor)
    }
}

/// `0X8086`, `8086` and `0x8086` all compare equal
fn normalize_vendor(vendor: &str) -> String {
    let v = vendor.trim().to_lowercase();
    match v.strip_prefix("0x") {
        Some(_) => v,
        None => format!("0x{v}"),
    }
}

/// Link state of an interface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Up,
    Down,
}

/// Snapshot of one interface's SR-IOV related attributes
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    pub name: String,

    /// `device/sriov_totalvfs`, absent when the device has no SR-IOV
    pub total_vfs: Option<u32>,

    /// `device/vendor`
    pub vendor: Option<String>,

    /// `carrier`; unreadable when the link is administratively down
    pub carrier: Option<Carrier>,
}

/// Why an interface was not picked
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    NoSriov,
    NoVirtualFunctions,
    NoVendor,
    DisallowedVendor(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoSriov => write!(f, "no SR-IOV capability"),
            Rejection::NoVirtualFunctions => write!(f, "zero virtual functions"),
            Rejection::NoVendor => write!(f, "no vendor identifier"),
            Rejection::DisallowedVendor(v) => write!(f, "disallowed vendor {v}"),
        }
    }
}

impl InterfaceRecord {
    /// Read the attributes of the interface directory `dir`
    pub fn read(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let total_vfs = read_attr(&dir.join("device/sriov_totalvfs")).and_then(|v| v.parse().ok());
        let vendor = read_attr(&dir.join("device/vendor")).filter(|v| !v.is_empty());
        let carrier = read_attr(&dir.join("carrier")).and_then(|v| match v.as_str() {
            "1" => Some(Carrier::Up),
            "0" => Some(Carrier::Down),
            _ => None,
        });

        Self {
            name,
            total_vfs,
            vendor,
            carrier,
        }
    }

    /// Check capability then vendor, stopping at the first failure.
    ///
    /// Carrier is informational only.
    pub fn rejection(&self, policy: &SelectorPolicy) -> Option<Rejection> {
        match self.total_vfs {
            None => return Some(Rejection::NoSriov),
            Some(0) => return Some(Rejection::NoVirtualFunctions),
            Some(_) => {}
        }

        let Some(vendor) = self.vendor.as_deref() else {
            return Some(Rejection::NoVendor);
        };
        if policy.is_disallowed(vendor) {
            return Some(Rejection::DisallowedVendor(vendor.to_string()));
        }

        None
    }
}

/// Missing or unreadable files are not errors
fn read_attr(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Snapshot every interface directory under `root`, sorted by name
pub fn scan_interfaces(root: &Path) -> Result<Vec<InterfaceRecord>, SelectorError> {
    let entries = fs::read_dir(root).map_err(|source| SelectorError::Enumerate {
        path: root.to_path_buf(),
        source,
    })?;

    // Plain files such as `bonding_masters` share the listing
    let mut records: Vec<InterfaceRecord> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|path| InterfaceRecord::read(&path))
        .filter(|record| !record.name.is_empty())
        .collect();

    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

/// Pick the first eligible interface from a snapshot
pub fn select_from<'a>(
    records: &'a [InterfaceRecord],
    policy: &SelectorPolicy,
) -> Option<&'a InterfaceRecord> {
    records.iter().find(|record| match record.rejection(policy) {
        Some(reason) => {
            debug!("Skipping {}: {}", record.name, reason);
            false
        }
        None => {
            if record.carrier != Some(Carrier::Up) {
                debug!("{} has no carrier, selecting it anyway", record.name);
            }
            true
        }
    })
}

/// Find an SR-IOV capable interface not made by a disallowed vendor.
///
/// `Ok(None)` means nothing matched; `Err` only when the listing itself
/// cannot be read.
pub fn select_sriov_interface(policy: &SelectorPolicy) -> Result<Option<String>, SelectorError> {
    let records = scan_interfaces(&policy.sysfs_root)?;

    match select_from(&records, policy) {
        Some(record) => {
            info!(
                "Selected {} ({} VFs, vendor {})",
                record.name,
                record.total_vfs.unwrap_or(0),
                record.vendor.as_deref().unwrap_or("?")
            );
            Ok(Some(record.name.clone()))
        }
        None => {
            info!(
                "No SR-IOV interface found among {} candidates",
                records.len()
            );
            Ok(None)
        }
    }
}
