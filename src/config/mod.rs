//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{default_work_dir, ImageConfig, InstanceSpec, TestType};
use crate::sriov::SelectorPolicy;
use crate::utils::retry::{Backoff, RetryPolicy};

/// Application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// LXD client settings
    pub lxd: LxdConfig,

    /// Instance under test
    pub instance: InstanceConfig,

    /// Image source
    pub image: ImageConfig,

    /// Readiness polling
    pub poll: PollConfig,

    /// SR-IOV interface selection
    pub sriov: SriovConfig,
}

impl AppConfig {
    /// Build the step context for one run
    pub fn instance_spec(&self) -> InstanceSpec {
        let work_dir = self
            .instance
            .work_dir
            .clone()
            .unwrap_or_else(|| default_work_dir(&self.instance.name));

        let mut spec = InstanceSpec::new(&self.instance.name)
            .with_test_type(self.instance.test_type)
            .with_image(self.image.clone())
            .with_poll(self.poll.policy())
            .with_work_dir(work_dir);

        spec.device_name = self.instance.device_name.clone();
        spec.verify_command = self.instance.verify_command.clone();
        spec.require_address = self.poll.require_address;
        match &self.sriov.parent {
            Some(parent) => spec.with_network_device(parent),
            None => spec,
        }
    }
}

/// LXD client configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LxdConfig {
    /// Path or name of the `lxc` binary
    pub binary: String,
}

impl Default for LxdConfig {
    fn default() -> Self {
        Self {
            binary: "lxc".to_string(),
        }
    }
}

/// Instance configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Instance name
    pub name: String,

    /// Instance kind for the SR-IOV sequence
    pub test_type: TestType,

    /// NIC device name for the attached VF
    pub device_name: String,

    /// Command run inside the guest
    pub verify_command: Vec<String>,

    /// Download directory for template images
    pub work_dir: Option<PathBuf>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: "testbed".to_string(),
            test_type: TestType::Vm,
            device_name: "vf0".to_string(),
            verify_command: vec!["uname".to_string(), "-a".to_string()],
            work_dir: None,
        }
    }
}

/// Readiness polling configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Number of `lxc list` attempts
    pub max_attempts: u32,

    /// Seconds between attempts
    pub interval_secs: u64,

    /// Delay growth
    pub backoff: Backoff,

    /// Wait for an IPv4 address as well as the running state
    pub require_address: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            interval_secs: policy.interval.as_secs(),
            backoff: policy.backoff,
            require_address: true,
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.interval_secs))
            .with_backoff(self.backoff)
    }
}

/// SR-IOV configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SriovConfig {
    /// Physical function to use; discovered when unset
    pub parent: Option<String>,

    /// Discovery settings
    #[serde(flatten)]
    pub selector: SelectorPolicy,
}
