//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "LXD_VTEST";

/// Configuration from LXD_VTEST_* environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Instance name from LXD_VTEST_NAME
    pub name: Option<String>,
    /// Image remote from LXD_VTEST_REMOTE
    pub remote: Option<String>,
    /// OS version from LXD_VTEST_OS_VERSION
    pub os_version: Option<String>,
    /// Template URL from LXD_VTEST_TEMPLATE_URL
    pub template_url: Option<String>,
    /// Image URL from LXD_VTEST_IMAGE_URL
    pub image_url: Option<String>,
    /// SR-IOV parent from LXD_VTEST_PARENT
    pub parent: Option<String>,
    /// Poll attempts from LXD_VTEST_POLL_ATTEMPTS
    pub poll_attempts: Option<u32>,
    /// Poll interval from LXD_VTEST_POLL_INTERVAL
    pub poll_interval: Option<u64>,
    /// Config file from LXD_VTEST_CONFIG
    pub config_file: Option<String>,
    /// Log level from LXD_VTEST_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` to resolve full variable names
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.trim().is_empty())
        };

        Self {
            name: get("NAME"),
            remote: get("REMOTE"),
            os_version: get("OS_VERSION"),
            template_url: get("TEMPLATE_URL"),
            image_url: get("IMAGE_URL"),
            parent: get("PARENT"),
            poll_attempts: parse(get("POLL_ATTEMPTS")),
            poll_interval: parse(get("POLL_INTERVAL")),
            config_file: get("CONFIG"),
            log_level: get("LOG"),
        }
    }

    /// Check if any override is set
    pub fn has_any(&self) -> bool {
        self != &Self::default()
    }

    /// Overlay the set variables onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(name) = &self.name {
            config.instance.name = name.clone();
        }
        if let Some(remote) = &self.remote {
            config.image.default_remote = Some(remote.clone());
        }
        if let Some(version) = &self.os_version {
            config.image.os_version = Some(version.clone());
        }
        if let Some(url) = &self.template_url {
            config.image.template_url = Some(url.clone());
        }
        if let Some(url) = &self.image_url {
            config.image.image_url = Some(url.clone());
        }
        if let Some(parent) = &self.parent {
            config.sriov.parent = Some(parent.clone());
        }
        if let Some(attempts) = self.poll_attempts {
            config.poll.max_attempts = attempts;
        }
        if let Some(interval) = self.poll_interval {
            config.poll.interval_secs = interval;
        }
    }
}

fn parse<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Print all LXD_VTEST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_NAME           Instance name");
    println!("  {ENV_PREFIX}_REMOTE         Image remote (e.g. ubuntu:)");
    println!("  {ENV_PREFIX}_OS_VERSION     Image alias on the remote (e.g. 24.04)");
    println!("  {ENV_PREFIX}_TEMPLATE_URL   Image metadata tarball URL");
    println!("  {ENV_PREFIX}_IMAGE_URL      Disk image or rootfs URL");
    println!("  {ENV_PREFIX}_PARENT         SR-IOV physical function");
    println!("  {ENV_PREFIX}_POLL_ATTEMPTS  Readiness poll attempts");
    println!("  {ENV_PREFIX}_POLL_INTERVAL  Seconds between readiness polls");
    println!("  {ENV_PREFIX}_CONFIG         Path to configuration file");
    println!("  {ENV_PREFIX}_LOG            Log level (trace, debug, info, warn, error)");
}
