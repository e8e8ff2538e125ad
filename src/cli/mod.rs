//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::executor::HostCommand;
use crate::sriov::SelectorPolicy;

/// Provision and verify ephemeral LXD test instances
#[derive(Parser, Debug)]
#[command(name = "lxd-vtest")]
#[command(version)]
#[command(about = "Provision and verify LXD VMs and SR-IOV test instances")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, json-pretty)
    #[arg(short, long, global = true, default_value = "table")]
    pub format: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored table output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Boot a virtual machine, verify it and tear it down
    Vm(RunArgs),

    /// Boot an instance with an SR-IOV virtual function attached
    Sriov(SriovArgs),

    /// List host interfaces and the SR-IOV pick
    Interfaces(InterfacesArgs),

    /// Show or write configuration
    Config(ConfigArgs),
}

/// Options shared by the provisioning commands
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Instance name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Image remote (default ubuntu:)
    #[arg(long)]
    pub remote: Option<String>,

    /// Image alias on the remote; defaults to the host release
    #[arg(long)]
    pub os_version: Option<String>,

    /// Image metadata tarball URL
    #[arg(long)]
    pub template_url: Option<String>,

    /// Disk image or rootfs URL paired with the template
    #[arg(long)]
    pub image_url: Option<String>,

    /// Readiness poll attempts
    #[arg(long)]
    pub poll_attempts: Option<u32>,

    /// Seconds between readiness polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Command run inside the guest, split on whitespace (default "uname -a")
    #[arg(long)]
    pub verify: Option<String>,
}

impl RunArgs {
    /// Argument vector for `--verify`, if given
    pub fn verify_argv(&self) -> Result<Option<Vec<String>>> {
        self.verify
            .as_deref()
            .map(|raw| raw.parse::<HostCommand>().map(HostCommand::into_argv))
            .transpose()
    }
}

/// Arguments for the sriov command
#[derive(Parser, Debug)]
pub struct SriovArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Instance type (vm, container)
    #[arg(short = 't', long = "type")]
    pub test_type: Option<String>,

    /// Physical function; discovered when omitted
    #[arg(short, long)]
    pub parent: Option<String>,
}

/// Arguments for the interfaces command
#[derive(Parser, Debug)]
pub struct InterfacesArgs {
    /// Network device listing to scan
    #[arg(long)]
    pub sysfs_root: Option<PathBuf>,

    /// Vendor ID to exclude (repeatable); replaces the configured list
    #[arg(long = "disallow-vendor")]
    pub disallow_vendors: Vec<String>,
}

impl InterfacesArgs {
    /// Overlay the command-line selection options onto `base`
    pub fn policy(&self, base: SelectorPolicy) -> SelectorPolicy {
        let mut policy = match &self.sysfs_root {
            Some(root) => SelectorPolicy {
                sysfs_root: root.clone(),
                ..base
            },
            None => base,
        };

        if !self.disallow_vendors.is_empty() {
            policy = self
                .disallow_vendors
                .iter()
                .fold(policy.allow_all(), |policy, vendor| policy.disallow(vendor.as_str()));
        }

        policy
    }
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration to a file
    Init {
        /// Destination path
        #[arg(default_value = "lxd-vtest.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Describe environment variable overrides
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_args() {
        let args = Args::parse_from([
            "lxd-vtest",
            "vm",
            "--name",
            "vm-1",
            "--os-version",
            "24.04",
            "--format",
            "json",
        ]);
        assert_eq!(args.format, "json");
        assert!(!args.no_color);
        match args.command {
            Command::Vm(run) => {
                assert_eq!(run.verify_argv().unwrap(), None);
                assert_eq!(run.name.as_deref(), Some("vm-1"));
                assert_eq!(run.os_version.as_deref(), Some("24.04"));
                assert!(run.template_url.is_none());
            }
            _ => panic!("Expected Vm command"),
        }
    }

    #[test]
    fn test_sriov_args() {
        let args = Args::parse_from([
            "lxd-vtest",
            "sriov",
            "--type",
            "container",
            "--parent",
            "enp2s0f0",
            "--poll-attempts",
            "6",
        ]);
        match args.command {
            Command::Sriov(sriov) => {
                assert_eq!(sriov.test_type.as_deref(), Some("container"));
                assert_eq!(sriov.parent.as_deref(), Some("enp2s0f0"));
                assert_eq!(sriov.run.poll_attempts, Some(6));
            }
            _ => panic!("Expected Sriov command"),
        }
    }

    #[test]
    fn test_verify_argv() {
        let args = Args::parse_from([
            "lxd-vtest",
            "--no-color",
            "vm",
            "--verify",
            "cat /etc/os-release",
        ]);
        assert!(args.no_color);
        match args.command {
            Command::Vm(run) => assert_eq!(
                run.verify_argv().unwrap(),
                Some(vec!["cat".to_string(), "/etc/os-release".to_string()])
            ),
            _ => panic!("Expected Vm command"),
        }

        let blank = RunArgs {
            verify: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.verify_argv().is_err());
    }

    #[test]
    fn test_interfaces_policy_overrides() {
        let args = Args::parse_from([
            "lxd-vtest",
            "interfaces",
            "--sysfs-root",
            "/tmp/net",
            "--disallow-vendor",
            "0x15b3",
        ]);
        let Command::Interfaces(ifaces) = args.command else {
            panic!("Expected Interfaces command");
        };

        let policy = ifaces.policy(SelectorPolicy::default());

        assert_eq!(policy.sysfs_root, PathBuf::from("/tmp/net"));
        assert_eq!(policy.disallowed_vendors, vec!["0x15b3"]);

        let untouched = InterfacesArgs {
            sysfs_root: None,
            disallow_vendors: Vec::new(),
        }
        .policy(SelectorPolicy::default());
        assert_eq!(untouched, SelectorPolicy::default());
    }

    #[test]
    fn test_interfaces_args() {
        let args = Args::parse_from([
            "lxd-vtest",
            "interfaces",
            "--disallow-vendor",
            "0x8086",
            "--disallow-vendor",
            "0x14e4",
        ]);
        match args.command {
            Command::Interfaces(ifaces) => {
                assert_eq!(ifaces.disallow_vendors, vec!["0x8086", "0x14e4"]);
            }
            _ => panic!("Expected Interfaces command"),
        }
    }

    #[test]
    fn test_config_init_default_path() {
        let args = Args::parse_from(["lxd-vtest", "config", "init"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, PathBuf::from("lxd-vtest.yaml"));
                assert!(!force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
