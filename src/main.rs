//! lxd-vtest - ephemeral LXD test target provisioning
//!
//! Creates a virtual machine (optionally with an SR-IOV virtual function
//! attached), waits for it to come up, proves it runs commands, and
//! always deletes it afterwards.
//!
//! ## Usage
//!
//! ```bash
//! # Boot and verify an Ubuntu VM matching the host release (remote ubuntu:)
//! lxd-vtest vm
//!
//! # Same, from downloaded image artifacts
//! lxd-vtest vm --template-url https://host/lxd.tar.xz --image-url https://host/disk.qcow2
//!
//! # Attach a VF to a container, picking the physical function automatically
//! lxd-vtest sriov --type container
//!
//! # Show which interface would be picked
//! lxd-vtest interfaces
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod executor;
mod lxd;
mod models;
mod output;
mod provision;
mod sriov;
mod utils;

use cli::{Args, ConfigAction, RunArgs};
use config::{AppConfig, EnvConfig};
use executor::{CommandRunner, SystemExecutor};
use lxd::LxdCli;
use models::{host_os_version, LifecycleReport, TestType};
use output::{OutputFormat, ResultFormatter};
use provision::{run_lifecycle, SriovTest, VmTest};
use utils::logger::{init_logger, LogLevel};

const OS_RELEASE: &str = "/etc/os-release";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = args
        .log_level
        .as_deref()
        .or(env.log_level.as_deref())
        .and_then(LogLevel::from_str)
        .unwrap_or(if args.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        });
    init_logger(level);

    let config_path = args
        .config
        .clone()
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));
    let mut config = match config_path {
        Some(path) => AppConfig::load(&path)?,
        None => AppConfig::load_default()?,
    };
    if env.has_any() {
        debug!("Applying LXD_VTEST_* environment overrides");
        env.apply(&mut config);
    }

    let format = OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table);
    let formatter = if args.no_color {
        ResultFormatter::new(format).no_color()
    } else {
        ResultFormatter::new(format)
    };

    match args.command {
        cli::Command::Vm(run) => {
            apply_run_args(&mut config, &run)?;
            fill_os_version(&mut config);
            config.validate()?;

            let test = VmTest::new(
                CommandRunner::new(SystemExecutor),
                LxdCli::new(&config.lxd.binary),
                config.instance_spec(),
            );
            finish(&formatter, run_lifecycle(&test).await);
        }
        cli::Command::Sriov(sriov_args) => {
            apply_run_args(&mut config, &sriov_args.run)?;
            if let Some(raw) = &sriov_args.test_type {
                config.instance.test_type = TestType::from_str(raw)
                    .with_context(|| format!("Unknown instance type: {raw}"))?;
            }
            if sriov_args.parent.is_some() {
                config.sriov.parent = sriov_args.parent.clone();
            }
            fill_os_version(&mut config);
            config.validate()?;

            if config.sriov.parent.is_none() {
                config.sriov.parent = sriov::select_sriov_interface(&config.sriov.selector)?;
                if config.sriov.parent.is_none() {
                    warn!("No SR-IOV capable interface found; setup will fail");
                }
            }

            let test = SriovTest::new(
                CommandRunner::new(SystemExecutor),
                LxdCli::new(&config.lxd.binary),
                config.instance_spec(),
            );
            finish(&formatter, run_lifecycle(&test).await);
        }
        cli::Command::Interfaces(iface_args) => {
            let policy = iface_args.policy(config.sriov.selector.clone());

            let records = sriov::scan_interfaces(&policy.sysfs_root)?;
            let selected = sriov::select_from(&records, &policy).map(|r| r.name.as_str());
            println!("{}", formatter.format_interfaces(&records, &policy, selected));
        }
        cli::Command::Config(config_args) => manage_config(config_args.action, &config)?,
    }

    Ok(())
}

/// Command-line values take precedence over file and environment
fn apply_run_args(config: &mut AppConfig, run: &RunArgs) -> Result<()> {
    if let Some(name) = &run.name {
        config.instance.name = name.clone();
    }
    if let Some(remote) = &run.remote {
        config.image.default_remote = Some(remote.clone());
    }
    if let Some(version) = &run.os_version {
        config.image.os_version = Some(version.clone());
    }
    if let Some(url) = &run.template_url {
        config.image.template_url = Some(url.clone());
    }
    if let Some(url) = &run.image_url {
        config.image.image_url = Some(url.clone());
    }
    if let Some(attempts) = run.poll_attempts {
        config.poll.max_attempts = attempts;
    }
    if let Some(interval) = run.poll_interval {
        config.poll.interval_secs = interval;
    }
    if let Some(argv) = run.verify_argv()? {
        config.instance.verify_command = argv;
    }

    Ok(())
}

/// Use the host release as the remote alias unless a template was given
fn fill_os_version(config: &mut AppConfig) {
    if config.image.os_version.is_some() || config.image.template_url.is_some() {
        return;
    }

    match host_os_version(OS_RELEASE) {
        Ok(Some(version)) => {
            debug!("Using host release {} as image alias", version);
            config.image.os_version = Some(version);
        }
        Ok(None) => debug!("No VERSION_ID in {}", OS_RELEASE),
        Err(e) => debug!("{:#}", e),
    }
}

fn finish(formatter: &ResultFormatter, report: LifecycleReport) {
    println!("{}", formatter.format_report(&report));
    if !report.passed {
        std::process::exit(1);
    }
}

fn manage_config(action: ConfigAction, config: &AppConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
            println!("{yaml}");
        }
        ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            AppConfig::default().save(&path)?;
            info!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Env => config::print_env_help(),
    }

    Ok(())
}
