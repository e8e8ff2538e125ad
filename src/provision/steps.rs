//! Provisioning steps
//!
//! Each step issues its command(s) through the runner and reduces the
//! outcome to a bool. The sequences in `vm` and `sriov` chain them.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::executor::{CommandExecutor, CommandRunner};
use crate::lxd::{self, LxdCli};
use crate::models::{ImageSource, InstanceSpec};
use crate::utils::retry::retry;

/// Resolve the image reference for `init`, downloading and importing
/// template artifacts when that is the chosen source.
pub async fn prepare_image<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> Option<String> {
    let Some(source) = spec.image.resolve() else {
        error!(
            "No image source for {}: set a remote and OS version, or a template URL",
            spec.name
        );
        return None;
    };

    let (template_url, image_url) = match source {
        ImageSource::Remote { reference } => {
            debug!("Using remote image {} for {}", reference, spec.name);
            return Some(reference);
        }
        ImageSource::Template {
            template_url,
            image_url,
        } => (template_url, image_url),
    };

    if let Err(e) = std::fs::create_dir_all(&spec.work_dir) {
        error!(
            "Failed to create work dir {}: {}",
            spec.work_dir.display(),
            e
        );
        return None;
    }

    let template_path = fetch(runner, &spec.work_dir, "template", &template_url).await?;
    let image_path = match image_url {
        Some(url) => Some(fetch(runner, &spec.work_dir, "image", &url).await?),
        None => None,
    };

    let alias = spec.image_alias();
    let import = lxc.image_import(&template_path, image_path.as_deref(), &alias);
    if !runner.run_command(&import, true).await {
        return None;
    }

    info!("Imported image {} for {}", alias, spec.name);
    Some(alias)
}

async fn fetch<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    dir: &Path,
    prefix: &str,
    url: &str,
) -> Option<PathBuf> {
    let dest = dir.join(artifact_file_name(prefix, url));
    debug!("Downloading {} to {}", url, dest.display());

    if runner.run_command(&lxd::download(url, &dest), true).await {
        Some(dest)
    } else {
        None
    }
}

/// `<prefix>-<last path segment>` with query and fragment stripped
fn artifact_file_name(prefix: &str, url: &str) -> String {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    match path.rsplit('/').next().filter(|s| !s.is_empty() && !s.contains(':')) {
        Some(segment) => format!("{prefix}-{segment}"),
        None => prefix.to_string(),
    }
}

pub async fn init<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
    image: &str,
    vm: bool,
) -> bool {
    debug!("Creating {} from {}", spec.name, image);
    runner
        .run_command(&lxc.init(image, &spec.name, vm), true)
        .await
}

pub async fn configure<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> bool {
    runner
        .run_command(&lxc.set_autostart(&spec.name), true)
        .await
}

pub async fn start<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> bool {
    debug!("Starting {}", spec.name);
    runner.run_command(&lxc.start(&spec.name), true).await
}

pub async fn attach_device<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> bool {
    let Some(parent) = spec.network_device.as_deref() else {
        error!("No physical function to attach to {}", spec.name);
        return false;
    };

    debug!(
        "Attaching VF from {} to {} as {}",
        parent, spec.name, spec.device_name
    );
    runner
        .run_command(
            &lxc.add_sriov_nic(&spec.name, &spec.device_name, parent),
            true,
        )
        .await
}

/// Poll `lxc list` until the instance reports ready or the bound is hit
pub async fn wait_ready<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> bool {
    let list = lxc.list(&spec.name);
    let list = &list;
    let name = spec.name.as_str();
    let require_address = spec.require_address;
    let label = format!("Readiness of {name}");

    retry(&spec.poll, &label, || async move {
        let Some(output) = runner.run_capture(list, true).await else {
            return false;
        };

        match lxd::parse_list(&output, name) {
            Ok(Some(status)) => {
                debug!("{} is {:?} with IPv4 {:?}", name, status.state, status.ipv4);
                status.is_ready(require_address)
            }
            Ok(None) => {
                debug!("{} not listed yet", name);
                false
            }
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        }
    })
    .await
}

pub async fn verify<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
) -> bool {
    if spec.verify_command.is_empty() {
        error!("No verification command configured for {}", spec.name);
        return false;
    }

    runner
        .run_command(&lxc.exec(&spec.name, &spec.verify_command), true)
        .await
}

/// Tear down everything the sequence may have created.
///
/// Targets may not exist; failures are logged and swallowed.
pub async fn cleanup<E: CommandExecutor>(
    runner: &CommandRunner<E>,
    lxc: &LxdCli,
    spec: &InstanceSpec,
    device: Option<&str>,
) {
    info!("Cleaning up {}", spec.name);

    if let Some(device) = device {
        if !runner
            .run_command(&lxc.remove_device(&spec.name, device), false)
            .await
        {
            debug!("No {} device attached to {}", device, spec.name);
        }
    }

    if !runner.run_command(&lxc.delete(&spec.name), false).await {
        debug!("{} was not present", spec.name);
    }

    if let Some(ImageSource::Template { .. }) = spec.image.resolve() {
        let alias = spec.image_alias();
        if !runner.run_command(&lxc.image_delete(&alias), false).await {
            debug!("Image {} was not present", alias);
        }

        if spec.work_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&spec.work_dir) {
                warn!(
                    "Failed to remove work dir {}: {}",
                    spec.work_dir.display(),
                    e
                );
            }
        }
    }

    info!("Cleanup of {} complete", spec.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::ScriptedExecutor;
    use crate::executor::CommandOutput;
    use crate::models::ImageConfig;
    use crate::utils::retry::RetryPolicy;
    use std::time::Duration;

    fn template_spec(dir: &Path) -> InstanceSpec {
        InstanceSpec::new("testbed")
            .with_work_dir(dir.join("work"))
            .with_image(ImageConfig {
                template_url: Some("http://example.com/lxd/meta.tar.xz?x=1".to_string()),
                image_url: Some("http://example.com/lxd/disk.qcow2".to_string()),
                ..Default::default()
            })
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("template", "http://h/a/meta.tar.xz?sig=1"),
            "template-meta.tar.xz"
        );
        assert_eq!(artifact_file_name("image", "http://h/"), "image");
    }

    #[tokio::test]
    async fn test_prepare_image_remote_runs_nothing() {
        let runner = CommandRunner::new(ScriptedExecutor::new());
        let spec = InstanceSpec::new("testbed").with_image(ImageConfig {
            default_remote: Some("ubuntu:".to_string()),
            os_version: Some("24.04".to_string()),
            ..Default::default()
        });

        let image = prepare_image(&runner, &LxdCli::default(), &spec).await;

        assert_eq!(image.as_deref(), Some("ubuntu:24.04"));
        assert_eq!(runner.executor().call_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_image_template_downloads_and_imports() {
        let dir = tempfile::tempdir().unwrap();
        let spec = template_spec(dir.path());
        let runner = CommandRunner::new(ScriptedExecutor::new());

        let image = prepare_image(&runner, &LxdCli::default(), &spec).await;

        assert_eq!(image.as_deref(), Some("testbed-image"));
        assert!(spec.work_dir.is_dir());

        let calls = runner.executor().calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].program, "curl");
        assert_eq!(calls[1].program, "curl");
        assert_eq!(
            calls[2].args[..2],
            ["image".to_string(), "import".to_string()]
        );
        assert!(calls[2].has_arg("testbed-image"));
    }

    #[tokio::test]
    async fn test_prepare_image_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spec = template_spec(dir.path());
        let runner = CommandRunner::new(ScriptedExecutor::new().fail());

        assert!(prepare_image(&runner, &LxdCli::default(), &spec)
            .await
            .is_none());
        assert_eq!(runner.executor().call_count(), 1);
    }

    #[tokio::test]
    async fn test_wait_ready_second_attempt() {
        let runner = CommandRunner::new(
            ScriptedExecutor::new()
                .ok_with("testbed,STARTING,\n")
                .ok_with("testbed,RUNNING,10.1.1.4 (enp5s0)\n")
                .otherwise_fail(),
        );
        let spec = InstanceSpec::new("testbed").with_poll(RetryPolicy::new(4, Duration::ZERO));

        assert!(wait_ready(&runner, &LxdCli::default(), &spec).await);
        assert_eq!(runner.executor().call_count(), 2);
    }

    #[tokio::test]
    async fn test_wait_ready_exhausted() {
        let runner = CommandRunner::new(
            ScriptedExecutor::new().otherwise(CommandOutput::new(0, "testbed,RUNNING,\n", None)),
        );
        let spec = InstanceSpec::new("testbed").with_poll(RetryPolicy::new(3, Duration::ZERO));

        assert!(!wait_ready(&runner, &LxdCli::default(), &spec).await);
        assert_eq!(runner.executor().call_count(), 3);
    }

    #[tokio::test]
    async fn test_verify_requires_command() {
        let runner = CommandRunner::new(ScriptedExecutor::new());
        let mut spec = InstanceSpec::new("testbed");
        spec.verify_command.clear();

        assert!(!verify(&runner, &LxdCli::default(), &spec).await);
        assert_eq!(runner.executor().call_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_resources() {
        let dir = tempfile::tempdir().unwrap();
        let spec = template_spec(dir.path());
        std::fs::create_dir_all(&spec.work_dir).unwrap();
        let runner = CommandRunner::new(ScriptedExecutor::new().otherwise_fail());

        cleanup(&runner, &LxdCli::default(), &spec, Some("vf0")).await;

        let calls = runner.executor().calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].has_arg("remove"));
        assert_eq!(calls[1].args, vec!["delete", "testbed", "--force"]);
        assert_eq!(calls[2].args, vec!["image", "delete", "testbed-image"]);
        assert!(!spec.work_dir.exists());
    }
}
