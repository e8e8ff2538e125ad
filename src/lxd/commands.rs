//! LXD client command construction
//!
//! Builds the `lxc` invocations used by the provisioning steps.

use std::path::Path;

use crate::executor::HostCommand;

/// Columns requested from `lxc list`: name, state, IPv4
pub const LIST_COLUMNS: &str = "ns4";

/// Command builder for the `lxc` client
#[derive(Clone, Debug)]
pub struct LxdCli {
    binary: String,
}

impl Default for LxdCli {
    fn default() -> Self {
        Self::new("lxc")
    }
}

impl LxdCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> HostCommand {
        HostCommand::new(&self.binary)
    }

    /// Create (but do not start) an instance
    pub fn init(&self, image: &str, name: &str, vm: bool) -> HostCommand {
        let cmd = self.command().args(["init", image, name]);
        if vm {
            cmd.arg("--vm")
        } else {
            cmd
        }
    }

    pub fn set_autostart(&self, name: &str) -> HostCommand {
        self.command()
            .args(["config", "set", name, "boot.autostart", "true"])
    }

    pub fn start(&self, name: &str) -> HostCommand {
        self.command().args(["start", name])
    }

    pub fn list(&self, name: &str) -> HostCommand {
        self.command()
            .args(["list", name, "--format", "csv", "--columns", LIST_COLUMNS])
    }

    /// Run `argv` inside the instance
    pub fn exec(&self, name: &str, argv: &[String]) -> HostCommand {
        self.command()
            .args(["exec", name, "--"])
            .args(argv.iter().cloned())
    }

    /// Attach a virtual function of `parent` as a NIC device
    pub fn add_sriov_nic(&self, name: &str, device: &str, parent: &str) -> HostCommand {
        self.command().args([
            "config".to_string(),
            "device".to_string(),
            "add".to_string(),
            name.to_string(),
            device.to_string(),
            "nic".to_string(),
            "nictype=sriov".to_string(),
            format!("parent={parent}"),
        ])
    }

    pub fn remove_device(&self, name: &str, device: &str) -> HostCommand {
        self.command()
            .args(["config", "device", "remove", name, device])
    }

    pub fn delete(&self, name: &str) -> HostCommand {
        self.command().args(["delete", name, "--force"])
    }

    /// Import a metadata tarball and optional disk image under `alias`
    pub fn image_import(&self, template: &Path, image: Option<&Path>, alias: &str) -> HostCommand {
        let mut cmd = self
            .command()
            .args(["image", "import"])
            .arg(template.to_string_lossy());

        if let Some(image) = image {
            cmd = cmd.arg(image.to_string_lossy());
        }

        cmd.args(["--alias", alias])
    }

    pub fn image_delete(&self, alias: &str) -> HostCommand {
        self.command().args(["image", "delete", alias])
    }
}

/// Download `url` to `dest`, failing on HTTP errors
pub fn download(url: &str, dest: &Path) -> HostCommand {
    HostCommand::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest.to_string_lossy())
        .arg(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_init_vm_flag() {
        let lxc = LxdCli::default();
        assert_eq!(
            lxc.init("ubuntu:24.04", "testbed", true).to_string(),
            "lxc init ubuntu:24.04 testbed --vm"
        );
        assert!(!lxc.init("ubuntu:24.04", "testbed", false).has_arg("--vm"));
    }

    #[test]
    fn test_exec_separator() {
        let lxc = LxdCli::new("/snap/bin/lxc");
        let cmd = lxc.exec("testbed", &["uname".to_string(), "-a".to_string()]);
        assert_eq!(cmd.to_string(), "/snap/bin/lxc exec testbed -- uname -a");
    }

    #[test]
    fn test_sriov_nic() {
        let cmd = LxdCli::default().add_sriov_nic("testbed", "vf0", "enp1s0f0");
        assert_eq!(
            cmd.to_string(),
            "lxc config device add testbed vf0 nic nictype=sriov parent=enp1s0f0"
        );
    }

    #[test]
    fn test_image_import() {
        let lxc = LxdCli::default();
        let template = PathBuf::from("/tmp/w/meta.tar.xz");
        let image = PathBuf::from("/tmp/w/disk.qcow2");

        assert_eq!(
            lxc.image_import(&template, Some(&image), "tb-image").to_string(),
            "lxc image import /tmp/w/meta.tar.xz /tmp/w/disk.qcow2 --alias tb-image"
        );
        assert_eq!(
            lxc.image_import(&template, None, "tb-image").to_string(),
            "lxc image import /tmp/w/meta.tar.xz --alias tb-image"
        );
    }

    #[test]
    fn test_download() {
        let cmd = download("http://example.com/a", &PathBuf::from("/tmp/a"));
        assert_eq!(cmd.to_string(), "curl -fsSL -o /tmp/a http://example.com/a");
    }
}
