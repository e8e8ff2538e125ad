//! Instance models
//!
//! Describes the instance under test and where its image comes from.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::retry::RetryPolicy;

/// Kind of instance to provision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Vm,
    Container,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Vm => "vm",
            TestType::Container => "container",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vm" | "virtual-machine" => Some(TestType::Vm),
            "container" | "ct" => Some(TestType::Container),
            _ => None,
        }
    }

    pub fn is_vm(&self) -> bool {
        matches!(self, TestType::Vm)
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image server used when none is configured
pub const DEFAULT_REMOTE: &str = "ubuntu:";

/// Image settings as configured
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image server prefix, e.g. `ubuntu:`
    pub default_remote: Option<String>,

    /// Release alias on the remote, e.g. `24.04`
    pub os_version: Option<String>,

    /// URL of the image metadata tarball
    pub template_url: Option<String>,

    /// URL of the disk image or rootfs paired with the template
    pub image_url: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            default_remote: Some(DEFAULT_REMOTE.to_string()),
            os_version: None,
            template_url: None,
            image_url: None,
        }
    }
}

/// Where an instance image comes from, after resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// `remote:alias` reference served by an image server
    Remote { reference: String },

    /// Artifacts downloaded and imported locally
    Template {
        template_url: String,
        image_url: Option<String>,
    },
}

impl ImageConfig {
    /// Pick exactly one image source.
    ///
    /// The remote/alias pair wins when both halves are set; the template
    /// URL is the fallback.
    pub fn resolve(&self) -> Option<ImageSource> {
        let remote = non_empty(&self.default_remote);
        let alias = non_empty(&self.os_version);

        if let (Some(remote), Some(alias)) = (remote, alias) {
            let reference = if remote.ends_with(':') {
                format!("{remote}{alias}")
            } else {
                format!("{remote}:{alias}")
            };
            return Some(ImageSource::Remote { reference });
        }

        non_empty(&self.template_url).map(|template_url| ImageSource::Template {
            template_url: template_url.to_string(),
            image_url: non_empty(&self.image_url).map(str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Everything a provisioning step needs to know about its instance
#[derive(Clone, Debug)]
pub struct InstanceSpec {
    /// Instance name
    pub name: String,

    /// VM or container; required by the SR-IOV sequence
    pub test_type: Option<TestType>,

    /// Image settings
    pub image: ImageConfig,

    /// Physical function providing the virtual function
    pub network_device: Option<String>,

    /// Name of the NIC device added to the instance
    pub device_name: String,

    /// Command run inside the guest to prove it responds
    pub verify_command: Vec<String>,

    /// Readiness polling bound
    pub poll: RetryPolicy,

    /// Readiness also requires an IPv4 address
    pub require_address: bool,

    /// Scratch space for downloaded image artifacts
    pub work_dir: PathBuf,
}

impl InstanceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            work_dir: default_work_dir(&name),
            name,
            test_type: None,
            image: ImageConfig::default(),
            network_device: None,
            device_name: "vf0".to_string(),
            verify_command: vec!["uname".to_string(), "-a".to_string()],
            poll: RetryPolicy::default(),
            require_address: true,
        }
    }

    pub fn with_test_type(mut self, test_type: TestType) -> Self {
        self.test_type = Some(test_type);
        self
    }

    pub fn with_image(mut self, image: ImageConfig) -> Self {
        self.image = image;
        self
    }

    pub fn with_network_device(mut self, device: impl Into<String>) -> Self {
        self.network_device = Some(device.into());
        self
    }

    pub fn with_poll(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Local alias given to an imported template image
    pub fn image_alias(&self) -> String {
        format!("{}-image", self.name)
    }
}

/// `<cache dir>/lxd-vtest/<name>`, falling back to the temp dir
pub fn default_work_dir(name: &str) -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lxd-vtest")
        .join(name)
}

/// Read `VERSION_ID` from an os-release file
pub fn host_os_version(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(parse_os_release_version(&content))
}

fn parse_os_release_version(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("VERSION_ID="))
        .map(|value| value.trim_matches(|c| c == '"' || c == '\'').to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_type_parsing() {
        assert_eq!(TestType::from_str("VM"), Some(TestType::Vm));
        assert_eq!(TestType::from_str("container"), Some(TestType::Container));
        assert_eq!(TestType::from_str("pod"), None);
        assert_eq!(TestType::Vm.to_string(), "vm");
    }

    #[test]
    fn test_resolve_prefers_remote_alias() {
        let image = ImageConfig {
            default_remote: Some("ubuntu:".to_string()),
            os_version: Some("24.04".to_string()),
            template_url: Some("http://example.com/meta.tar.xz".to_string()),
            image_url: Some("http://example.com/disk.qcow2".to_string()),
        };

        assert_eq!(
            image.resolve(),
            Some(ImageSource::Remote {
                reference: "ubuntu:24.04".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_remote_without_colon() {
        let image = ImageConfig {
            default_remote: Some("images".to_string()),
            os_version: Some("alpine/3.20".to_string()),
            ..Default::default()
        };

        assert_eq!(
            image.resolve(),
            Some(ImageSource::Remote {
                reference: "images:alpine/3.20".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_falls_back_to_template() {
        let image = ImageConfig {
            default_remote: Some("ubuntu:".to_string()),
            os_version: None,
            template_url: Some("http://example.com/meta.tar.xz".to_string()),
            image_url: Some("  ".to_string()),
        };

        assert_eq!(
            image.resolve(),
            Some(ImageSource::Template {
                template_url: "http://example.com/meta.tar.xz".to_string(),
                image_url: None,
            })
        );
    }

    #[test]
    fn test_resolve_nothing() {
        assert_eq!(ImageConfig::default().resolve(), None);

        let image = ImageConfig {
            default_remote: None,
            os_version: Some("24.04".to_string()),
            ..Default::default()
        };
        assert_eq!(image.resolve(), None);
    }

    #[test]
    fn test_default_remote_pairs_with_release() {
        let image = ImageConfig {
            os_version: Some("24.04".to_string()),
            ..Default::default()
        };

        assert_eq!(
            image.resolve(),
            Some(ImageSource::Remote {
                reference: "ubuntu:24.04".to_string()
            })
        );
    }

    #[test]
    fn test_parse_os_release() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\nID=ubuntu\n";
        assert_eq!(parse_os_release_version(content), Some("24.04".to_string()));
        assert_eq!(parse_os_release_version("ID=arch\n"), None);
    }

    #[test]
    fn test_host_os_version_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "VERSION_ID=22.04\n").unwrap();

        assert_eq!(host_os_version(&path).unwrap(), Some("22.04".to_string()));
        assert!(host_os_version(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_instance_spec_defaults() {
        let spec = InstanceSpec::new("testbed");
        assert_eq!(spec.image_alias(), "testbed-image");
        assert!(spec.work_dir.ends_with("lxd-vtest/testbed"));
        assert_eq!(spec.poll.max_attempts, 4);
        assert!(spec.test_type.is_none());
    }
}
