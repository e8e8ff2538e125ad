//! Data models for instance provisioning
//!
//! Instance descriptions, image sources and lifecycle reports.

mod instance;
mod report;

pub use instance::{
    default_work_dir, host_os_version, ImageConfig, ImageSource, InstanceSpec, TestType,
};
pub use report::{LifecycleReport, Variant};
