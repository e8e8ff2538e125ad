//! LXD integration module
//!
//! Provides `lxc` command construction and list-output parsing for the
//! provisioning steps.

mod commands;
mod status;

pub use commands::{download, LxdCli};
pub use status::{parse_list, InstanceState, InstanceStatus};
