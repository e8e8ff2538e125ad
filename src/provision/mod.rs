//! Provisioning state machines
//!
//! Drives an instance through setup, creation, boot, readiness polling
//! and in-guest verification, stopping at the first failed step. Cleanup
//! runs once afterwards no matter where the chain stopped.

mod sriov;
pub mod steps;
mod vm;

pub use sriov::SriovTest;
pub use vm::VmTest;

use chrono::Utc;
use std::fmt;
use std::time::Instant;
use tracing::{error, info};

use crate::models::{LifecycleReport, TestType, Variant};

/// Steps of the provisioning chain, in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Setup,
    Init,
    Configure,
    Start,
    AttachDevice,
    Poll,
    Verify,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Setup => "setup",
            Step::Init => "init",
            Step::Configure => "configure",
            Step::Start => "start",
            Step::AttachDevice => "attach-device",
            Step::Poll => "poll",
            Step::Verify => "exec-verification",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-use provisioning test
#[allow(async_fn_in_trait)]
pub trait ProvisioningTest {
    fn name(&self) -> &str;

    fn variant(&self) -> Variant;

    /// Check prerequisites and prepare the image, returning the image
    /// reference `init` should use. Does not clean up on failure.
    async fn setup(&self) -> Option<String>;

    /// Run setup and the full step chain
    async fn start(&self) -> bool;

    /// Remove everything the chain may have created. Safe to call when
    /// nothing was created.
    async fn cleanup(&self);
}

/// Run `start` then `cleanup`, each exactly once
pub async fn run_lifecycle<T: ProvisioningTest>(test: &T) -> LifecycleReport {
    let started_at = Utc::now();
    let start = Instant::now();

    info!("Starting {} test for {}", test.variant(), test.name());

    let passed = test.start().await;
    test.cleanup().await;

    let report = LifecycleReport {
        name: test.name().to_string(),
        variant: test.variant(),
        passed,
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!("{}", report);
    report
}

/// Log the step that stopped the chain
fn abort(name: &str, step: Step) -> bool {
    error!("{}: {} step failed, aborting", name, step);
    false
}

pub fn success_message(name: &str, test_type: TestType) -> String {
    format!("{name} ({test_type}) started and verified successfully")
}
