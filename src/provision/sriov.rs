//! SR-IOV provisioning sequence
//!
//! Same chain as the VM sequence with a virtual function attached to the
//! running instance before readiness polling.

use tracing::{error, info};

use super::{abort, steps, success_message, ProvisioningTest, Step};
use crate::executor::{CommandExecutor, CommandRunner};
use crate::lxd::LxdCli;
use crate::models::{InstanceSpec, Variant};

/// Boots a VM or container with a VF from `spec.network_device`
pub struct SriovTest<E> {
    runner: CommandRunner<E>,
    lxc: LxdCli,
    spec: InstanceSpec,
}

impl<E: CommandExecutor> SriovTest<E> {
    pub fn new(runner: CommandRunner<E>, lxc: LxdCli, spec: InstanceSpec) -> Self {
        Self { runner, lxc, spec }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &CommandRunner<E> {
        &self.runner
    }
}

impl<E: CommandExecutor> ProvisioningTest for SriovTest<E> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn variant(&self) -> Variant {
        Variant::Sriov
    }

    async fn setup(&self) -> Option<String> {
        let spec = &self.spec;

        if spec.test_type.is_none() {
            error!("No test type (vm or container) given for {}", spec.name);
            return None;
        }
        if spec.network_device.as_deref().map_or(true, str::is_empty) {
            error!("No SR-IOV network device resolved for {}", spec.name);
            return None;
        }

        steps::prepare_image(&self.runner, &self.lxc, spec).await
    }

    async fn start(&self) -> bool {
        let (runner, lxc, spec) = (&self.runner, &self.lxc, &self.spec);

        let Some(image) = self.setup().await else {
            error!("One or more setup stages failed for {}", spec.name);
            return abort(&spec.name, Step::Setup);
        };
        // Checked by setup
        let Some(test_type) = spec.test_type else {
            return abort(&spec.name, Step::Setup);
        };

        if !steps::init(runner, lxc, spec, &image, test_type.is_vm()).await {
            return abort(&spec.name, Step::Init);
        }
        if !steps::configure(runner, lxc, spec).await {
            return abort(&spec.name, Step::Configure);
        }
        if !steps::start(runner, lxc, spec).await {
            return abort(&spec.name, Step::Start);
        }
        if !steps::attach_device(runner, lxc, spec).await {
            return abort(&spec.name, Step::AttachDevice);
        }
        if !steps::wait_ready(runner, lxc, spec).await {
            return abort(&spec.name, Step::Poll);
        }
        if !steps::verify(runner, lxc, spec).await {
            return abort(&spec.name, Step::Verify);
        }

        let message = success_message(&spec.name, test_type);
        info!("{}", message);
        println!("{message}");
        true
    }

    async fn cleanup(&self) {
        steps::cleanup(
            &self.runner,
            &self.lxc,
            &self.spec,
            Some(&self.spec.device_name),
        )
        .await;
    }
}
