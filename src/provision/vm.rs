//! Virtual machine provisioning sequence

use tracing::{error, info};

use super::{abort, steps, success_message, ProvisioningTest, Step};
use crate::executor::{CommandExecutor, CommandRunner};
use crate::lxd::LxdCli;
use crate::models::{InstanceSpec, TestType, Variant};

/// Boots a plain virtual machine and checks it answers an exec
pub struct VmTest<E> {
    runner: CommandRunner<E>,
    lxc: LxdCli,
    spec: InstanceSpec,
}

impl<E: CommandExecutor> VmTest<E> {
    pub fn new(runner: CommandRunner<E>, lxc: LxdCli, spec: InstanceSpec) -> Self {
        Self { runner, lxc, spec }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &CommandRunner<E> {
        &self.runner
    }
}

impl<E: CommandExecutor> ProvisioningTest for VmTest<E> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn variant(&self) -> Variant {
        Variant::Vm
    }

    async fn setup(&self) -> Option<String> {
        steps::prepare_image(&self.runner, &self.lxc, &self.spec).await
    }

    async fn start(&self) -> bool {
        let (runner, lxc, spec) = (&self.runner, &self.lxc, &self.spec);

        let Some(image) = self.setup().await else {
            error!("One or more setup stages failed for {}", spec.name);
            return abort(&spec.name, Step::Setup);
        };

        if !steps::init(runner, lxc, spec, &image, true).await {
            return abort(&spec.name, Step::Init);
        }
        if !steps::configure(runner, lxc, spec).await {
            return abort(&spec.name, Step::Configure);
        }
        if !steps::start(runner, lxc, spec).await {
            return abort(&spec.name, Step::Start);
        }
        if !steps::wait_ready(runner, lxc, spec).await {
            return abort(&spec.name, Step::Poll);
        }
        if !steps::verify(runner, lxc, spec).await {
            return abort(&spec.name, Step::Verify);
        }

        let message = success_message(&spec.name, TestType::Vm);
        info!("{}", message);
        println!("{message}");
        true
    }

    async fn cleanup(&self) {
        steps::cleanup(&self.runner, &self.lxc, &self.spec, None).await;
    }
}
