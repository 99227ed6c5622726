//! This module contains business logic for the commands for the application.
//!
//! The main entry point is the [`command_from_args`] function which converts CLI arguments into a command.
use anyhow::Result;

use crate::{
    args::MultiappsArgs,
    commands::{deploy::Deploy, mta_ops::MtaOps, undeploy::Undeploy},
    formatting::Format,
    models::ProcessType,
};
pub use core::{Command, CommandWithOutput, CommandWithOutputExt};

mod core;
pub mod deploy;
pub mod lifecycle;
pub mod mta_ops;
pub mod undeploy;

/// Convert CLI arguments into a command.
///
/// The output of the command will be formatted using the provided format and printed to stdout.
pub fn command_from_args(args: MultiappsArgs, format: Format) -> Result<Box<dyn Command>> {
    match args {
        MultiappsArgs::Deploy(deploy_args) => {
            Deploy::from_args(deploy_args, ProcessType::Deploy, "deploy")?
                .with_print_to_stdout(format)
        }
        MultiappsArgs::K8sDeploy(deploy_args) => {
            Deploy::from_args(deploy_args, ProcessType::KubernetesDeploy, "k8s-deploy")?
                .with_print_to_stdout(format)
        }
        MultiappsArgs::Undeploy(undeploy_args) => {
            Undeploy::from_args(undeploy_args, ProcessType::Undeploy, "undeploy")?
                .with_print_to_stdout(format)
        }
        MultiappsArgs::K8sUndeploy(undeploy_args) => Undeploy::from_args(
            undeploy_args,
            ProcessType::KubernetesUndeploy,
            "k8s-undeploy",
        )?
        .with_print_to_stdout(format),
        MultiappsArgs::MtaOps(mta_ops_args) => {
            MtaOps::try_from(mta_ops_args)?.with_print_to_stdout(format)
        }
    }
}
