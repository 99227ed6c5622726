//! CLI argument parsing layer.
//!
//! This module provides the CLI interface using clap derive macros.
//! It handles parsing command-line arguments and converting them into structured data types.
//!
//! The business logic layer is [`crate::commands`], which receives these parsed arguments.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::{Action, VersionRule};

mod cli;

pub use cli::{Cli, host_cli};

/// Root command enum for multi-target app lifecycle management.
#[derive(Subcommand)]
#[command(about = "Deploy and undeploy multi-target apps")]
pub enum MultiappsArgs {
    Deploy(Deploy),
    /// Deploy a multi-target app archive to a Kubernetes space.
    #[command(name = "k8s-deploy")]
    K8sDeploy(Deploy),
    Undeploy(Undeploy),
    /// Undeploy a multi-target app from a Kubernetes space.
    #[command(name = "k8s-undeploy")]
    K8sUndeploy(Undeploy),
    #[command(name = "mta-ops")]
    MtaOps(MtaOps),
}

/// Target of the command and connection to the deploy service.
#[derive(Args, Clone, Debug, Default)]
pub struct TargetArgs {
    /// Deploy service URL, by default `https://deploy-service.<MULTIAPPS_SYSTEM_DOMAIN>`.
    #[arg(short = 'u', long, env = "DEPLOY_SERVICE_URL")]
    pub url: Option<String>,

    /// Organization to deploy to.
    #[arg(long, env = "MULTIAPPS_ORG")]
    pub org: Option<String>,

    /// Space to deploy to.
    #[arg(long, env = "MULTIAPPS_SPACE")]
    pub space: Option<String>,

    /// GUID of the space to deploy to.
    #[arg(long, env = "MULTIAPPS_SPACE_GUID")]
    pub space_guid: Option<String>,

    /// User the operations are started as.
    #[arg(long, env = "MULTIAPPS_USER")]
    pub user: Option<String>,

    #[arg(long, hide = true, env = "MULTIAPPS_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

/// Act on an existing operation instead of starting a new one.
#[derive(Args, Clone, Debug, Default)]
pub struct ActionArgs {
    /// Id of an existing multi-target app operation.
    #[arg(short = 'i', long = "operation-id", requires = "action")]
    pub operation_id: Option<String>,

    /// Action to perform on the operation given with -i.
    #[arg(short = 'a', long, requires = "operation_id")]
    pub action: Option<Action>,
}

/// Deploy a multi-target app archive.
///
/// Use `-i OPERATION_ID -a ACTION` to abort, retry, resume or monitor an operation that is already running.
#[derive(Parser, Debug)]
pub struct Deploy {
    /// Path to the multi-target app archive.
    #[arg(index = 1, required_unless_present = "operation_id")]
    pub mta: Option<PathBuf>,

    /// Extension descriptors, separated by commas.
    #[arg(short = 'e', value_delimiter = ',')]
    pub extension_descriptors: Vec<PathBuf>,

    /// Start timeout of the applications, in seconds.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Version rule applied when the multi-target app is already deployed.
    #[arg(long)]
    pub version_rule: Option<VersionRule>,

    /// Abort a conflicting operation and skip confirmations.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Do not start the applications.
    #[arg(long)]
    pub no_start: bool,

    /// Use namespaces in application and service names.
    #[arg(long)]
    pub use_namespaces: bool,

    /// Do not use namespaces in service names.
    #[arg(long)]
    pub no_namespaces_for_services: bool,

    /// Recreate changed services and delete discontinued services.
    #[arg(long)]
    pub delete_services: bool,

    /// Delete existing service keys and apply the new ones.
    #[arg(long)]
    pub delete_service_keys: bool,

    /// Delete discontinued service brokers.
    #[arg(long)]
    pub delete_service_brokers: bool,

    /// Keep the uploaded files on the deploy service after the process ends.
    #[arg(long)]
    pub keep_files: bool,

    /// Do not restart subscribed applications.
    #[arg(long)]
    pub no_restart_subscribed_apps: bool,

    /// Do not fail on missing permissions for admin operations.
    #[arg(long)]
    pub do_not_fail_on_missing_permissions: bool,

    /// Abort the process when an error occurs instead of waiting for an action.
    #[arg(long)]
    pub abort_on_error: bool,

    #[command(flatten)]
    pub operation: ActionArgs,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Undeploy a multi-target app.
///
/// The command prompts you to confirm the operation when you run the command without the --force option.
#[derive(Parser, Debug)]
pub struct Undeploy {
    /// Id of the multi-target app to undeploy.
    #[arg(index = 1, required_unless_present = "operation_id")]
    pub mta_id: Option<String>,

    /// Skip the confirmation and abort a conflicting operation.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Delete the services of the multi-target app.
    #[arg(long)]
    pub delete_services: bool,

    /// Delete the service keys of the multi-target app.
    #[arg(long)]
    pub delete_service_keys: bool,

    /// Delete the service brokers of the multi-target app.
    #[arg(long)]
    pub delete_service_brokers: bool,

    /// Do not restart subscribed applications.
    #[arg(long)]
    pub no_restart_subscribed_apps: bool,

    /// Do not fail on missing permissions for admin operations.
    #[arg(long)]
    pub do_not_fail_on_missing_permissions: bool,

    /// Abort the process when an error occurs instead of waiting for an action.
    #[arg(long)]
    pub abort_on_error: bool,

    #[command(flatten)]
    pub operation: ActionArgs,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// List the multi-target app operations of the current space.
#[derive(Parser, Debug)]
pub struct MtaOps {
    /// Only show the operations of this multi-target app.
    #[arg(long)]
    pub mta: Option<String>,

    /// Also show finished and aborted operations.
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}
