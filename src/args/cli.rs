//! Root command for the CLI.
//!
//! This module contains the root command structure that handles executing the CLI
//! both as a plugin of the host CLI (when invoked via `cf deploy`) and as a standalone CLI
//! (when invoked directly as `multiapps deploy`).
//!
//! The commands are defined in the [`MultiappsArgs`](super::MultiappsArgs) enum.
use std::env::args;

use clap::{Args, Subcommand};

use crate::formatting::Format;

use super::MultiappsArgs;

/// Name of the host CLI the plugin is registered with.
const HOST_CLI: &str = "cf";
const STANDALONE_CLI: &str = "multiapps";

/// Deploy and undeploy multi-target apps
#[derive(Args)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global_args: GlobalArgs,

    #[command(subcommand)]
    pub command: PluginSubCommands,
}

impl clap::Parser for Cli {}

/// Name of the CLI as the operator typed it, used in usage strings and hints.
///
/// The host CLI invokes the plugin with its own name as first argument.
pub fn host_cli() -> &'static str {
    if args().nth(1).as_deref() == Some(HOST_CLI) {
        HOST_CLI
    } else {
        STANDALONE_CLI
    }
}

impl Cli {
    fn new_command() -> clap::Command {
        let command = host_cli();
        clap::Command::new(command).bin_name(command)
    }
}

/// Derived by hand so the usage string matches the execution mode,
/// `Usage: cf deploy ...` as a plugin and `Usage: multiapps deploy ...` standalone.
impl clap::CommandFactory for Cli {
    fn command() -> clap::Command {
        let __clap_app = Cli::new_command();
        <Self as clap::Args>::augment_args(__clap_app)
    }

    fn command_for_update() -> clap::Command {
        let __clap_app = Cli::new_command();
        <Self as clap::Args>::augment_args_for_update(__clap_app)
    }
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Enable debug logging.
    ///
    /// Setting this flag will set the log level to debug and only show logs from this crate.
    /// The log level can also be set with the `MULTIAPPS_LOG` environment variable,
    /// `MULTIAPPS_LOG_ALL` shows logs from all crates.
    #[arg(global = true, hide = true, long, short = 'D', default_value = "false")]
    pub debug: bool,

    /// Output format of the command result.
    #[arg(global = true, long = "output", short = 'o')]
    pub format: Option<Format>,
}

/// The CLI runs as a plugin (`cf deploy`) or standalone (`multiapps deploy`).
#[derive(Subcommand)]
pub enum PluginSubCommands {
    /// Commands of the host CLI plugin.
    #[command(name = "cf", hide = true)]
    Plugin {
        #[command(subcommand)]
        command: MultiappsArgs,
    },
    #[command(flatten)]
    Flat(MultiappsArgs),
}

impl From<PluginSubCommands> for MultiappsArgs {
    fn from(command: PluginSubCommands) -> Self {
        match command {
            PluginSubCommands::Plugin { command } => command,
            PluginSubCommands::Flat(command) => command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    fn parse(args: &[&str]) -> Cli {
        let matches = Cli::command().try_get_matches_from(args).unwrap();
        Cli::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_plugin_and_standalone_invocation() {
        let plugin = parse(&["multiapps", "cf", "undeploy", "com.example.app", "-f"]);
        let standalone = parse(&["multiapps", "undeploy", "com.example.app", "-o", "json"]);

        assert!(matches!(
            MultiappsArgs::from(plugin.command),
            MultiappsArgs::Undeploy(_)
        ));
        assert_eq!(standalone.global_args.format, Some(Format::Json));
        assert!(matches!(
            MultiappsArgs::from(standalone.command),
            MultiappsArgs::Undeploy(_)
        ));
    }
}
