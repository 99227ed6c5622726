use anyhow::Result;
use args::{Cli, MultiappsArgs};
use clap::Parser;

use crate::{
    commands::command_from_args,
    interaction::{Interaction, Output},
    logging::setup_logging,
};

mod args;
mod commands;
mod config;
mod dependencies;
mod errors;
mod formatting;
mod interaction;
mod logging;
mod models;
mod operations;
mod table;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        Interaction::new().failed(&format!("{error:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.global_args.debug);

    let format = cli.global_args.format.unwrap_or_default();
    let args = MultiappsArgs::from(cli.command);

    let mut command = command_from_args(args, format)?;
    command.execute().await
}
