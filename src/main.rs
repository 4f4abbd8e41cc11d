mod aggregate;
mod archive;
mod auth;
mod cli;
mod config;
mod error;
mod output;
mod pipeline;
mod providers;
mod secrets;
mod storage;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting testrail-archiver");
    cli.execute().await
}
