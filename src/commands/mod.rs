//! Operational commands behind `paperless-cli`
//!
//! - `generate-token`: create a gateway API token
//! - `test-auth`: call the running gateway with the configured authentication
//! - `test`: exercise the Paperless-ngx server directly

pub mod generate_token;
pub mod test_auth;
pub mod test_connection;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::config::Config;

pub use generate_token::GenerateTokenArgs;
pub use test_auth::TestAuthArgs;
pub use test_connection::TestArgs;

#[derive(Debug, Parser)]
#[command(
    name = "paperless-cli",
    version,
    about = "Operational commands for the Paperless-ngx gateway"
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "PAPERLESS_CONFIG", default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a secure API token for gateway authentication
    GenerateToken(GenerateTokenArgs),
    /// Test the gateway's API authentication configuration
    TestAuth(TestAuthArgs),
    /// Test the connection to Paperless-ngx and demonstrate basic functionality
    Test(TestArgs),
}

/// Run one command, writing human-readable output to `out`
pub async fn run<W: Write>(command: Command, config: &Config, out: &mut W) -> anyhow::Result<()> {
    match command {
        Command::GenerateToken(args) => generate_token::run(&args, &config.cli, out),
        Command::TestAuth(args) => test_auth::run(&args, config, out).await,
        Command::Test(args) => test_connection::run(&args, &config.paperless, out).await,
    }
}
