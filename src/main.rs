use clap::Parser;
use std::process::ExitCode;

use config_compiler::cli::{self, Cli};
use config_compiler::observability::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "config-compiler starting");

    cli::run(cli).await
}
