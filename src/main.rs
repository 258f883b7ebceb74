use std::process::ExitCode;

use clap::Parser;

use cpbcheck_lib::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cpbcheck_lib::init_logging();

    match cpbcheck_lib::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Exiting: {}", e);
            ExitCode::FAILURE
        }
    }
}
