use clap::Parser;

use sentinel::conf::{Cli, Command};
use sentinel::runtime::{boot, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = boot::init_logging(&cli);

    match cli.command {
        Command::Check { ref container } => serve::run_check(&cli, container).await,
        Command::Monitor { ref container } => serve::run_monitor(&cli, container).await,
        Command::Listen => serve::run_listen(&cli).await,
    }
}
