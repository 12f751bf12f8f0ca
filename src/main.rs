use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use pkgi::commands::{cmd_check, cmd_watch};
use pkgi::logging::init_tracing;

#[derive(Parser)]
#[command(name = "pkgi")]
#[command(about = "Watch npm projects for missing, invalid and extraneous dependencies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every project under a directory once
    Check {
        /// Directory to search for projects
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check, then re-check projects whenever their dependencies change
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { dir, json } => cmd_check(&dir, json).await,
        Commands::Watch { dir } => cmd_watch(&dir).await.map(|_| false),
    };

    match result {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
