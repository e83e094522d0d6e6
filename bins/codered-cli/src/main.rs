mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codered_common::config::Config;

#[derive(Parser)]
#[command(name = "codered-cli")]
#[command(about = "CodeRed CLI - Manage test cases, preview runs and inspect submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a problem's test cases from a JSON file
    LoadCases {
        /// Problem id
        #[arg(short, long)]
        problem_id: i64,

        /// JSON file: an array of cases or {"test_cases": [...]}
        #[arg(short, long)]
        file: String,
    },

    /// Show the stored test cases of a problem
    ShowCases {
        /// Problem id
        #[arg(short, long)]
        problem_id: i64,
    },

    /// Run a source file against a problem's public cases (nothing is recorded)
    Preview {
        /// Problem id
        #[arg(short, long)]
        problem_id: i64,

        /// Language id (71 python, 50 c, 54 c++, 62 java, 63 javascript)
        #[arg(short, long, default_value = "71")]
        language_id: i64,

        /// Source file
        #[arg(short, long)]
        file: String,
    },

    /// Show a recorded submission
    Submission {
        /// Submission id
        #[arg(short, long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::LoadCases { problem_id, file } => {
            commands::load_cases(&config, problem_id, &file).await?;
        }
        Commands::ShowCases { problem_id } => {
            commands::show_cases(&config, problem_id).await?;
        }
        Commands::Preview {
            problem_id,
            language_id,
            file,
        } => {
            commands::preview(&config, problem_id, language_id, &file).await?;
        }
        Commands::Submission { id } => {
            commands::show_submission(&config, &id).await?;
        }
    }

    Ok(())
}
