use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod configuration;
mod error;
mod inputs;

use commands::agent::AgentArgs;
use commands::complete::CompleteArgs;
use configuration::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coding agent on a task
    Agent {
        /// The task; read from stdin when omitted
        prompt: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum number of agent iterations
        #[arg(short = 'i', long)]
        max_iterations: Option<usize>,

        /// Directories the file tools may touch (default: current directory)
        #[arg(long, num_args = 1..)]
        allowed_dirs: Vec<String>,

        /// Do not offer the shell command tool
        #[arg(long)]
        no_shell: bool,
    },

    /// Send a single prompt to the completion service
    Complete {
        /// The prompt; read from stdin when omitted
        prompt: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum tokens in the reply
        #[arg(long)]
        max_tokens: Option<i32>,

        /// Write the reply to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let settings = Settings::new()?;

    match cli.command {
        Command::Agent {
            prompt,
            model,
            temperature,
            max_iterations,
            allowed_dirs,
            no_shell,
        } => {
            commands::agent::execute(
                settings,
                AgentArgs {
                    prompt,
                    model,
                    temperature,
                    max_iterations,
                    allowed_dirs,
                    no_shell,
                },
            )
            .await
        }
        Command::Complete {
            prompt,
            model,
            temperature,
            max_tokens,
            output,
        } => {
            commands::complete::execute(
                settings,
                CompleteArgs {
                    prompt,
                    model,
                    temperature,
                    max_tokens,
                    output,
                },
            )
            .await
        }
    }
}
