// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

mod commands;
mod format;

use clap::{Parser, Subcommand};
use format::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code when surviving failures (or a runtime error) block the verdict.
const EXIT_FAILURE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "cgate", version, about = "Contract Gate policy verifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate policy rules against input files and report the outcome.
    Validate {
        /// Policy configuration file (YAML or JSON) with include/exclude.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Policy source directory. Can be repeated; later trees overlay
        /// earlier ones.
        #[arg(long = "policy", required = true)]
        policy_dirs: Vec<PathBuf>,

        /// Rule-engine executable driven to evaluate the rules.
        #[arg(long, default_value = "opa-check")]
        runner: PathBuf,

        /// Judge effective_on against this RFC 3339 instant instead of now.
        #[arg(long, default_value = "now")]
        effective_time: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,

        /// Input files handed to the rule engine.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Post-process a saved raw-results file without invoking a rule engine.
    Replay {
        /// Raw results JSON, as captured from a previous runner invocation.
        file: PathBuf,

        /// Policy configuration file (YAML or JSON) with include/exclude.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Policy source directory for metadata enrichment. Can be repeated.
        #[arg(long = "policy")]
        policy_dirs: Vec<PathBuf>,

        /// Judge effective_on against this RFC 3339 instant instead of now.
        #[arg(long, default_value = "now")]
        effective_time: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },

    /// Print the restricted capability document handed to the rule engine.
    Capabilities,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Validate {
            config,
            policy_dirs,
            runner,
            effective_time,
            output,
            inputs,
        } => {
            commands::validate(
                config.as_deref(),
                &policy_dirs,
                &runner,
                &effective_time,
                output,
                &inputs,
            )
            .await
        }
        Commands::Replay {
            file,
            config,
            policy_dirs,
            effective_time,
            output,
        } => {
            commands::replay(
                &file,
                config.as_deref(),
                &policy_dirs,
                &effective_time,
                output,
            )
            .await
        }
        Commands::Capabilities => commands::capabilities(),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
