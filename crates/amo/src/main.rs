// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMO - Adaptive Model Optimizer.
//!
//! Command-line entry point: route single messages, run the routing
//! self-check, and stream simulated chat turns.

mod check;
mod simulate;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use amo_config::AmoConfig;
use amo_core::{AmoError, ChatRequest, ImageContext};
use amo_router::AdaptiveRouter;
use clap::{Parser, Subcommand};

/// AMO - cost-aware model tier routing for chat.
#[derive(Parser, Debug)]
#[command(name = "amo", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify and route one message, printing the decision as JSON.
    Route {
        message: String,
        /// Treat the message as carrying an image attachment.
        #[arg(long)]
        image: bool,
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Run the routing self-check.
    Check {
        /// Also stream a few simulated turns and print Prometheus metrics.
        #[arg(long)]
        metrics: bool,
    },
    /// Stream chat turns through a simulated provider as SSE frames.
    Simulate {
        message: String,
        #[arg(long)]
        image: bool,
        /// Session id (random when omitted).
        #[arg(long)]
        session: Option<String>,
        /// Probability in [0, 1] that a provider call fails before its first token.
        #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
        failure_rate: f64,
        /// Seed for the failure draw, for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
        /// Send the message this many times in the same session.
        #[arg(long, default_value_t = 1)]
        turns: usize,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not between 0 and 1"))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => amo_config::load_and_validate_path(path),
        None => amo_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            amo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    let result = match cli.command {
        Commands::Route {
            message,
            image,
            session,
        } => run_route(&config, &session, message, image).await,
        Commands::Check { metrics } => check::run_check(&config, metrics).await,
        Commands::Simulate {
            message,
            image,
            session,
            failure_rate,
            seed,
            turns,
        } => {
            let options = simulate::SimulateOptions {
                session: session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                image,
                failure_rate,
                seed,
                turns,
            };
            simulate::run_simulate(&config, &message, options).await
        }
        Commands::Config => print_config(&config),
    };

    if let Err(e) = result {
        eprintln!("amo: {e}");
        std::process::exit(1);
    }
}

/// Build a request, attaching a placeholder image when asked to.
pub(crate) fn build_request(session: &str, message: impl Into<String>, image: bool) -> ChatRequest {
    let request = ChatRequest::new(session, message);
    if image {
        request.with_image(ImageContext {
            mime_type: "image/png".to_string(),
            data: String::new(),
        })
    } else {
        request
    }
}

async fn run_route(
    config: &AmoConfig,
    session: &str,
    message: String,
    image: bool,
) -> Result<(), AmoError> {
    let router = AdaptiveRouter::new(config)?;
    let routed = router.route(&build_request(session, message, image)).await;

    let output = serde_json::json!({
        "decision": routed.decision,
        "decision_time_us": routed.decision_time.as_micros() as u64,
    });
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| AmoError::Internal(format!("failed to render decision: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn print_config(config: &AmoConfig) -> Result<(), AmoError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| AmoError::Internal(format!("failed to render configuration: {e}")))?;
    print!("{rendered}");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("amo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
