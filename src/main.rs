use std::sync::Arc;

use clap::Parser;
use edge_signal_engine::cli::{Cli, Commands};
use edge_signal_engine::core::registry::Registry;
use edge_signal_engine::core::router::Router;

/// This binary ships no concrete sources, processors, detectors, or sinks
/// (spec §1: those are an embedding application's responsibility, not the
/// core's). It wires an empty [`Registry`] and [`Router`] and dispatches
/// to the `run`/`scan` subcommands, which will report a configuration
/// error if `scan.primary_source` names a source nothing registered.
#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let registry = Arc::new(Registry::new());
    let router = Arc::new(Router::new());

    let code = match cli.command {
        Commands::Run => edge_signal_engine::cli::run::execute(&cli, registry, router).await,
        Commands::Scan => edge_signal_engine::cli::scan::execute(&cli, registry, router).await,
    };

    std::process::exit(code);
}
