//! Handler for the `scan` command: runs exactly one scan and exits.

use std::sync::Arc;

use tracing::error;

use crate::app::{App, Config};
use crate::cli::{exit_code, Cli};
use crate::core::pipeline::ScanState;
use crate::core::registry::Registry;
use crate::core::router::Router;

/// Execute the `scan` command. Returns the process exit code (spec §6).
///
/// Exit-code mapping resolves an Open Question spec.md leaves implicit: a
/// scan that completes cleanly with zero opportunities detected still
/// exits `0` (nothing found is not a failure); only an aborted scan maps
/// to `2` (see DESIGN.md).
pub async fn execute(cli: &Cli, registry: Arc<Registry>, router: Arc<Router>) -> i32 {
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return exit_code::CONFIG_ERROR;
        }
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = "json".to_string();
    }
    config.init_logging();

    if registry.get_source(&config.scan.primary_source).is_none() {
        error!(primary_source = %config.scan.primary_source, "no primary market source registered");
        return exit_code::CONFIG_ERROR;
    }

    let app = match App::new(&config, registry, router) {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "failed to build application");
            return exit_code::CONFIG_ERROR;
        }
    };

    let report = app.run_once().await;
    match report.final_state {
        ScanState::Aborted if report.opportunities_emitted == 0 => exit_code::DEADLINE_ABORTED,
        _ => exit_code::OK,
    }
}
