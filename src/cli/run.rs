//! Handler for the `run` command: scans on a timer until `Ctrl+C`.

use std::sync::Arc;

use tracing::{error, info};

use crate::app::{App, Config};
use crate::cli::{exit_code, Cli};
use crate::core::registry::Registry;
use crate::core::router::Router;

/// Execute the `run` command. Returns the process exit code (spec §6).
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

    info!(interval_secs = config.scan.interval_secs, "starting scan loop");
    app.run_forever(config.scan.interval()).await;
    exit_code::OK
}
