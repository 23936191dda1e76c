//! pppoe-ha binary

use anyhow::Context;
use failover::ConfigSource;
use pppoe_ha::{App, Config, FileConfigSource, Invocation, ParseFailure, USAGE, parse_args};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let invocation = match parse_args(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(ParseFailure::Info(e)) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(ParseFailure::Usage(e)) => {
            eprintln!("pppoe-ha: {e}");
            eprintln!("{USAGE}");
            return ExitCode::from(1);
        }
    };

    match run(invocation) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("pppoe-ha: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(invocation: Invocation) -> anyhow::Result<ExitCode> {
    // Logging is not up yet; report config problems on stderr
    let (config, path) = match Config::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration");
            (Config::default(), None)
        }
    };
    let source: Arc<dyn ConfigSource> = match path {
        Some(path) => Arc::new(FileConfigSource::new(path)),
        None => Arc::new(config.clone()),
    };

    let logging = &config.logging;
    if let Err(e) =
        common::logging::init_with(logging.level(), logging.is_json(), logging.file.as_deref())
    {
        eprintln!("Failed to initialize logging: {e}");
        if logging.file.is_some() {
            // Unwritable log file; stderr still reaches devd or the terminal
            if let Err(e) = common::logging::init_with(logging.level(), logging.is_json(), None) {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let app = App::system(&config, source).context("failed to set up pppoe-ha")?;

    match runtime.block_on(app.execute(invocation)) {
        Ok(report) => {
            tracing::debug!(?report, "Done");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!(error = %e, "Invocation rejected");
            eprintln!("pppoe-ha: {e}");
            eprintln!("{USAGE}");
            Ok(ExitCode::from(1))
        }
    }
}
