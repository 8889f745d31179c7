//! CEF subprocess helper binary
//!
//! The host points CEF's `browser_subprocess_path` at this executable, so
//! every renderer, GPU, utility and crashpad-handler process starts here.
//! Keeping it separate from the host binary means none of the host's own
//! initialisation (windowing, GPU setup) ever runs in a subprocess.
//!
//! The binary sets up logging, then hands over to the supervisor, which
//! exits the process with the engine's exit code.

use browser_subprocess::cef_engine::CefEngine;
use browser_subprocess::{Supervisor, exit_code};
use browser_subprocess_config::SubprocessConfig;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &SubprocessConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    // Output is captured by the host, so no colours
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

fn main() {
    let config = SubprocessConfig::from_env();
    init_logging(&config);

    Supervisor::new(config, CefEngine::from_app).handle_app_start();

    // Launched without --type: the host should never do this
    tracing::error!("browser-subprocess must be launched by CEF with a --type argument");
    std::process::exit(exit_code::CONFIGURATION_ERROR);
}
