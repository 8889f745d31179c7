//! Bootstrap for CEF (Chromium Embedded Framework) subprocesses
//!
//! CEF runs every browser as a family of processes: the host (browser)
//! process launches renderer, GPU, utility and crashpad-handler processes,
//! telling each one what it is through `--type=`. This crate is the glue
//! that runs in those launched processes:
//!
//! 1. [`role::classify`] decides the role from the command line
//! 2. [`watchdog`] optionally ties our lifetime to the host process
//! 3. [`engine::EngineHandle`] owns the single engine instance
//! 4. [`supervisor::Supervisor`] sequences the above and yields an exit code
//!
//! The engine itself sits behind the [`engine::Engine`] trait. With the
//! `cef` feature, [`cef_engine::CefEngine`] provides the real one.
//!
//! # Usage
//!
//! ```no_run
//! # #[cfg(feature = "cef")]
//! # fn main() {
//! browser_subprocess::handle_app_start(browser_subprocess::cef_engine::CefEngine::from_app);
//! # }
//! # #[cfg(not(feature = "cef"))]
//! # fn main() {}
//! ```

pub mod args;
pub mod engine;
pub mod error;
pub mod exit_code;
pub mod role;
pub mod scheme;
pub mod supervisor;
pub mod watchdog;

#[cfg(feature = "cef")]
pub mod cef_engine;

pub use browser_subprocess_config::SubprocessConfig;
pub use engine::{
    BrowserHooks, BrowserRef, Engine, EngineApp, EngineHandle, EngineSlot, HostTransport,
    RoleHandler,
};
pub use error::{EngineError, SubprocessError, WatchError};
pub use role::{Launch, ParentLinkage, ProcessRole, SubprocessFlags, SubprocessLaunch, classify};
pub use scheme::{CustomScheme, SchemeOptions};
pub use supervisor::{Outcome, Supervisor, SupervisorState, handle_app_start};
pub use watchdog::Watchdog;
