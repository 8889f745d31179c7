//! Subprocess supervisor
//!
//! Drives one subprocess from its raw arguments to an exit code:
//!
//! ```text
//! Start -> Classified -> [WatchdogArmed] -> EngineRunning -> Exited
//!       \-> NotASubprocess
//! ```
//!
//! Classification problems end the run before any engine is created. Once an
//! engine handle exists it is destroyed on every path out, panics included.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use browser_subprocess_config::SubprocessConfig;

use crate::args;
use crate::engine::{BrowserHooks, Engine, EngineApp, EngineHandle, EngineSlot, NoopHooks};
use crate::error::{EngineError, SubprocessError};
use crate::exit_code;
use crate::role::{self, Launch, SubprocessLaunch};
use crate::watchdog;

/// Lifecycle state of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Start,
    Classified,
    WatchdogArmed,
    EngineRunning,
    Exited,
    /// No subprocess type on the command line: this is the host process
    NotASubprocess,
}

/// Result of a supervisor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The caller should carry on with its own startup
    NotASubprocess,
    /// The subprocess is done; exit with this code
    Exited(i32),
}

type WatchdogSpawner = Box<dyn FnMut(u32, &SubprocessConfig) -> Result<(), SubprocessError>>;

/// Orchestrates classification, the watchdog and the engine for one process
pub struct Supervisor<F> {
    config: SubprocessConfig,
    engine_factory: F,
    hooks: Arc<dyn BrowserHooks>,
    spawn_watchdog: WatchdogSpawner,
    history: Vec<SupervisorState>,
}

impl<F, E> Supervisor<F>
where
    F: FnMut(&EngineApp) -> Result<E, EngineError>,
    E: Engine,
{
    /// Create a supervisor that builds its engine with `engine_factory`
    pub fn new(config: SubprocessConfig, engine_factory: F) -> Self {
        Self {
            config,
            engine_factory,
            hooks: Arc::new(NoopHooks),
            spawn_watchdog: Box::new(|pid: u32, config: &SubprocessConfig| {
                watchdog::spawn_watchdog(pid, config).map(drop)
            }),
            history: Vec::new(),
        }
    }

    /// Browser lifecycle hooks for the render process
    pub fn with_hooks<H: BrowserHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Replace how the parent watchdog is started
    pub fn with_watchdog_spawner<W>(mut self, spawner: W) -> Self
    where
        W: FnMut(u32, &SubprocessConfig) -> Result<(), SubprocessError> + 'static,
    {
        self.spawn_watchdog = Box::new(spawner);
        self
    }

    /// Current state; `Start` before the first run
    pub fn state(&self) -> SupervisorState {
        self.history.last().copied().unwrap_or(SupervisorState::Start)
    }

    /// Every state entered, in order
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    /// Run the subprocess lifecycle for `args` (program name excluded)
    pub fn run<S: AsRef<str>>(&mut self, args: &[S]) -> Outcome {
        self.history.clear();
        self.enter(SupervisorState::Start);

        tracing::debug!(
            "Browser subprocess starting up with command line: {}",
            args.iter().map(|arg| arg.as_ref()).collect::<Vec<&str>>().join(" ")
        );

        let launch = match role::classify(args) {
            Ok(Launch::Host) => {
                self.enter(SupervisorState::NotASubprocess);
                return Outcome::NotASubprocess;
            }
            Ok(Launch::Subprocess(launch)) => launch,
            Err(e) => {
                tracing::error!("Invalid subprocess launch: {}", e);
                return self.exit(e.exit_code());
            }
        };

        let app = match EngineApp::for_launch(&launch, Arc::clone(&self.hooks)) {
            Ok(app) => app,
            Err(e) => {
                tracing::error!("Invalid subprocess launch: {}", e);
                return self.exit(e.exit_code());
            }
        };

        self.enter(SupervisorState::Classified);
        tracing::info!("Starting {} subprocess", launch.role);

        self.arm_watchdog(&launch);

        let code = self.run_engine(app);
        tracing::info!("Browser subprocess shutting down with exit code {}", code);
        self.exit(code)
    }

    /// Run the lifecycle for this process's own arguments
    ///
    /// Returns if this is not a subprocess; otherwise exits the process
    /// with the resulting code and never returns.
    pub fn handle_app_start(mut self) {
        let args: Vec<String> = std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        if !args::is_subprocess(&args) {
            return;
        }

        if let Outcome::Exited(code) = self.run(&args) {
            // Exit directly so none of the host's startup runs in the subprocess
            std::process::exit(code);
        }
    }

    fn arm_watchdog(&mut self, launch: &SubprocessLaunch) {
        let Some(parent_process_id) = launch.watchdog_target() else {
            return;
        };

        if !self.config.honor_parent_watchdog {
            tracing::info!(
                "Parent watchdog for host {} disabled by configuration",
                parent_process_id
            );
            return;
        }

        match (self.spawn_watchdog)(parent_process_id, &self.config) {
            Ok(()) => self.enter(SupervisorState::WatchdogArmed),
            // The engine still runs; the host is expected to reap us
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn run_engine(&mut self, app: EngineApp) -> i32 {
        // Claim the slot first so no engine is built while another is alive
        let slot = match EngineSlot::acquire() {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!("{}", e);
                return e.exit_code();
            }
        };

        let engine = match (self.engine_factory)(&app) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::error!("Failed to create engine: {}", e);
                return e.exit_code().unwrap_or(exit_code::ENGINE_FAILURE);
            }
        };

        let mut handle = EngineHandle::attach(slot, engine, app);

        self.enter(SupervisorState::EngineRunning);

        let result = panic::catch_unwind(AssertUnwindSafe(|| handle.run()));
        handle.destroy();

        match result {
            Ok(Ok(code)) => {
                if code < 0 {
                    tracing::warn!(
                        "Engine reported {}: it did not treat this as a subprocess",
                        code
                    );
                }
                code
            }
            Ok(Err(e)) => {
                tracing::error!("Engine run failed: {}", e);
                e.exit_code()
            }
            Err(_) => {
                tracing::error!("Engine panicked");
                exit_code::ENGINE_FAILURE
            }
        }
    }

    fn exit(&mut self, code: i32) -> Outcome {
        self.enter(SupervisorState::Exited);
        Outcome::Exited(code)
    }

    fn enter(&mut self, state: SupervisorState) {
        tracing::trace!("Supervisor state: {:?}", state);
        self.history.push(state);
    }
}

/// Process entry hook
///
/// Call first thing in `main`. Returns if the process was not launched as
/// a subprocess; otherwise runs it to completion and exits.
pub fn handle_app_start<F, E>(engine_factory: F)
where
    F: FnMut(&EngineApp) -> Result<E, EngineError>,
    E: Engine,
{
    Supervisor::new(SubprocessConfig::from_env(), engine_factory).handle_app_start();
}
