//! Engine handle: ownership of the one native engine instance per process
//!
//! The engine (CEF in production) is reached only through the [`Engine`]
//! trait. [`EngineHandle`] wraps an engine together with the parameters it
//! is initialised with and guarantees:
//!
//! - at most one live handle per process,
//! - `run` is only possible between construction and destruction,
//! - native resources are released exactly once, on every exit path.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{EngineError, SubprocessError};
use crate::role::{ProcessRole, SubprocessLaunch};
use crate::scheme::{self, CustomScheme};

/// Set while an [`EngineSlot`] is held
static ENGINE_SLOT: AtomicBool = AtomicBool::new(false);

/// Engine-owned identity of a browser, borrowed for the duration of a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrowserRef {
    id: i32,
    is_popup: bool,
}

impl BrowserRef {
    pub fn new(id: i32, is_popup: bool) -> Self {
        Self { id, is_popup }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_popup(&self) -> bool {
        self.is_popup
    }
}

/// Browser lifecycle callbacks for the render process
///
/// Invoked by the engine on its own thread. Default implementation does nothing.
pub trait BrowserHooks: Send + Sync {
    fn on_browser_created(&self, _browser: &BrowserRef) {}

    fn on_browser_destroyed(&self, _browser: &BrowserRef) {}

    /// Only delivered when the host passed `--focused-node-changed-enabled`
    fn on_focused_node_changed(&self, _browser: &BrowserRef) {}
}

/// Hooks that ignore every callback
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl BrowserHooks for NoopHooks {}

/// Role-specific handler wired into the engine
#[derive(Clone)]
pub enum RoleHandler {
    /// Render process: browser lifecycle callbacks are delivered to the hooks
    Renderer(Arc<dyn BrowserHooks>),
    /// Every other process type runs the engine's stock behaviour
    Default,
}

impl RoleHandler {
    pub fn is_renderer(&self) -> bool {
        matches!(self, Self::Renderer(_))
    }

    pub fn hooks(&self) -> Option<&Arc<dyn BrowserHooks>> {
        match self {
            Self::Renderer(hooks) => Some(hooks),
            Self::Default => None,
        }
    }
}

impl fmt::Debug for RoleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renderer(_) => f.write_str("Renderer(..)"),
            Self::Default => f.write_str("Default"),
        }
    }
}

/// IPC transport between the renderer and its host
///
/// The alternate transport is only selected here; carrying it out is up to
/// the engine implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostTransport {
    #[default]
    Default,
    /// Legacy WCF channel keyed by the host process id
    Wcf { host_process_id: u32 },
}

/// Initialisation parameters handed to the engine
#[derive(Debug, Clone)]
pub struct EngineApp {
    pub role: ProcessRole,
    pub role_handler: RoleHandler,
    pub schemes: Vec<CustomScheme>,
    pub focused_node_changed_enabled: bool,
    pub transport: HostTransport,
    /// Raw arguments, forwarded verbatim
    pub args: Vec<String>,
}

impl EngineApp {
    /// Build the parameters for a classified launch
    ///
    /// Only the renderer gets the hooks; every other role runs with the
    /// default handler.
    pub fn for_launch(
        launch: &SubprocessLaunch,
        hooks: Arc<dyn BrowserHooks>,
    ) -> Result<Self, SubprocessError> {
        let schemes = scheme::parse_command_line(&launch.args)?;

        let (role_handler, transport) = match launch.role {
            ProcessRole::Renderer => {
                let transport = match launch.linkage {
                    Some(linkage) if launch.flags.wcf_enabled => HostTransport::Wcf {
                        host_process_id: linkage.parent_process_id,
                    },
                    _ => HostTransport::Default,
                };
                (RoleHandler::Renderer(hooks), transport)
            }
            _ => (RoleHandler::Default, HostTransport::Default),
        };

        Ok(Self {
            role: launch.role.clone(),
            role_handler,
            schemes,
            focused_node_changed_enabled: launch.flags.focused_node_changed_enabled,
            transport,
            args: launch.args.clone(),
        })
    }
}

/// The external multi-process engine
pub trait Engine {
    /// Run the engine's main loop for this process; blocks until it ends
    fn execute(&mut self, app: &EngineApp) -> Result<i32, EngineError>;

    /// Release native resources. Called at most once per engine.
    fn shutdown(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn execute(&mut self, app: &EngineApp) -> Result<i32, EngineError> {
        (**self).execute(app)
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        (**self).shutdown()
    }
}

/// Claim on the process's single engine slot
///
/// Acquire it before building an engine so a second engine is never
/// constructed while another is alive. Dropping it frees the slot.
#[derive(Debug)]
pub struct EngineSlot {
    _claim: (),
}

impl EngineSlot {
    /// Fails with [`SubprocessError::EngineAlreadyActive`] if the slot is taken
    pub fn acquire() -> Result<Self, SubprocessError> {
        ENGINE_SLOT
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { _claim: () })
            .map_err(|_| SubprocessError::EngineAlreadyActive)
    }
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        ENGINE_SLOT.store(false, Ordering::Release);
    }
}

/// Sole owner of the process's engine instance
///
/// Dropping the handle destroys it.
pub struct EngineHandle<E: Engine> {
    engine: Option<E>,
    app: EngineApp,
    slot: Option<EngineSlot>,
}

impl<E: Engine> EngineHandle<E> {
    /// Take ownership of `engine`; fails if another handle is alive
    ///
    /// A rejected engine is shut down before the error is returned.
    pub fn create(engine: E, app: EngineApp) -> Result<Self, SubprocessError> {
        match EngineSlot::acquire() {
            Ok(slot) => Ok(Self::attach(slot, engine, app)),
            Err(e) => {
                release(engine);
                Err(e)
            }
        }
    }

    /// Hand an engine built under an already claimed slot to a new handle
    pub fn attach(slot: EngineSlot, engine: E, app: EngineApp) -> Self {
        tracing::debug!(
            "Engine handle created for {} ({:?}, {} custom schemes)",
            app.role,
            app.role_handler,
            app.schemes.len()
        );

        Self {
            engine: Some(engine),
            app,
            slot: Some(slot),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.engine.is_none()
    }

    /// Run the engine; the exit code is returned unchanged
    pub fn run(&mut self) -> Result<i32, SubprocessError> {
        let engine = self.engine.as_mut().ok_or(SubprocessError::EngineDestroyed)?;
        Ok(engine.execute(&self.app)?)
    }

    /// Release the engine. Safe to call any number of times.
    ///
    /// Shutdown errors are logged and swallowed so they never replace the
    /// exit code of the run.
    pub fn destroy(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };

        release(engine);
        drop(self.slot.take());
        tracing::debug!("Engine handle destroyed");
    }
}

impl<E: Engine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn release<E: Engine>(mut engine: E) {
    if let Err(e) = engine.shutdown() {
        tracing::warn!("Engine shutdown failed, ignoring: {}", e);
    }
}

/// Whether an engine handle is currently alive in this process
pub fn engine_active() -> bool {
    ENGINE_SLOT.load(Ordering::Acquire)
}

/// Serialises tests that touch the process-wide engine slot
#[cfg(test)]
pub(crate) fn slot_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
