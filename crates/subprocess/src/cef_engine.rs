//! CEF-backed engine
//!
//! Hands the process to `cef::execute_process`, which inspects the command
//! line itself and runs the matching subprocess main loop. The App we pass
//! registers the host's custom schemes (every process must agree on them)
//! and, for render processes, routes browser lifecycle callbacks to the
//! configured [`BrowserHooks`].

use std::ffi::c_int;
use std::sync::Arc;

use cef::args::Args;
use cef::rc::Rc as _;
use cef::{
    api_hash, sys, wrap_app, wrap_render_process_handler, App, Browser, CefString,
    DictionaryValue, Domnode, Frame, ImplApp, ImplBrowser, ImplRenderProcessHandler,
    ImplSchemeRegistrar, RenderProcessHandler, SchemeRegistrar, WrapApp,
    WrapRenderProcessHandler,
};

use crate::engine::{BrowserHooks, BrowserRef, Engine, EngineApp, HostTransport, RoleHandler};
use crate::error::EngineError;
use crate::scheme::CustomScheme;

fn browser_ref(browser: &Browser) -> BrowserRef {
    BrowserRef::new(browser.identifier(), browser.is_popup() != 0)
}

/// Render-process callback state
#[derive(Clone)]
pub(crate) struct RendererCallbacks {
    hooks: Arc<dyn BrowserHooks>,
    focused_node_changed_enabled: bool,
}

// Macro generates RenderProcessHandlerBuilder which wraps RendererCallbacks
wrap_render_process_handler! {
    pub(crate) struct RenderProcessHandlerBuilder {
        handler: RendererCallbacks,
    }

    impl RenderProcessHandler {
        fn on_browser_created(
            &self,
            browser: Option<&mut Browser>,
            _extra_info: Option<&mut DictionaryValue>,
        ) {
            if let Some(browser) = browser {
                let browser = browser_ref(browser);
                tracing::debug!("Browser {} created (popup: {})", browser.id(), browser.is_popup());
                self.handler.hooks.on_browser_created(&browser);
            }
        }

        fn on_browser_destroyed(&self, browser: Option<&mut Browser>) {
            if let Some(browser) = browser {
                let browser = browser_ref(browser);
                tracing::debug!("Browser {} destroyed", browser.id());
                self.handler.hooks.on_browser_destroyed(&browser);
            }
        }

        fn on_focused_node_changed(
            &self,
            browser: Option<&mut Browser>,
            _frame: Option<&mut Frame>,
            _node: Option<&mut Domnode>,
        ) {
            if !self.handler.focused_node_changed_enabled {
                return;
            }
            if let Some(browser) = browser {
                self.handler.hooks.on_focused_node_changed(&browser_ref(browser));
            }
        }
    }
}

impl RenderProcessHandlerBuilder {
    pub fn build(handler: RendererCallbacks) -> RenderProcessHandler {
        Self::new(handler)
    }
}

/// App state shared by every subprocess type
#[derive(Clone)]
pub(crate) struct SubprocessApp {
    schemes: Vec<CustomScheme>,
    render_process_handler: Option<RenderProcessHandler>,
}

wrap_app! {
    pub(crate) struct AppBuilder {
        app: SubprocessApp,
    }

    impl App {
        fn on_register_custom_schemes(&self, registrar: Option<&mut SchemeRegistrar>) {
            let Some(registrar) = registrar else {
                return;
            };
            for scheme in &self.app.schemes {
                let name = CefString::from(scheme.name.as_str());
                if registrar.add_custom_scheme(Some(&name), scheme.options.bits() as c_int) == 0 {
                    tracing::warn!("CEF refused custom scheme {}", scheme);
                }
            }
        }

        fn render_process_handler(&self) -> Option<RenderProcessHandler> {
            self.app.render_process_handler.clone()
        }
    }
}

impl AppBuilder {
    pub fn build(app: SubprocessApp) -> App {
        Self::new(app)
    }
}

/// [`Engine`] backed by `cef::execute_process`
pub struct CefEngine {
    app: Option<App>,
}

impl CefEngine {
    /// Build the CEF App for `engine_app`
    ///
    /// Signature matches the supervisor's engine factory.
    pub fn from_app(engine_app: &EngineApp) -> Result<Self, EngineError> {
        let render_process_handler = match &engine_app.role_handler {
            RoleHandler::Renderer(hooks) => {
                Some(RenderProcessHandlerBuilder::build(RendererCallbacks {
                    hooks: Arc::clone(hooks),
                    focused_node_changed_enabled: engine_app.focused_node_changed_enabled,
                }))
            }
            RoleHandler::Default => None,
        };

        if let HostTransport::Wcf { host_process_id } = engine_app.transport {
            tracing::info!(
                "Legacy WCF transport requested for host {}; CEF process messages are used instead",
                host_process_id
            );
        }

        let app = AppBuilder::build(SubprocessApp {
            schemes: engine_app.schemes.clone(),
            render_process_handler,
        });

        Ok(Self { app: Some(app) })
    }
}

impl Engine for CefEngine {
    fn execute(&mut self, _engine_app: &EngineApp) -> Result<i32, EngineError> {
        let app = self
            .app
            .as_mut()
            .ok_or_else(|| EngineError::Failed("CEF app already released".into()))?;

        // Validate CEF API version before any other CEF call
        let _ = api_hash(sys::CEF_API_VERSION_LAST, 0);

        // CEF reads argc/argv itself; the arguments we classified are the same ones
        let args = Args::new();

        let exit_code =
            cef::execute_process(Some(args.as_main_args()), Some(app), std::ptr::null_mut());
        tracing::debug!("execute_process returned: {}", exit_code);

        Ok(exit_code)
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        // Drop our reference; CEF releases the App once its own references go
        self.app.take();
        Ok(())
    }
}
