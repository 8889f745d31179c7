//! Process role classification
//!
//! Everything a subprocess is going to do is decided here, once, from its
//! launch arguments. The result is immutable for the lifetime of the process.

use std::fmt;

use crate::args::{self, CRASHPAD_HANDLER_TYPE, RENDERER_TYPE};
use crate::error::SubprocessError;

/// Functional identity of a subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRole {
    /// `--type=` was present but empty
    Unknown,
    Renderer,
    CrashpadHandler,
    /// Any other CEF process type (gpu-process, utility, zygote, ...)
    Other(String),
}

impl ProcessRole {
    pub fn from_type(value: &str) -> Self {
        match value {
            "" => Self::Unknown,
            RENDERER_TYPE => Self::Renderer,
            CRASHPAD_HANDLER_TYPE => Self::CrashpadHandler,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this role is launched with a `--host-process-id`
    pub fn has_host_linkage(&self) -> bool {
        !matches!(self, Self::CrashpadHandler)
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Renderer => f.write_str(RENDERER_TYPE),
            Self::CrashpadHandler => f.write_str(CRASHPAD_HANDLER_TYPE),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Link between a subprocess and the host that launched it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLinkage {
    pub parent_process_id: u32,
    /// Whether the host asked us to die with it
    pub monitor_requested: bool,
}

/// Boolean switches recognised on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubprocessFlags {
    pub exit_if_parent_closed: bool,
    /// Legacy IPC transport toggle, forwarded only
    pub wcf_enabled: bool,
    pub focused_node_changed_enabled: bool,
}

impl SubprocessFlags {
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        Self {
            exit_if_parent_closed: args::has_argument(args, args::EXIT_IF_PARENT_CLOSED)
                || args::has_argument(args, args::MONITOR_PARENT),
            wcf_enabled: args::has_argument(args, args::WCF_ENABLED),
            focused_node_changed_enabled: args::has_argument(
                args,
                args::FOCUSED_NODE_CHANGED_ENABLED,
            ),
        }
    }
}

/// A classified subprocess launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessLaunch {
    pub role: ProcessRole,
    /// Always `None` for the crashpad handler
    pub linkage: Option<ParentLinkage>,
    pub flags: SubprocessFlags,
    /// The raw arguments, forwarded verbatim to the engine
    pub args: Vec<String>,
}

impl SubprocessLaunch {
    /// Parent id to watch, if the watchdog was requested
    pub fn watchdog_target(&self) -> Option<u32> {
        self.linkage
            .filter(|linkage| linkage.monitor_requested)
            .map(|linkage| linkage.parent_process_id)
    }
}

/// Outcome of classifying the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// No subprocess type: this is the host process itself
    Host,
    Subprocess(SubprocessLaunch),
}

/// Classify a process from its arguments (program name excluded)
pub fn classify<S: AsRef<str>>(args: &[S]) -> Result<Launch, SubprocessError> {
    let Some(process_type) = args::argument_value(args, args::SUBPROCESS_TYPE) else {
        return Ok(Launch::Host);
    };

    let role = ProcessRole::from_type(process_type);
    let flags = SubprocessFlags::from_args(args);

    // The crash reporter is launched without a host id; never look for one.
    let linkage = if role.has_host_linkage() {
        Some(ParentLinkage {
            parent_process_id: host_process_id(args)?,
            monitor_requested: flags.exit_if_parent_closed,
        })
    } else {
        None
    };

    Ok(Launch::Subprocess(SubprocessLaunch {
        role,
        linkage,
        flags,
        args: args.iter().map(|a| a.as_ref().to_string()).collect(),
    }))
}

fn host_process_id<S: AsRef<str>>(args: &[S]) -> Result<u32, SubprocessError> {
    let raw = args::argument_value(args, args::HOST_PROCESS_ID)
        .ok_or(SubprocessError::MissingArgument(args::HOST_PROCESS_ID))?;

    raw.trim()
        .parse::<u32>()
        .map_err(|source| SubprocessError::InvalidProcessId {
            value: raw.to_string(),
            source,
        })
}
