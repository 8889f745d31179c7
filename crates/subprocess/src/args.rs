//! Command line switches understood by the subprocess
//!
//! The host process appends these to every subprocess launch. Values use
//! the `--name=value` form; boolean switches are present or absent.

/// Subprocess type selector (`--type=renderer`, `--type=gpu-process`, ...)
pub const SUBPROCESS_TYPE: &str = "--type";

/// Process id of the host (browser) process
pub const HOST_PROCESS_ID: &str = "--host-process-id";

/// Kill this process when the host process exits
pub const EXIT_IF_PARENT_CLOSED: &str = "--exit-if-parent-closed";

/// Older spelling of [`EXIT_IF_PARENT_CLOSED`], still emitted by some hosts
pub const MONITOR_PARENT: &str = "--monitor-parent";

/// Legacy alternate IPC transport for the renderer
pub const WCF_ENABLED: &str = "--wcf-enabled";

/// Forward focused-node-changed notifications from the renderer
pub const FOCUSED_NODE_CHANGED_ENABLED: &str = "--focused-node-changed-enabled";

/// Custom scheme registrations, see [`crate::scheme`]
pub const CUSTOM_SCHEME: &str = "--custom-scheme";

/// The `--type` value CEF gives the crash reporter
pub const CRASHPAD_HANDLER_TYPE: &str = "crashpad-handler";

/// The `--type` value CEF gives render processes
pub const RENDERER_TYPE: &str = "renderer";

/// Value of the first `name=value` argument, if any
pub fn argument_value<'a, S: AsRef<str>>(args: &'a [S], name: &str) -> Option<&'a str> {
    args.iter().find_map(|arg| {
        arg.as_ref()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

/// Whether any argument starts with `name`
///
/// Prefix matching mirrors how CEF hosts pass switches: a bare switch and
/// a `switch=value` form both count as present.
pub fn has_argument<S: AsRef<str>>(args: &[S], name: &str) -> bool {
    args.iter().any(|arg| arg.as_ref().starts_with(name))
}

/// Whether the argument list carries a subprocess type marker
pub fn is_subprocess<S: AsRef<str>>(args: &[S]) -> bool {
    argument_value(args, SUBPROCESS_TYPE).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_value_found() {
        let args = ["--type=renderer", "--host-process-id=4242"];
        assert_eq!(argument_value(&args, SUBPROCESS_TYPE), Some("renderer"));
        assert_eq!(argument_value(&args, HOST_PROCESS_ID), Some("4242"));
    }

    #[test]
    fn test_argument_value_requires_equals() {
        // `--type-foo=bar` must not be read as `--type`
        let args = ["--type-foo=bar", "--type"];
        assert_eq!(argument_value(&args, SUBPROCESS_TYPE), None);
    }

    #[test]
    fn test_argument_value_first_wins() {
        let args = vec!["--type=gpu-process".to_string(), "--type=renderer".to_string()];
        assert_eq!(argument_value(&args, SUBPROCESS_TYPE), Some("gpu-process"));
    }

    #[test]
    fn test_argument_value_empty() {
        let args = ["--type="];
        assert_eq!(argument_value(&args, SUBPROCESS_TYPE), Some(""));
    }

    #[test]
    fn test_has_argument() {
        let args = ["--wcf-enabled", "--exit-if-parent-closed=1"];
        assert!(has_argument(&args, WCF_ENABLED));
        assert!(has_argument(&args, EXIT_IF_PARENT_CLOSED));
        assert!(!has_argument(&args, FOCUSED_NODE_CHANGED_ENABLED));
    }

    #[test]
    fn test_is_subprocess() {
        let empty: [&str; 0] = [];
        assert!(!is_subprocess(&empty));
        assert!(!is_subprocess(&["--enable-logging", "--type"]));
        assert!(is_subprocess(&["--enable-logging", "--type=utility"]));
    }
}
