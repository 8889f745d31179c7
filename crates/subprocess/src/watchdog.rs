//! Parent process watchdog
//!
//! When the host asks for it (`--exit-if-parent-closed`), a subprocess must
//! not outlive the process that launched it. The watchdog is a background
//! thread that blocks until the parent exits and then kills this process
//! outright. There is no cancellation and no graceful path: by the time it
//! fires, the host is gone and nobody is left to talk to.
//!
//! Rust never waits for spawned threads when `main` returns, so the thread
//! cannot hold the process open.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use browser_subprocess_config::SubprocessConfig;

use crate::error::{SubprocessError, WatchError};

const THREAD_NAME: &str = "parent-watchdog";

/// Blocks until a process has exited
pub trait ParentWaiter: Send + 'static {
    fn wait_for_exit(&self, pid: u32) -> Result<(), WatchError>;
}

/// Ends the current process
pub trait Terminator: Send + 'static {
    fn terminate(&self);
}

/// Waits on the parent using the operating system
#[derive(Debug, Clone, Copy)]
pub struct OsParentWaiter {
    poll_interval: Duration,
}

impl OsParentWaiter {
    /// `poll_interval` is only used where the OS cannot notify us of the exit
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl ParentWaiter for OsParentWaiter {
    fn wait_for_exit(&self, pid: u32) -> Result<(), WatchError> {
        platform::wait_for_exit(pid, self.poll_interval)
            .map_err(|source| WatchError::Lookup { pid, source })
    }
}

/// Kills the current process without running destructors or exit handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceKill;

impl Terminator for ForceKill {
    fn terminate(&self) {
        platform::kill_current_process();
        // Only reached if the kill itself failed
        std::process::abort();
    }
}

/// Handle to a running watchdog thread
///
/// Dropping it detaches the thread; the watchdog keeps running.
#[derive(Debug)]
pub struct Watchdog {
    parent_process_id: u32,
    thread: JoinHandle<()>,
}

impl Watchdog {
    /// Start watching `parent_process_id` on a background thread
    pub fn spawn<W, T>(
        parent_process_id: u32,
        waiter: W,
        terminator: T,
    ) -> Result<Self, SubprocessError>
    where
        W: ParentWaiter,
        T: Terminator,
    {
        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || watch_parent(parent_process_id, &waiter, &terminator))
            .map_err(SubprocessError::WatchdogSpawn)?;

        tracing::debug!("Watching host process {}", parent_process_id);

        Ok(Self {
            parent_process_id,
            thread,
        })
    }

    pub fn parent_process_id(&self) -> u32 {
        self.parent_process_id
    }

    /// Whether the watchdog has already fired
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the watchdog thread ends
    ///
    /// With [`ForceKill`] this never returns.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

/// Start the OS-backed watchdog configured from `config`
pub fn spawn_watchdog(
    parent_process_id: u32,
    config: &SubprocessConfig,
) -> Result<Watchdog, SubprocessError> {
    Watchdog::spawn(
        parent_process_id,
        OsParentWaiter::new(config.parent_poll_interval()),
        ForceKill,
    )
}

/// Watchdog body: wait for the parent, then terminate
///
/// A failed lookup means the parent is already gone.
pub fn watch_parent<W, T>(parent_process_id: u32, waiter: &W, terminator: &T)
where
    W: ParentWaiter + ?Sized,
    T: Terminator + ?Sized,
{
    match waiter.wait_for_exit(parent_process_id) {
        Ok(()) => tracing::debug!("Host process {} exited", parent_process_id),
        // main process probably died already
        Err(e) => tracing::debug!("{}", e),
    }

    tracing::warn!("Browser subprocess shutting down forcibly");
    terminator.terminate();
}

fn invalid_pid(pid: u32) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{pid} is not a valid process id"))
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::thread;
    use std::time::Duration;

    pub(super) fn wait_for_exit(pid: u32, poll_interval: Duration) -> io::Result<()> {
        // 0 and negative values address process groups in kill(2)
        let pid = match libc::pid_t::try_from(pid) {
            Ok(pid) if pid > 0 => pid,
            _ => return Err(super::invalid_pid(pid)),
        };

        #[cfg(target_os = "linux")]
        {
            match wait_pidfd(pid) {
                Ok(()) => return Ok(()),
                Err(e) => match pidfd_failure(&e) {
                    PidfdFailure::Exited => return Ok(()),
                    PidfdFailure::Unsupported => {
                        tracing::debug!("pidfd unusable ({}), polling host process {}", e, pid);
                    }
                },
            }
        }

        poll_until_gone(pid, poll_interval)
    }

    /// What a failed pidfd wait says about the host
    #[cfg(target_os = "linux")]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum PidfdFailure {
        /// The host is already gone
        Exited,
        /// pidfds cannot be used here; fall back to polling
        Unsupported,
    }

    /// Only ESRCH proves the host exited. Old kernels report ENOSYS and
    /// seccomp sandboxes commonly answer EPERM or EACCES for a live process.
    #[cfg(target_os = "linux")]
    pub(super) fn pidfd_failure(err: &io::Error) -> PidfdFailure {
        match err.raw_os_error() {
            Some(libc::ESRCH) => PidfdFailure::Exited,
            _ => PidfdFailure::Unsupported,
        }
    }

    #[cfg(target_os = "linux")]
    fn wait_pidfd(pid: libc::pid_t) -> io::Result<()> {
        use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

        // SAFETY: pidfd_open takes a pid and a flags word and returns a new fd or -1.
        let raw = unsafe { libc::syscall(libc::SYS_pidfd_open, pid, 0) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: the fd was just returned by the kernel and is owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw as libc::c_int) };

        let mut pollfd = libc::pollfd {
            fd: fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        loop {
            // SAFETY: pollfd is a valid, initialised array of length 1.
            let rc = unsafe { libc::poll(&mut pollfd, 1, -1) };
            if rc >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn poll_until_gone(pid: libc::pid_t, poll_interval: Duration) -> io::Result<()> {
        loop {
            // SAFETY: signal 0 only checks that the process exists.
            if unsafe { libc::kill(pid, 0) } != 0 {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::ESRCH) => return Ok(()),
                    // Exists, but belongs to someone else
                    Some(libc::EPERM) => {}
                    _ => return Err(err),
                }
            }
            thread::sleep(poll_interval);
        }
    }

    pub(super) fn kill_current_process() {
        // SAFETY: plain syscalls on our own pid.
        unsafe {
            libc::kill(libc::getpid(), libc::SIGKILL);
        }
    }
}

#[cfg(windows)]
mod platform {
    use std::io;
    use std::time::Duration;

    use windows::Win32::Foundation::{BOOL, CloseHandle, WAIT_FAILED};
    use windows::Win32::System::Threading::{
        GetCurrentProcess, INFINITE, OpenProcess, PROCESS_SYNCHRONIZE, TerminateProcess,
        WaitForSingleObject,
    };

    pub(super) fn wait_for_exit(pid: u32, _poll_interval: Duration) -> io::Result<()> {
        if pid == 0 {
            return Err(super::invalid_pid(pid));
        }

        // SAFETY: OpenProcess returns an owned handle or an error.
        let handle =
            unsafe { OpenProcess(PROCESS_SYNCHRONIZE, BOOL(0), pid) }.map_err(io::Error::from)?;
        // SAFETY: handle is valid until closed below.
        let status = unsafe { WaitForSingleObject(handle, INFINITE) };
        let wait_error = (status == WAIT_FAILED).then(io::Error::last_os_error);
        // SAFETY: handle came from OpenProcess and is closed once.
        unsafe {
            let _ = CloseHandle(handle);
        }

        match wait_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(super) fn kill_current_process() {
        // SAFETY: the pseudo handle for the current process is always valid.
        unsafe {
            let _ = TerminateProcess(GetCurrentProcess(), 1);
        }
    }
}
