//! End-to-end lifecycle scenarios through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use browser_subprocess::watchdog::{OsParentWaiter, Terminator, Watchdog};
use browser_subprocess::{
    Engine, EngineApp, EngineError, Outcome, ProcessRole, RoleHandler, SubprocessConfig, Supervisor,
    SupervisorState, exit_code,
};

/// The engine slot is process-wide; run lifecycle tests one at a time
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    role: ProcessRole,
    renderer: bool,
    schemes: Vec<String>,
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Seen>>,
    released: AtomicUsize,
}

struct RecordingEngine(Arc<Recorder>);

impl Engine for RecordingEngine {
    fn execute(&mut self, app: &EngineApp) -> Result<i32, EngineError> {
        self.0.seen.lock().unwrap().push(Seen {
            role: app.role.clone(),
            renderer: matches!(app.role_handler, RoleHandler::Renderer(_)),
            schemes: app.schemes.iter().map(|s| s.name.clone()).collect(),
        });
        Ok(0)
    }

    fn shutdown(&mut self) -> Result<(), EngineError> {
        self.0.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn run(args: &[&str]) -> (Outcome, Vec<SupervisorState>, Arc<Recorder>, Vec<u32>) {
    let recorder = Arc::new(Recorder::default());
    let factory_recorder = Arc::clone(&recorder);
    let watched = Arc::new(Mutex::new(Vec::new()));
    let watched_sink = Arc::clone(&watched);

    let mut supervisor = Supervisor::new(SubprocessConfig::default(), move |_app: &EngineApp| {
        Ok(RecordingEngine(Arc::clone(&factory_recorder)))
    })
    .with_watchdog_spawner(move |pid: u32, _config: &SubprocessConfig| {
        watched_sink.lock().unwrap().push(pid);
        Ok(())
    });

    let outcome = supervisor.run(args);
    let history = supervisor.history().to_vec();
    let watched = watched.lock().unwrap().clone();
    (outcome, history, recorder, watched)
}

#[test]
fn test_renderer_launch() {
    let _serial = serial();
    let (outcome, history, recorder, watched) =
        run(&["--type=renderer", "--host-process-id=4242", "--custom-scheme=app|65"]);

    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(
        history,
        vec![
            SupervisorState::Start,
            SupervisorState::Classified,
            SupervisorState::EngineRunning,
            SupervisorState::Exited,
        ]
    );
    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![Seen {
            role: ProcessRole::Renderer,
            renderer: true,
            schemes: vec!["app".into()],
        }]
    );
    assert_eq!(recorder.released.load(Ordering::SeqCst), 1);
    assert!(watched.is_empty());
}

#[test]
fn test_renderer_launch_with_watchdog() {
    let _serial = serial();
    let (_, history, _, watched) = run(&[
        "--type=renderer",
        "--host-process-id=4242",
        "--exit-if-parent-closed",
    ]);

    assert_eq!(watched, vec![4242]);
    assert!(history.contains(&SupervisorState::WatchdogArmed));
}

#[test]
fn test_crashpad_launch() {
    let _serial = serial();
    let (outcome, _, recorder, watched) =
        run(&["--type=crashpad-handler", "--exit-if-parent-closed"]);

    assert_eq!(outcome, Outcome::Exited(0));
    assert!(watched.is_empty());
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen[0].role, ProcessRole::CrashpadHandler);
    assert!(!seen[0].renderer);
}

#[test]
fn test_host_launch() {
    let (outcome, history, recorder, _) = run(&[]);

    assert_eq!(outcome, Outcome::NotASubprocess);
    assert_eq!(history.last(), Some(&SupervisorState::NotASubprocess));
    assert!(recorder.seen.lock().unwrap().is_empty());
}

#[test]
fn test_malformed_launch() {
    let (outcome, history, recorder, _) = run(&["--type=utility", "--host-process-id=twelve"]);

    assert_eq!(outcome, Outcome::Exited(exit_code::CONFIGURATION_ERROR));
    assert!(!history.contains(&SupervisorState::EngineRunning));
    assert!(recorder.seen.lock().unwrap().is_empty());
    assert_eq!(recorder.released.load(Ordering::SeqCst), 0);
}

#[derive(Clone, Default)]
struct CountingTerminator(Arc<AtomicUsize>);

impl Terminator for CountingTerminator {
    fn terminate(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(unix)]
#[test]
fn test_watchdog_fires_when_parent_exits() {
    let mut parent = std::process::Command::new("sleep").arg("0.1").spawn().unwrap();
    let terminator = CountingTerminator::default();

    let watchdog = Watchdog::spawn(
        parent.id(),
        OsParentWaiter::new(std::time::Duration::from_millis(10)),
        terminator.clone(),
    )
    .unwrap();

    parent.wait().unwrap();
    watchdog.join().unwrap();
    assert_eq!(terminator.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_watchdog_fires_for_unknown_parent() {
    let terminator = CountingTerminator::default();

    // Above pid_max on every supported platform
    let watchdog = Watchdog::spawn(
        u32::MAX - 1,
        OsParentWaiter::new(std::time::Duration::from_millis(10)),
        terminator.clone(),
    )
    .unwrap();

    watchdog.join().unwrap();
    assert_eq!(terminator.0.load(Ordering::SeqCst), 1);
}
