//! Supervisor idempotency tests against a fake host service manager.

use std::sync::{Arc, Mutex};
use warden::service::{ServiceManager, ServiceStatus, Supervisor};
use warden::{ServiceConfig, WardenError};

/// Recorded state of the fake host.
#[derive(Debug, Default)]
struct HostState {
    installed: bool,
    running: bool,
    install_calls: usize,
    start_calls: usize,
    stop_calls: usize,
}

/// Fake service manager backed by shared in-memory state.
#[derive(Clone)]
struct FakeManager {
    state: Arc<Mutex<HostState>>,
}

impl FakeManager {
    fn new() -> (Self, Arc<Mutex<HostState>>) {
        let state = Arc::new(Mutex::new(HostState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl ServiceManager for FakeManager {
    fn installed(&self) -> warden::Result<bool> {
        Ok(self.state.lock().expect("state lock").installed)
    }

    fn install(&self) -> warden::Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.installed = true;
        state.install_calls += 1;
        Ok(())
    }

    fn uninstall(&self) -> warden::Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.installed = false;
        state.running = false;
        Ok(())
    }

    fn start(&self) -> warden::Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.running = true;
        state.start_calls += 1;
        Ok(())
    }

    fn stop(&self) -> warden::Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.running = false;
        state.stop_calls += 1;
        Ok(())
    }

    fn restart(&self) -> warden::Result<()> {
        self.state.lock().expect("state lock").running = true;
        Ok(())
    }

    fn status(&self) -> warden::Result<ServiceStatus> {
        let state = self.state.lock().expect("state lock");
        if state.running {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }
}

fn supervisor() -> (Supervisor, Arc<Mutex<HostState>>) {
    let (manager, state) = FakeManager::new();
    (
        Supervisor::with_manager(ServiceConfig::default(), Box::new(manager)),
        state,
    )
}

#[test]
fn second_install_fails_without_touching_registration() {
    let (supervisor, state) = supervisor();

    supervisor.install().expect("first install succeeds");
    let err = supervisor.install().expect_err("second install fails");
    assert!(matches!(err, WardenError::AlreadyInstalled), "got {err}");

    let state = state.lock().expect("state lock");
    assert!(state.installed);
    assert_eq!(state.install_calls, 1, "second call must not re-register");
}

#[test]
fn uninstall_requires_prior_install() {
    let (supervisor, _state) = supervisor();

    let err = supervisor.uninstall().expect_err("nothing to uninstall");
    assert!(matches!(err, WardenError::NotInstalled), "got {err}");

    supervisor.install().expect("install");
    supervisor.uninstall().expect("uninstall succeeds once installed");
}

#[test]
fn start_is_rejected_while_running() {
    let (supervisor, state) = supervisor();

    supervisor.start().expect("first start succeeds");
    let err = supervisor.start().expect_err("second start fails");
    assert!(matches!(err, WardenError::AlreadyRunning), "got {err}");
    assert_eq!(state.lock().expect("state lock").start_calls, 1);
}

#[test]
fn stop_is_rejected_while_stopped() {
    let (supervisor, state) = supervisor();

    let err = supervisor.stop().expect_err("stop without start fails");
    assert!(matches!(err, WardenError::AlreadyStopped), "got {err}");
    assert_eq!(state.lock().expect("state lock").stop_calls, 0);

    supervisor.start().expect("start");
    supervisor.stop().expect("stop succeeds while running");
}

#[test]
fn status_reports_the_host_view() {
    let (supervisor, _state) = supervisor();

    assert_eq!(supervisor.status().expect("status"), ServiceStatus::Stopped);
    supervisor.start().expect("start");
    assert_eq!(supervisor.status().expect("status"), ServiceStatus::Running);
}

#[test]
fn restart_delegates_to_the_host_primitive() {
    let (supervisor, state) = supervisor();

    // Restart works regardless of the current state; the host owns the
    // stop-then-start sequencing.
    supervisor.restart().expect("restart");
    assert!(state.lock().expect("state lock").running);
}
