//! End-to-end lifecycle runs against a scripted host.

use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rstest::rstest;
use svcbridge::fault::FaultOutput;
use svcbridge::host::{ScriptedHost, StatusLog};
use svcbridge::{
    ControlAccept, ControlRequest, Coordinator, DaemonControl, ServiceError, ServiceExit,
    ServiceState,
};
use tempfile::TempDir;

use ControlRequest::{Interrogate, ParamChange, Shutdown, Stop};
use ServiceState::{Running, StartPending, StopPending, Stopped};

/// Only one coordinator may be live per process.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonEvent {
    Shutdown,
    Reload,
    ReloadDone,
}

struct RecordingDaemon(Sender<DaemonEvent>);

impl DaemonControl for RecordingDaemon {
    fn initiate_shutdown(&self) {
        let _ = self.0.send(DaemonEvent::Shutdown);
    }

    fn reload_config(&self) {
        let _ = self.0.send(DaemonEvent::Reload);
    }
}

/// Reload blocks until the test opens the gate.
struct GatedDaemon {
    events: Sender<DaemonEvent>,
    gate: Receiver<()>,
}

impl DaemonControl for GatedDaemon {
    fn initiate_shutdown(&self) {
        let _ = self.events.send(DaemonEvent::Shutdown);
    }

    fn reload_config(&self) {
        let _ = self.events.send(DaemonEvent::Reload);
        let _ = self.gate.recv();
        let _ = self.events.send(DaemonEvent::ReloadDone);
    }
}

/// Leaves the test runner's stderr alone.
struct NullOutput;

impl FaultOutput for NullOutput {
    fn redirect_to(&mut self, _file: &File) -> io::Result<()> {
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn coordinator() -> (Coordinator, Receiver<DaemonEvent>) {
    let (tx, rx) = unbounded();
    let coordinator = Coordinator::new("svcbridge-test", Arc::new(RecordingDaemon(tx)))
        .fault_output(Box::new(NullOutput));
    (coordinator, rx)
}

fn wait_for_statuses(log: &StatusLog, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while log.snapshot().len() < count {
        assert!(Instant::now() < deadline, "statuses so far: {:?}", log.states());
        thread::sleep(Duration::from_millis(10));
    }
}

fn next_event(events: &Receiver<DaemonEvent>) -> DaemonEvent {
    events
        .recv_timeout(Duration::from_secs(5))
        .expect("daemon event")
}

#[test]
fn stop_request_runs_the_full_lifecycle() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (coordinator, events) = coordinator();
    let host = ScriptedHost::new([Stop]);
    let log = host.statuses();

    let session = coordinator.begin(host).unwrap();
    let running = session.started(&dir.path().join("panic.log")).unwrap();
    assert_eq!(next_event(&events), DaemonEvent::Shutdown);
    running.stopped(Ok::<(), String>(())).unwrap();

    assert_eq!(log.states(), vec![StartPending, Running, StopPending, Stopped]);
    assert_eq!(log.exit(), Some(ServiceExit::SUCCESS));

    let statuses = log.snapshot();
    assert_eq!(
        statuses[1].accepts,
        ControlAccept::STOP | ControlAccept::SHUTDOWN | ControlAccept::PARAM_CHANGE
    );
    assert!(statuses[0].accepts.is_empty());
}

#[test]
fn shutdown_request_behaves_like_stop() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (coordinator, events) = coordinator();
    let host = ScriptedHost::new([Shutdown]);
    let log = host.statuses();

    let running = coordinator
        .begin(host)
        .unwrap()
        .started(&dir.path().join("panic.log"))
        .unwrap();
    assert_eq!(next_event(&events), DaemonEvent::Shutdown);
    running.stopped(Ok::<(), String>(())).unwrap();

    assert_eq!(log.states(), vec![StartPending, Running, StopPending, Stopped]);
}

#[test]
fn fault_log_failure_aborts_start() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (coordinator, events) = coordinator();
    let host = ScriptedHost::new([Stop]);
    let log = host.statuses();

    let session = coordinator.begin(host).unwrap();
    let result = session.started(&dir.path().join("missing").join("panic.log"));

    assert!(matches!(result, Err(ServiceError::Io { .. })));
    assert_eq!(log.states(), vec![StartPending, Stopped]);
    assert_eq!(log.exit(), Some(ServiceExit::FAILURE));
    assert!(events.try_recv().is_err());
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(4)]
fn each_interrogation_repeats_running(#[case] interrogations: usize) {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (coordinator, _events) = coordinator();
    let host = ScriptedHost::new(vec![Interrogate; interrogations]);
    let log = host.statuses();

    let running = coordinator
        .begin(host)
        .unwrap()
        .started(&dir.path().join("panic.log"))
        .unwrap();
    // StartPending, Running, then one Running per interrogation.
    wait_for_statuses(&log, 2 + interrogations);
    running.stopped(Err("listener crashed")).unwrap();

    let mut expected = vec![StartPending];
    expected.extend(std::iter::repeat_n(Running, interrogations + 1));
    expected.push(Stopped);
    assert_eq!(log.states(), expected);

    let running_accepts = ControlAccept::STOP | ControlAccept::SHUTDOWN | ControlAccept::PARAM_CHANGE;
    assert!(
        log.snapshot()
            .iter()
            .filter(|s| s.state == Running)
            .all(|s| s.accepts == running_accepts && s.exit == ServiceExit::SUCCESS)
    );
    assert_eq!(log.exit(), Some(ServiceExit::FAILURE));
}

#[test]
fn param_change_reloads_in_order_before_shutdown() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (coordinator, events) = coordinator();
    let host = ScriptedHost::new([ParamChange, ParamChange, Stop]);

    let running = coordinator
        .begin(host)
        .unwrap()
        .started(&dir.path().join("panic.log"))
        .unwrap();

    let seen: Vec<_> = (0..3).map(|_| next_event(&events)).collect();
    running.stopped(Ok::<(), String>(())).unwrap();

    assert_eq!(
        seen,
        vec![DaemonEvent::Reload, DaemonEvent::Reload, DaemonEvent::Shutdown]
    );
}

#[test]
fn reload_holds_back_later_requests_until_it_returns() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let (events_tx, events) = unbounded();
    let (release_tx, release_rx) = bounded::<()>(0);
    let daemon = GatedDaemon {
        events: events_tx,
        gate: release_rx,
    };
    let coordinator =
        Coordinator::new("svcbridge-test", Arc::new(daemon)).fault_output(Box::new(NullOutput));
    let host = ScriptedHost::new([ParamChange, Stop]);
    let log = host.statuses();

    let running = coordinator
        .begin(host)
        .unwrap()
        .started(&dir.path().join("panic.log"))
        .unwrap();

    assert_eq!(next_event(&events), DaemonEvent::Reload);
    thread::sleep(Duration::from_millis(150));
    assert!(!log.states().contains(&StopPending));
    assert!(events.try_recv().is_err());

    release_tx.send(()).unwrap();
    assert_eq!(next_event(&events), DaemonEvent::ReloadDone);
    assert_eq!(next_event(&events), DaemonEvent::Shutdown);
    running.stopped(Ok::<(), String>(())).unwrap();

    assert_eq!(log.states(), vec![StartPending, Running, StopPending, Stopped]);
}

#[test]
fn second_live_coordinator_is_rejected() {
    let _serial = serial();
    let (first, _first_events) = coordinator();
    let session = first.begin(ScriptedHost::new([])).unwrap();

    let (second, _second_events) = coordinator();
    let err = second.begin(ScriptedHost::new([])).err();
    assert!(matches!(err, Some(ServiceError::AlreadyActive)));

    session.stopped(Ok::<(), String>(())).unwrap();

    // The slot is free again once the first session is done.
    let (third, _third_events) = coordinator();
    let session = third.begin(ScriptedHost::new([])).unwrap();
    session.stopped(Ok::<(), String>(())).unwrap();
}

#[test]
fn giving_up_before_start_never_reports_running() {
    let _serial = serial();
    let (coordinator, events) = coordinator();
    let host = ScriptedHost::new([Stop]);
    let log = host.statuses();

    let session = coordinator.begin(host).unwrap();
    session.stopped(Err("config unreadable")).unwrap();

    assert_eq!(log.states(), vec![StartPending, Stopped]);
    assert_eq!(log.exit(), Some(ServiceExit::FAILURE));
    assert!(events.try_recv().is_err());
}

#[test]
fn clean_stop_before_start_exits_successfully() {
    let _serial = serial();
    let (coordinator, _events) = coordinator();
    let host = ScriptedHost::new([]);
    let log = host.statuses();

    coordinator
        .begin(host)
        .unwrap()
        .stopped(Ok::<(), String>(()))
        .unwrap();

    assert_eq!(log.states(), vec![StartPending, Stopped]);
    assert_eq!(log.exit(), Some(ServiceExit::SUCCESS));
}

#[test]
fn fault_log_is_rotated_and_cleaned_up() {
    let _serial = serial();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("panic.log");
    std::fs::write(&path, "previous crash\n").unwrap();
    let (coordinator, _events) = coordinator();

    let running = coordinator
        .begin(ScriptedHost::new([]))
        .unwrap()
        .started(&path)
        .unwrap();
    assert!(path.exists());
    running.stopped(Ok::<(), String>(())).unwrap();

    // Nothing was written this run, so only the rotated copy remains.
    assert!(!path.exists());
    let backup = svcbridge::fault::fault_log_backup_path(&path);
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "previous crash\n");
}
