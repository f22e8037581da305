//! A [Tracer] used only by the test harness in [crate::test]: it mirrors entered/exited
//! states into a shared map so a test can inspect the live configuration from the calling
//! thread while the interpreter runs on its own, and it hosts the watchdog used to fail a
//! test that never reaches its expected configuration.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::fsm::{Event, State};
use crate::tracer::{TraceMode, Tracer};

/// Snapshot of the configuration, keyed by state name. Shared with the test thread via
/// [TestTracer::get_fsm_config] so it can be read after the session thread has joined.
pub type ConfigSnapshot = Arc<Mutex<HashMap<String, bool>>>;

#[derive(Debug)]
pub struct TestTracer {
    mode: TraceMode,
    config: ConfigSnapshot,
}

impl Default for TestTracer {
    fn default() -> Self {
        TestTracer::new()
    }
}

impl TestTracer {
    pub fn new() -> TestTracer {
        TestTracer {
            mode: TraceMode::Off,
            config: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get_fsm_config(&self) -> ConfigSnapshot {
        self.config.clone()
    }

    /// Spawns a background thread that aborts the test process if `timeout_ms` elapses
    /// without [TestTracer::disable_watchdog] being called on the returned sender.
    pub fn start_watchdog(test_name: &str, timeout_ms: u64) -> Box<Sender<String>> {
        let (tx, rx) = channel::<String>();
        let name = test_name.to_string();
        thread::Builder::new()
            .name("test_watchdog".to_string())
            .spawn(move || {
                if rx.recv_timeout(Duration::from_millis(timeout_ms)).is_err() {
                    abort_test(format!(
                        "Test '{}' did not finish within {}ms",
                        name, timeout_ms
                    ));
                }
            })
            .expect("failed to spawn watchdog thread");
        Box::new(tx)
    }

    pub fn disable_watchdog(sender: &Sender<String>) {
        let _ = sender.send("finished".to_string());
    }

    /// Compares `expected` (state names, any order) against the states currently marked
    /// active in `actual`. `Ok` carries the matched, comma-joined state list for logging;
    /// `Err` carries the (sorted) expected list so the caller can report the mismatch.
    pub fn verify_final_configuration(
        expected: &[String],
        actual: &ConfigSnapshot,
    ) -> Result<String, String> {
        let guard = actual.lock().unwrap();
        let mut actual_names: Vec<String> = guard.keys().cloned().collect();
        actual_names.sort();

        let mut expected_sorted: Vec<String> = expected.to_vec();
        expected_sorted.sort();

        if actual_names == expected_sorted {
            Ok(actual_names.join(","))
        } else {
            Err(expected_sorted.join(","))
        }
    }
}

/// Prints `msg` and terminates the test process immediately. Used for harness-level
/// failures (bad fixture, timeout) that aren't meaningfully recoverable as a `Result`.
pub fn abort_test(msg: impl Display) -> ! {
    eprintln!("test aborted: {}", msg);
    std::process::exit(1);
}

impl Tracer for TestTracer {
    fn enable_trace(&mut self, mode: TraceMode) {
        self.mode = mode;
    }

    fn trace_mode(&self) -> TraceMode {
        self.mode
    }

    fn trace(&self, msg: &str) {
        if self.mode.enabled() {
            println!("{}", msg);
        }
    }

    fn enter_method(&self, method: &str) {
        if self.mode.enabled() {
            println!(">> {}", method);
        }
    }

    fn exit_method(&self, method: &str) {
        if self.mode.enabled() {
            println!("<< {}", method);
        }
    }

    fn trace_argument(&self, name: &str, value: &dyn Display) {
        if self.mode.enabled() {
            println!("  arg {} = {}", name, value);
        }
    }

    fn trace_result(&self, name: &str, value: &dyn Display) {
        if self.mode.enabled() {
            println!("  result {} = {}", name, value);
        }
    }

    fn trace_enter_state(&self, state: &State) {
        if self.mode.enabled() {
            println!("enter state '{}'", state.name);
        }
        self.config.lock().unwrap().insert(state.name.clone(), true);
    }

    fn trace_exit_state(&self, state: &State) {
        if self.mode.enabled() {
            println!("exit state '{}'", state.name);
        }
        self.config.lock().unwrap().remove(&state.name);
    }

    fn event_internal_received(&self, event: &Event) {
        if self.mode.enabled() {
            println!("internal event received: {}", event);
        }
    }

    fn event_external_received(&self, event: &Event) {
        if self.mode.enabled() {
            println!("external event received: {}", event);
        }
    }

    fn event_internal_send(&self, event: &Event) {
        if self.mode.enabled() {
            println!("internal event raised: {}", event);
        }
    }
}
