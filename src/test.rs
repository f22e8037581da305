//! Test harness used by this crate's own unit/integration tests (and available to hosts
//! that want to run the same style of scenario test against their own compiled charts).
//!
//! There is no XML parser in this crate (see [crate::fsm_executor] for why), so fixtures
//! are built directly as [Fsm] values via [FsmBuilder] instead of loaded from a `.scxml`
//! file. `run_test_manual`/`run_test_manual_with_send` start the session in a worker
//! thread exactly like a production [crate::fsm::start_fsm] caller would, then block on
//! the thread join (optionally guarded by a watchdog) before comparing the traced final
//! configuration against the expected one.

use std::sync::mpsc::Sender;

use crate::datamodel::DataStore;
use crate::executable_content::ExecutableContent;
use crate::fsm;
use crate::fsm::{
    BindingType, Event, ExecutableContentId, Fsm, HistoryType, State, StateId, Transition,
    TransitionType,
};
use crate::fsm_executor::FsmExecutor;
use crate::test_tracer::{abort_test, ConfigSnapshot, TestTracer};
use crate::tracer::TraceMode;

/// Minimal builder for constructing an [Fsm] fixture by hand, state by state and
/// transition by transition, without going through an external parser.
pub struct FsmBuilder {
    fsm: Box<Fsm>,
}

impl Default for FsmBuilder {
    fn default() -> Self {
        FsmBuilder::new()
    }
}

impl FsmBuilder {
    /// Creates a builder already holding the pseudo-root (the implicit `<scxml>` state),
    /// at id 1 — state ids are 1-based, matching `Fsm::get_state_by_id`'s `id - 1` index.
    pub fn new() -> FsmBuilder {
        let mut fsm = Box::new(Fsm::new());
        let mut root = State::new(&"__root__".to_string());
        root.id = 1;
        root.doc_id = 1;
        fsm.states.push(root);
        fsm.pseudo_root = 1;
        FsmBuilder { fsm }
    }

    fn doc_order(&self) -> crate::fsm::DocumentId {
        (self.fsm.states.len() + 1) as crate::fsm::DocumentId
    }

    /// Id of the implicit top-level state every chart starts with.
    pub fn root(&self) -> StateId {
        self.fsm.pseudo_root
    }

    /// Adds a new atomic child state of `parent`, returning its id. The first child added
    /// under a given parent becomes that parent's initial state unless overridden later
    /// via [FsmBuilder::set_initial].
    pub fn add_state(&mut self, name: &str, parent: StateId) -> StateId {
        let mut state = State::new(&name.to_string());
        let id = (self.fsm.states.len() + 1) as StateId;
        state.id = id;
        state.doc_id = self.doc_order();
        state.parent = parent;
        self.fsm.states.push(state);

        let parent_has_initial = self.fsm.states[(parent - 1) as usize].initial != 0;
        self.fsm.states[(parent - 1) as usize].states.push(id);
        if !parent_has_initial {
            self.set_initial(parent, id);
        }
        id
    }

    /// Marks `state` as a `<final>` state.
    pub fn mark_final(&mut self, state: StateId) {
        self.fsm.states[(state - 1) as usize].is_final = true;
    }

    /// Marks `state` as a `<parallel>` state: all of its children are active whenever it is.
    pub fn mark_parallel(&mut self, state: StateId) {
        self.fsm.states[(state - 1) as usize].is_parallel = true;
    }

    /// Sets which child is entered when `parent` (a compound state) is entered. `State::initial`
    /// is a `TransitionId` (the W3C `<initial>` pseudo-transition), not a bare `StateId` — this
    /// builds that transition the same way [FsmBuilder::add_transition] does and points `parent`
    /// at it, so `Fsm::addDescendantStatesToEnter`'s `get_transition_by_id(state.initial)` resolves.
    pub fn set_initial(&mut self, parent: StateId, initial_child: StateId) {
        let mut t = Transition::new();
        t.source = parent;
        t.target = vec![initial_child];
        t.transition_type = TransitionType::Internal;
        t.doc_id = t.id;
        let tid = t.id;
        self.fsm.transitions.insert(tid, t);
        self.fsm.states[(parent - 1) as usize].initial = tid;
    }

    /// Adds a transition from `source` to `target` on `event` (empty for eventless).
    /// `*` may be used as a whole-segment wildcard, matched by [Transition::nameMatch]-
    /// equivalent logic in `Fsm::selectTransitions`.
    pub fn add_transition(
        &mut self,
        source: StateId,
        target: StateId,
        event: &str,
        transition_type: TransitionType,
    ) -> crate::fsm::TransitionId {
        let mut t = Transition::new();
        t.source = source;
        t.target = vec![target];
        t.transition_type = transition_type;
        t.doc_id = t.id;
        if !event.is_empty() {
            t.wildcard = event == "*";
            if !t.wildcard {
                t.events.push(event.to_string());
            }
        }
        let tid = t.id;
        self.fsm.states[(source - 1) as usize].transitions.push(tid);
        self.fsm.transitions.insert(tid, t);
        tid
    }

    /// Registers `content` under a fresh [ExecutableContentId] and returns it, for use as
    /// a transition's content, or a state's onentry/onexit.
    pub fn add_content(&mut self, content: Vec<Box<dyn ExecutableContent>>) -> ExecutableContentId {
        let id = (self.fsm.executableContent.len() + 1) as ExecutableContentId;
        self.fsm.executableContent.insert(id, content);
        id
    }

    pub fn set_onentry(&mut self, state: StateId, content: ExecutableContentId) {
        self.fsm.states[(state - 1) as usize].onentry = content;
    }

    pub fn set_onexit(&mut self, state: StateId, content: ExecutableContentId) {
        self.fsm.states[(state - 1) as usize].onexit = content;
    }

    pub fn set_transition_content(
        &mut self,
        transition: crate::fsm::TransitionId,
        content: ExecutableContentId,
    ) {
        self.fsm
            .transitions
            .get_mut(&transition)
            .unwrap()
            .content = content;
    }

    pub fn set_binding(&mut self, binding: BindingType) {
        self.fsm.binding = binding;
    }

    pub fn set_local_data(&mut self, state: StateId, data: DataStore) {
        self.fsm.states[(state - 1) as usize].data = data;
    }

    pub fn set_history(&mut self, state: StateId, history_type: HistoryType) {
        self.fsm.states[(state - 1) as usize].history_type = history_type;
    }

    pub fn add_invoke(&mut self, state: StateId, invoke: crate::fsm::Invoke) {
        self.fsm.states[(state - 1) as usize].invoke.push(invoke);
    }

    pub fn build(self) -> Box<Fsm> {
        self.fsm
    }
}

/// Runs `fsm` to completion with no externally-submitted events, then checks the final
/// traced configuration against `expected_final_configuration` (unordered set of state
/// names). `timeout_ms` of `0` disables the watchdog.
pub fn run_test_manual(
    test_name: &str,
    fsm: Box<Fsm>,
    trace_mode: TraceMode,
    timeout_ms: u64,
    expected_final_configuration: &[String],
) -> bool {
    run_test_manual_with_send(
        test_name,
        fsm,
        trace_mode,
        timeout_ms,
        expected_final_configuration,
        move |_sender| {},
    )
}

/// Same as [run_test_manual], but `cb` is invoked with the session's external-event
/// sender right after startup, so the test can submit events.
pub fn run_test_manual_with_send(
    test_name: &str,
    mut fsm: Box<Fsm>,
    trace_mode: TraceMode,
    timeout_ms: u64,
    expected_final_configuration: &[String],
    mut cb: impl FnMut(Sender<Box<Event>>),
) -> bool {
    let mut tracer = Box::new(TestTracer::new());
    tracer.enable_trace(trace_mode);
    let current_config: ConfigSnapshot = tracer.get_fsm_config();
    fsm.tracer = tracer;

    let executor = Box::new(FsmExecutor::new_without_io_processor());
    let session = fsm::start_fsm(fsm, executor);

    let mut watchdog_sender: Option<Box<Sender<String>>> = None;
    if timeout_ms > 0 {
        watchdog_sender = Some(TestTracer::start_watchdog(test_name, timeout_ms));
    }

    cb(session.sender.clone());

    let join_handle = {
        let mut session = session;
        session.session_thread.take()
    };
    if let Some(jh) = join_handle {
        let _ = jh.join();
    }

    if let Some(sender) = watchdog_sender {
        TestTracer::disable_watchdog(&sender);
    }

    if expected_final_configuration.is_empty() {
        true
    } else {
        match TestTracer::verify_final_configuration(expected_final_configuration, &current_config) {
            Ok(states) => {
                println!("[{}] ==> final configuration '{}' reached", test_name, states);
                true
            }
            Err(expected) => {
                let guard = current_config.lock();
                let actual = if guard.is_ok() {
                    let mut names: Vec<String> = guard.unwrap().keys().cloned().collect();
                    names.sort();
                    names.join(",")
                } else {
                    "<lock poisoned>".to_string()
                };
                eprintln!(
                    "[{}] ==> expected final configuration '{}' not reached; actual: '{}'",
                    test_name, expected, actual
                );
                false
            }
        }
    }
}

/// Convenience wrapper that panics (failing the test) instead of returning `bool`.
pub fn run_test_manual_and_assert(
    test_name: &str,
    fsm: Box<Fsm>,
    trace_mode: TraceMode,
    timeout_ms: u64,
    expected_final_configuration: &[String],
) {
    if !run_test_manual(
        test_name,
        fsm,
        trace_mode,
        timeout_ms,
        expected_final_configuration,
    ) {
        abort_test(format!("scenario '{}' did not reach its expected configuration", test_name));
    }
}
