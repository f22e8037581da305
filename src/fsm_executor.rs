//! Helper module to maintain FSM sessions.\
//! Charts are no longer loaded from SCXML source at runtime (there is no XML parser in this
//! crate); instead the host registers a compiled chart under a name via [FsmExecutor::add_chart]
//! and \<invoke src="name"\>/`execute` resolve that name through the registry. This mirrors the
//! W3C text that "other invoke types are provided by external factories implementing the same
//! contract" for the `scxml` invoke type's `src` attribute as well.

use std::collections::HashMap;
#[cfg(test)]
use std::println as info;
use std::sync::mpsc::{SendError, Sender};
use std::sync::{Arc, Mutex};

#[cfg(not(test))]
use log::info;

use crate::datamodel::Data;
use crate::event_io_processor::EventIOProcessor;
use crate::fsm;
use crate::fsm::{Event, InvokeId, ScxmlSession, SessionId};
use crate::scxml_event_io_processor::ScxmlEventIOProcessor;
#[cfg(feature = "Trace")]
use crate::tracer::TraceMode;
use crate::Fsm;

/// Produces a fresh, unstarted [Fsm] for a chart registered under some name.
/// Implemented once per distinct chart; `FsmExecutor::execute_with_data` calls `create()`
/// for every `<invoke>` so each session gets its own independent state/data. `Fsm` holds
/// trait objects (tracer, executable content) and so isn't itself `Clone`; a factory is
/// expected to rebuild the chart from whatever representation the host keeps (e.g. replaying
/// a compiled instruction list), not to clone a live instance.
pub trait ChartFactory: Send + Sync {
    fn create(&self) -> Box<Fsm>;
}

/// [ChartFactory] built from a plain closure, for hosts that just want to pass
/// `|| Box::new(build_my_chart())`.
pub struct FnChartFactory<F: Fn() -> Box<Fsm> + Send + Sync> {
    f: F,
}

impl<F: Fn() -> Box<Fsm> + Send + Sync> FnChartFactory<F> {
    pub fn new(f: F) -> FnChartFactory<F> {
        FnChartFactory { f }
    }
}

impl<F: Fn() -> Box<Fsm> + Send + Sync> ChartFactory for FnChartFactory<F> {
    fn create(&self) -> Box<Fsm> {
        (self.f)()
    }
}

#[derive(Default)]
pub struct ExecuteState {
    pub processors: Vec<Box<dyn EventIOProcessor>>,
    pub sessions: HashMap<SessionId, ScxmlSession>,
}

impl ExecuteState {
    pub fn new() -> ExecuteState {
        ExecuteState {
            processors: Vec::new(),
            sessions: HashMap::new(),
        }
    }
}

/// Executed FSM in separate threads.
/// This class maintains IO Processors used by the FSMs and running sessions.
#[derive(Clone)]
pub struct FsmExecutor {
    pub state: Arc<Mutex<ExecuteState>>,
    charts: Arc<Mutex<HashMap<String, Arc<dyn ChartFactory>>>>,
}

impl FsmExecutor {
    pub fn add_processor(&mut self, processor: Box<dyn EventIOProcessor>) {
        self.state.lock().unwrap().processors.push(processor);
    }

    pub fn new_without_io_processor() -> FsmExecutor {
        let mut e = FsmExecutor {
            state: Arc::new(Mutex::new(ExecuteState::new())),
            charts: Arc::new(Mutex::new(HashMap::new())),
        };
        e.add_processor(Box::new(ScxmlEventIOProcessor::new()));
        e
    }

    pub fn new_with_io_processor() -> FsmExecutor {
        let mut e = FsmExecutor {
            state: Arc::new(Mutex::new(ExecuteState::new())),
            charts: Arc::new(Mutex::new(HashMap::new())),
        };
        e.add_processor(Box::new(ScxmlEventIOProcessor::new()));
        e
    }

    /// Registers a chart under `name` so that `<invoke src="name">` (or a direct call to
    /// [FsmExecutor::execute_with_data]) can instantiate it.
    pub fn add_chart(&mut self, name: &str, factory: Arc<dyn ChartFactory>) {
        self.charts.lock().unwrap().insert(name.to_string(), factory);
    }

    /// Shutdown of all FSMs and IO-Processors.
    pub fn shutdown(&mut self) {
        let mut guard = self.state.lock().unwrap();
        while !guard.processors.is_empty() {
            if let Some(mut pp) = guard.processors.pop() {
                pp.shutdown();
            }
        }
    }

    /// Instantiates and starts the chart registered under `name`.
    pub fn execute(
        &mut self,
        name: &str,
        #[cfg(feature = "Trace")] trace: TraceMode,
    ) -> Result<ScxmlSession, String> {
        self.execute_with_data(
            name,
            &HashMap::new(),
            None,
            &"".to_string(),
            #[cfg(feature = "Trace")]
            trace,
        )
    }

    /// Instantiates and starts the chart registered under `name`, seeding its top-level
    /// datamodel with `data` before the first macrostep.
    pub fn execute_with_data(
        &mut self,
        name: &str,
        data: &HashMap<String, Data>,
        parent: Option<SessionId>,
        invoke_id: &InvokeId,
        #[cfg(feature = "Trace")] trace: TraceMode,
    ) -> Result<ScxmlSession, String> {
        info!("Starting chart '{}'", name);

        let factory = self.charts.lock().unwrap().get(name).cloned();
        match factory {
            None => Err(format!("No chart registered under '{}'", name)),
            Some(factory) => {
                let mut fsm = factory.create();
                #[cfg(feature = "Trace")]
                fsm.tracer.enable_trace(trace);
                fsm.caller_invoke_id = Some(invoke_id.clone());
                fsm.parent_session_id = parent;
                let session = fsm::start_fsm_with_data(fsm, Box::new(self.clone()), data);
                Ok(session)
            }
        }
    }

    /// Called by FSM after session ends and FinishMode::DISPOSE.
    pub fn remove_session(&mut self, session_id: SessionId) {
        self.state.lock().unwrap().sessions.remove(&session_id);
    }

    pub fn get_session_sender(&self, session_id: SessionId) -> Option<Sender<Box<Event>>> {
        Some(
            self.state
                .lock()
                .unwrap()
                .sessions
                .get(&session_id)?
                .sender
                .clone(),
        )
    }

    pub fn send_to_session(
        &self,
        session_id: SessionId,
        event: Event,
    ) -> Result<(), SendError<Box<Event>>> {
        match self.get_session_sender(session_id) {
            None => Err(SendError(Box::new(event))),
            Some(sender) => sender.send(Box::new(event)),
        }
    }
}
