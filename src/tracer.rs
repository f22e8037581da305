//! Pluggable tracing/observation hooks for the interpreter.
//!
//! The W3C pseudo-code is full of "trace points" that have no semantic effect on the
//! algorithm itself. Rather than hard-coding a logging backend into [crate::fsm::Fsm],
//! the interpreter calls out to a [Tracer] trait object so the host application can
//! redirect method/state/event tracing to whatever observability stack it already has
//! (here: the `log` crate). This is the direct replacement for the old hook methods
//! (`beginSelectTransitions`, `beginMicrostep`, ...): instead of overriding virtual
//! methods of a base state-machine class, the interpreter simply calls a handful of
//! named methods on `self.tracer` at the equivalent points.

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use log::{debug, trace};

use crate::fsm::{Event, State};

/// Selects which categories of trace output a [Tracer] should emit.
/// Independent of the `Trace_Method`/`Trace_State`/`Trace_Event` cargo features, which
/// gate *whether the call sites exist at all*; this controls verbosity at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TraceMode {
    Off,
    Methods,
    States,
    Events,
    Arguments,
    Results,
    All,
}

impl TraceMode {
    pub(crate) fn enabled(&self) -> bool {
        !matches!(self, TraceMode::Off)
    }
}

impl FromStr for TraceMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "" => Ok(TraceMode::Off),
            "methods" => Ok(TraceMode::Methods),
            "states" => Ok(TraceMode::States),
            "events" => Ok(TraceMode::Events),
            "arguments" => Ok(TraceMode::Arguments),
            "results" => Ok(TraceMode::Results),
            "all" => Ok(TraceMode::All),
            _ => Err(()),
        }
    }
}

impl Display for TraceMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TraceMode::Off => "off",
            TraceMode::Methods => "methods",
            TraceMode::States => "states",
            TraceMode::Events => "events",
            TraceMode::Arguments => "arguments",
            TraceMode::Results => "results",
            TraceMode::All => "all",
        };
        write!(f, "{}", name)
    }
}

/// Observer callbacks invoked by the interpreter at method/state/event boundaries.
/// All methods take `&self`: a tracer observes, it never influences the algorithm.
pub trait Tracer: Debug + Send {
    fn enable_trace(&mut self, mode: TraceMode);

    fn trace_mode(&self) -> TraceMode;

    /// Free-form diagnostic message.
    fn trace(&self, msg: &str);

    fn enter_method(&self, method: &str);

    fn exit_method(&self, method: &str);

    fn trace_argument(&self, name: &str, value: &dyn Display);

    fn trace_result(&self, name: &str, value: &dyn Display);

    fn trace_enter_state(&self, state: &State);

    fn trace_exit_state(&self, state: &State);

    fn event_internal_received(&self, event: &Event);

    fn event_external_received(&self, event: &Event);

    fn event_internal_send(&self, event: &Event);
}

/// Tracer that forwards everything to the `log` crate at `trace` level.
/// This is what an [Fsm](crate::fsm::Fsm) uses unless the embedder installs its own.
#[derive(Debug)]
pub struct DefaultTracer {
    mode: TraceMode,
}

impl Default for DefaultTracer {
    fn default() -> Self {
        DefaultTracer::new()
    }
}

impl DefaultTracer {
    pub fn new() -> DefaultTracer {
        DefaultTracer {
            mode: TraceMode::Off,
        }
    }
}

impl Tracer for DefaultTracer {
    fn enable_trace(&mut self, mode: TraceMode) {
        self.mode = mode;
    }

    fn trace_mode(&self) -> TraceMode {
        self.mode
    }

    fn trace(&self, msg: &str) {
        if self.mode.enabled() {
            trace!("{}", msg);
        }
    }

    fn enter_method(&self, method: &str) {
        if self.mode.enabled() {
            trace!(">> {}", method);
        }
    }

    fn exit_method(&self, method: &str) {
        if self.mode.enabled() {
            trace!("<< {}", method);
        }
    }

    fn trace_argument(&self, name: &str, value: &dyn Display) {
        if self.mode.enabled() {
            trace!("  arg {} = {}", name, value);
        }
    }

    fn trace_result(&self, name: &str, value: &dyn Display) {
        if self.mode.enabled() {
            trace!("  result {} = {}", name, value);
        }
    }

    fn trace_enter_state(&self, state: &State) {
        if self.mode.enabled() {
            debug!("enter state '{}'", state.name);
        }
    }

    fn trace_exit_state(&self, state: &State) {
        if self.mode.enabled() {
            debug!("exit state '{}'", state.name);
        }
    }

    fn event_internal_received(&self, event: &Event) {
        if self.mode.enabled() {
            debug!("internal event received: {}", event);
        }
    }

    fn event_external_received(&self, event: &Event) {
        if self.mode.enabled() {
            debug!("external event received: {}", event);
        }
    }

    fn event_internal_send(&self, event: &Event) {
        if self.mode.enabled() {
            debug!("internal event raised: {}", event);
        }
    }
}
