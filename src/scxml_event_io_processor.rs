use std::fmt::Debug;

use log::{error, info};

use crate::datamodel::{GlobalDataArc, SCXML_EVENT_PROCESSOR};
/// See https://www.w3.org/TR/scxml/#SCXMLEventProcessor

use crate::event_io_processor::{EventIOProcessor, EventIOProcessorHandle};
use crate::fsm::Event;

/// Reserved target that delivers to the sending session's own internal queue.
pub const SCXML_TARGET_INTERNAL: &str = "#_internal";

/// Reserved target that delivers to the parent session, if any (external queue).
pub const SCXML_TARGET_PARENT: &str = "#_parent";

/// Prefix of the reserved target that addresses a session directly by id:
/// `#_scxml_<sessionId>`.
pub const SCXML_TARGET_SESSION_PREFIX: &str = "#_scxml_";

/// Prefix of the reserved target that addresses one of this session's own invoked
/// children by invoke id: `#_<invokeId>`.
pub const SCXML_TARGET_INVOKE_PREFIX: &str = "#_";

#[derive(Debug)]
pub struct ScxmlEventIOProcessor {
    pub location: String,
    pub handle: EventIOProcessorHandle,
}

impl ScxmlEventIOProcessor {
    pub fn new() -> ScxmlEventIOProcessor {
        info!("Scxml Event Processor starting");

        let e = ScxmlEventIOProcessor
        {
            location: "scxml-processor".to_string(),
            handle: EventIOProcessorHandle::new(),
        };
        e
    }
}

const TYPES: &[&str] = &[SCXML_EVENT_PROCESSOR, "scxml"];

impl EventIOProcessor for ScxmlEventIOProcessor {
    fn get_location(&self) -> String {
        self.location.clone()
    }

    /// Returns the type of this processor.
    fn get_types(&self) -> &[&str] { TYPES }

    fn get_handle(&mut self) -> &mut EventIOProcessorHandle {
        &mut self.handle
    }

    fn get_copy(&self) -> Box<dyn EventIOProcessor> {
        let b = ScxmlEventIOProcessor {
            location: self.location.clone(),
            handle: self.handle.clone(),
        };
        Box::new(b)
    }

    /// This processor doesn't really need a shutdown.
    /// The implementation does nothing.
    fn shutdown(&mut self) {
        info!("Scxml Event IO Processor shutdown...");
        self.handle.shutdown();
    }

    /// Routes `event` to `target`. Understands the reserved addresses every session exposes:
    /// '#_internal' loops back to this session's own internal queue, '#_parent' reaches the
    /// parent session (if any), '#_scxml_<sessionId>' addresses a session directly and
    /// '#_<invokeId>' addresses one of this session's own invoked children. Any other target
    /// is legal SCXML but unreachable by this processor, so the caller must raise
    /// 'error.communication'.
    fn send(&mut self, global: &GlobalDataArc, target: &str, mut event: Event) -> bool {
        if target.is_empty() || target.eq(SCXML_TARGET_INTERNAL) {
            global.lock().enqueue_internal(event);
            return true;
        }

        if target.eq(SCXML_TARGET_PARENT) {
            let (has_parent, caller_invoke_id, sender) = {
                let g = global.lock();
                match g.parent_session_id {
                    None => (false, None, None),
                    Some(parent_id) => (
                        true,
                        g.caller_invoke_id.clone(),
                        g.executor.as_ref().and_then(|e| e.get_session_sender(parent_id)),
                    ),
                }
            };
            return match (has_parent, sender) {
                (true, Some(sender)) => {
                    event.invoke_id = caller_invoke_id;
                    sender.send(Box::new(event)).is_ok()
                }
                _ => {
                    error!("Send: target '{}' has no reachable parent session", target);
                    false
                }
            };
        }

        // '#_scxml_' is itself a longer match of the '#_' invoke prefix, so a session id
        // that fails to parse as u32 here falls through to the invoke-id branch below
        // rather than being reported as unreachable — an invoke id starting with
        // "scxml_" (e.g. id="scxml_worker") must still resolve via '#_scxml_worker'.
        if let Some(session_id_str) = target.strip_prefix(SCXML_TARGET_SESSION_PREFIX) {
            if let Ok(session_id) = session_id_str.parse::<u32>() {
                let sender = global
                    .lock()
                    .executor
                    .as_ref()
                    .and_then(|e| e.get_session_sender(session_id));
                return match sender {
                    Some(sender) => sender.send(Box::new(event)).is_ok(),
                    None => {
                        error!("Send: session '{}' is unknown", session_id_str);
                        false
                    }
                };
            }
        }

        if let Some(invoke_id) = target.strip_prefix(SCXML_TARGET_INVOKE_PREFIX) {
            let sender = global
                .lock()
                .child_sessions
                .get(invoke_id)
                .map(|s| s.sender.clone());
            return match sender {
                Some(sender) => sender.send(Box::new(event)).is_ok(),
                None => {
                    error!("Send: invoked child '{}' is unknown", invoke_id);
                    false
                }
            };
        }

        error!(
            "Send: target '{}' is not reachable by the SCXML event processor",
            target
        );
        false
    }
}
