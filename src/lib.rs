extern crate core;

use std::str::FromStr;
use std::sync::mpsc::Sender;

use log::error;

use tracer::TraceMode;

use crate::fsm::Event;

pub mod fsm_executor;
pub mod fsm;
pub mod executable_content;

pub mod scxml_event_io_processor;

pub mod datamodel;
pub mod event_io_processor;
pub mod tracer;
#[cfg(any(test, feature = "test-harness"))]
pub mod test_tracer;
#[cfg(any(test, feature = "test-harness"))]
pub mod test;

pub use fsm::Fsm;

pub fn handle_trace(sender: &mut Sender<Box<Event>>, opt: &str, enable: bool) {
    match TraceMode::from_str(opt) {
        Ok(t) => {
            let event = Box::new(Event::trace(t, enable));
            match sender.send(event) {
                Ok(_r) => {
                    // ok
                }
                Err(e) => {
                    error!("Error sending trace event: {}", e);
                }
            }
        }
        Err(_e) => {
            eprintln!("Unknown trace option. Use one of:\n methods\n states\n events\n arguments\n results\n all\n");
        }
    }
}
