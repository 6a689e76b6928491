//! Quest event log
//!
//! Every domain event (runs, trials, assessment, completion, rejected
//! commands) flows through the EventBus with a millisecond timestamp, and can
//! be written out in a compact one-line-per-event text format.

mod bus;
mod format;
mod types;

pub use bus::{BusEvent, EventBus, update_event_bus_time};
pub use format::serialize_event;
pub use types::QuestEvent;
