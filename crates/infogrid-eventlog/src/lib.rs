//! infogrid-eventlog — structured lifecycle events.
//!
//! The event log stores structured data about what happens to
//! infrastructures and nodes, suitable for decision making (user
//! intervention, automated supervision). Records go to a pluggable sink —
//! the logging channel by default — and each logged event additionally
//! triggers a best-effort push notification configured per infrastructure.

pub mod event;
pub mod log;
pub mod notifier;

pub use event::{Event, EventSink, TracingEventSink};
pub use log::EventLog;
pub use notifier::{NotifierRegistry, PushSender};
