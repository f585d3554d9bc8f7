//! Event delivery for tasks and the scheduler
//!
//! Tasks and the scheduler report through an [`EventSink`]. Events for a
//! single task are emitted from that task's own flow, so a sink sees them in
//! order. Sinks must not block: they are called inline on the download path.

use dlkit_types::CoreEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Receiver of [`CoreEvent`]s
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: CoreEvent) {}
}

impl EventSink for mpsc::UnboundedSender<CoreEvent> {
    fn emit(&self, event: CoreEvent) {
        let _ = self.send(event);
    }
}

impl EventSink for broadcast::Sender<CoreEvent> {
    fn emit(&self, event: CoreEvent) {
        let _ = self.send(event);
    }
}

/// Adapter for plain closures
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(CoreEvent) + Send + Sync,
{
    fn emit(&self, event: CoreEvent) {
        (self.0)(event)
    }
}

/// Shared sink handle stored by tasks and schedulers
pub type SharedSink = Arc<dyn EventSink>;

pub(crate) fn noop_sink() -> SharedSink {
    Arc::new(NoopSink)
}
