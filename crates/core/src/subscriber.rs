//! Subscriber-facing notification interface.

use std::collections::BTreeSet;

/// Receiver of session lifecycle notifications.
///
/// Exactly one subscriber owns a non-idle session. The controller compares
/// owners by `Arc` identity, so the same allocation must be passed to every
/// call that controls one session.
///
/// Notifications are delivered after the controller has released its
/// internal lock; a subscriber may call back into the controller from any
/// of these methods.
pub trait TraceSubscriber: Send + Sync {
    /// Category discovery finished. `categories` is the union of every
    /// endpoint's report.
    fn on_known_categories_collected(&self, categories: BTreeSet<String>);

    /// Every endpoint acknowledged the stop command. `categories` is the
    /// accumulated set of categories exercised during the session.
    fn on_end_tracing_complete(&self, categories: BTreeSet<String>);

    /// The buffer query resolved; `percent` is the maximum fullness reported
    /// by any endpoint.
    fn on_trace_buffer_percent_full_reply(&self, percent: f32);

    /// A chunk of trace data arrived from an endpoint. Chunks stream at any
    /// point while the session is recording or ending.
    fn on_trace_data_collected(&self, chunk: Vec<u8>);
}
