//! Endpoint command interface.

use std::fmt;

use tracehub_protocol::{CategoryFilter, TraceCommand};

/// Identity of a registered endpoint, allocated by the controller at
/// registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId(pub(crate) u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint#{}", self.0)
    }
}

/// One worker connection able to receive trace commands.
///
/// Implementations hand `send_command` to their transport without blocking;
/// the controller treats every command as fire-and-forget and collects
/// acknowledgments separately through
/// [`TraceController::on_reply`](crate::TraceController::on_reply).
pub trait TraceEndpoint: Send + Sync {
    /// Delivers one command to the worker.
    ///
    /// The controller invokes this while holding its internal lock so every
    /// endpoint observes one consistent command order: implementations must
    /// not block and must not call back into the controller.
    fn send_command(&self, command: TraceCommand);

    /// Tells the worker to start recording events passing `filter`.
    fn begin_tracing(&self, generation: u64, filter: CategoryFilter) {
        self.send_command(TraceCommand::BeginTracing { generation, filter });
    }

    /// Tells the worker to stop recording and report exercised categories.
    fn end_tracing(&self, generation: u64) {
        self.send_command(TraceCommand::EndTracing { generation });
    }

    /// Asks the worker for every category label it knows.
    fn request_known_categories(&self, generation: u64) {
        self.send_command(TraceCommand::GetKnownCategories { generation });
    }

    /// Asks the worker how full its trace buffer is.
    fn request_buffer_percent_full(&self, generation: u64) {
        self.send_command(TraceCommand::GetBufferPercentFull { generation });
    }
}
