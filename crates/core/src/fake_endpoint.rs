//! Fake endpoint for unit testing command broadcast and acknowledgment flow.
//!
//! Provides an in-memory endpoint for exercising the controller without a
//! transport or worker process.
//!
//! # Example
//!
//! ```ignore
//! let controller = Arc::new(TraceController::new());
//! let (endpoint, handle) = FakeEndpointBuilder::new().build();
//! let id = controller.registrar().register(endpoint);
//!
//! controller.get_known_categories_async(&subscriber)?;
//! let generation = handle.last_generation().unwrap();
//! controller.on_reply(id, TraceReply::KnownCategories { generation, categories });
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use tracehub_protocol::TraceCommand;

use crate::endpoint::TraceEndpoint;

/// Builder for fake endpoint instances.
pub struct FakeEndpointBuilder {
    // Nothing needed for now, but allows future extensibility
}

impl FakeEndpointBuilder {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds the endpoint and a handle for inspecting delivered commands.
    pub fn build(self) -> (Arc<FakeEndpoint>, FakeEndpointHandle) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let endpoint = Arc::new(FakeEndpoint {
            sent: Arc::clone(&sent),
        });
        (endpoint, FakeEndpointHandle { sent })
    }
}

impl Default for FakeEndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Endpoint that records every command instead of delivering it.
pub struct FakeEndpoint {
    sent: Arc<Mutex<Vec<TraceCommand>>>,
}

impl TraceEndpoint for FakeEndpoint {
    fn send_command(&self, command: TraceCommand) {
        self.sent.lock().push(command);
    }
}

/// Inspection handle for commands captured by a [`FakeEndpoint`].
pub struct FakeEndpointHandle {
    sent: Arc<Mutex<Vec<TraceCommand>>>,
}

impl FakeEndpointHandle {
    /// Takes all captured commands, clearing the buffer.
    pub fn take_sent(&self) -> Vec<TraceCommand> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Generation carried by the most recently captured command, used to
    /// craft matching replies.
    pub fn last_generation(&self) -> Option<u64> {
        self.sent.lock().last().map(TraceCommand::generation)
    }
}
