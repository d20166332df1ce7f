//! Endpoint registry and the registration capability.

use std::collections::HashMap;
use std::sync::Arc;

use crate::controller::TraceController;
use crate::endpoint::{EndpointId, TraceEndpoint};

/// Set of currently connected endpoints.
///
/// Iteration order is irrelevant: everything the controller folds over
/// replies (set union, max) is commutative.
#[derive(Default)]
pub(crate) struct EndpointRegistry {
    endpoints: HashMap<EndpointId, Arc<dyn TraceEndpoint>>,
}

impl EndpointRegistry {
    pub(crate) fn insert(&mut self, id: EndpointId, endpoint: Arc<dyn TraceEndpoint>) {
        self.endpoints.insert(id, endpoint);
    }

    pub(crate) fn remove(&mut self, id: EndpointId) -> Option<Arc<dyn TraceEndpoint>> {
        self.endpoints.remove(&id)
    }

    pub(crate) fn count(&self) -> usize {
        self.endpoints.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.endpoints.keys().copied()
    }

    pub(crate) fn endpoints(&self) -> impl Iterator<Item = &Arc<dyn TraceEndpoint>> {
        self.endpoints.values()
    }
}

/// Registration capability handed to the transport layer.
///
/// Deliberately narrower than [`TraceController`]: connection setup and
/// teardown can register and unregister endpoints, and nothing else.
#[derive(Clone)]
pub struct Registrar {
    controller: Arc<TraceController>,
}

impl Registrar {
    pub(crate) fn new(controller: Arc<TraceController>) -> Self {
        Self { controller }
    }

    /// Adds a connected endpoint and returns its registry identity.
    ///
    /// An endpoint registering while a phase is collecting acknowledgments
    /// does not join that tally; it participates in future phases only. If
    /// recording is active the endpoint is immediately sent the running
    /// session's begin command so it records too.
    pub fn register(&self, endpoint: Arc<dyn TraceEndpoint>) -> EndpointId {
        self.controller.register_endpoint(endpoint)
    }

    /// Removes a disconnected endpoint.
    ///
    /// If the current phase was waiting on this endpoint, the removal counts
    /// as its acknowledgment, so a disconnecting worker never blocks session
    /// completion.
    pub fn unregister(&self, id: EndpointId) {
        self.controller.unregister_endpoint(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tracehub_protocol::TraceCommand;

    struct Sink(Mutex<Vec<TraceCommand>>);

    impl TraceEndpoint for Sink {
        fn send_command(&self, command: TraceCommand) {
            self.0.lock().push(command);
        }
    }

    #[test]
    fn insert_remove_count() {
        let mut registry = EndpointRegistry::default();
        assert_eq!(registry.count(), 0);

        registry.insert(EndpointId(1), Arc::new(Sink(Mutex::new(Vec::new()))));
        registry.insert(EndpointId(2), Arc::new(Sink(Mutex::new(Vec::new()))));
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.endpoints().count(), 2);

        assert!(registry.remove(EndpointId(1)).is_some());
        assert!(registry.remove(EndpointId(1)).is_none());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![EndpointId(2)]);
    }
}
