//! Trace session controller.
//!
//! One [`TraceController`] per process owns the tracing session lifecycle
//! across every registered worker endpoint. Operations validate a guard
//! against the current session state, broadcast a command to the endpoints
//! registered at that moment, and return without waiting; completion reaches
//! the owning [`TraceSubscriber`] once every counted endpoint has
//! acknowledged or disconnected.
//!
//! All entry points serialize on one internal lock, so replies may be
//! delivered from any thread or task. Commands are broadcast while the lock
//! is held, which gives every endpoint a single consistent command order;
//! subscriber notifications are delivered after the lock is released, so a
//! subscriber may reenter the controller from a notification callback.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use tracehub_protocol::{CategoryFilter, TraceReply};

use crate::endpoint::{EndpointId, TraceEndpoint};
use crate::error::{Error, Result};
use crate::registry::{EndpointRegistry, Registrar};
use crate::session::{BufferQuery, Phase, SessionState};
use crate::startup::StartupTraceConfig;
use crate::subscriber::TraceSubscriber;

/// Process-wide coordinator for tracing sessions across worker endpoints.
pub struct TraceController {
    state: Mutex<ControlState>,
    next_endpoint_id: AtomicU64,
}

struct ControlState {
    registry: EndpointRegistry,
    session: SessionState,
}

/// Notification computed under the lock, delivered after it is released.
enum Notification {
    KnownCategories(Arc<dyn TraceSubscriber>, BTreeSet<String>),
    EndTracingComplete(Arc<dyn TraceSubscriber>, BTreeSet<String>),
    BufferPercentFull(Arc<dyn TraceSubscriber>, f32),
}

impl Notification {
    fn deliver(self) {
        match self {
            Self::KnownCategories(subscriber, categories) => {
                subscriber.on_known_categories_collected(categories);
            }
            Self::EndTracingComplete(subscriber, categories) => {
                subscriber.on_end_tracing_complete(categories);
            }
            Self::BufferPercentFull(subscriber, percent) => {
                subscriber.on_trace_buffer_percent_full_reply(percent);
            }
        }
    }
}

impl TraceController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                registry: EndpointRegistry::default(),
                session: SessionState::new(),
            }),
            next_endpoint_id: AtomicU64::new(1),
        }
    }

    /// Registration capability for the transport layer.
    pub fn registrar(self: &Arc<Self>) -> Registrar {
        Registrar::new(Arc::clone(self))
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.state.lock().session.phase
    }

    /// Whether a session is currently recording.
    pub fn is_tracing(&self) -> bool {
        self.phase() == Phase::Tracing
    }

    /// Number of currently registered endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.state.lock().registry.count()
    }

    /// Begins tracing at process start, before any subscriber exists.
    ///
    /// The session runs ownerless until the first subscriber ends it or
    /// queries buffer fullness, which claims it.
    pub fn init_startup_tracing(&self, config: &StartupTraceConfig) -> Result<()> {
        let filter = config.filter()?;
        let mut state = self.state.lock();
        if state.session.phase != Phase::Idle {
            debug!(target: "trace.controller", phase = ?state.session.phase, "startup tracing rejected");
            return Err(Error::InvalidState("startup tracing requires an idle session"));
        }
        info!(target: "trace.controller", %filter, endpoints = state.registry.count(), "startup tracing started");
        begin_recording(&mut state, None, filter);
        Ok(())
    }

    /// Collects the set of known categories from every endpoint.
    ///
    /// Accepted only while idle. Completion arrives through
    /// [`TraceSubscriber::on_known_categories_collected`] with the union of
    /// every endpoint's report; with no endpoints registered it fires before
    /// this call returns, carrying the empty set.
    pub fn get_known_categories_async(&self, subscriber: &Arc<dyn TraceSubscriber>) -> Result<()> {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if state.session.phase != Phase::Idle || !state.session.claimable_by(subscriber) {
                debug!(target: "trace.controller", phase = ?state.session.phase, "category discovery rejected");
                return Err(Error::InvalidState("category discovery requires an idle session"));
            }
            let generation = state.session.begin_phase(Phase::CategoryDiscovery);
            state.session.owner = Some(Arc::clone(subscriber));
            state.session.known_categories.clear();
            state.session.pending = state.registry.ids().collect();
            if state.session.pending.is_empty() {
                finish_counted_phase(&mut state.session, &mut notifications);
            } else {
                for endpoint in state.registry.endpoints() {
                    endpoint.request_known_categories(generation);
                }
            }
        }
        deliver(notifications);
        Ok(())
    }

    /// Starts recording on every registered endpoint.
    ///
    /// Tracing is active the moment this returns; endpoints start recording
    /// on command receipt and no acknowledgment is awaited. Rejected with
    /// [`Error::InvalidFilter`] when `filter` names both an inclusion and an
    /// exclusion set.
    pub fn begin_tracing(
        &self,
        subscriber: &Arc<dyn TraceSubscriber>,
        filter: CategoryFilter,
    ) -> Result<()> {
        if !filter.is_valid() {
            debug!(target: "trace.controller", %filter, "begin tracing rejected: ambiguous filter");
            return Err(Error::InvalidFilter);
        }
        let mut state = self.state.lock();
        if !state.session.can_begin_tracing(subscriber) {
            debug!(target: "trace.controller", phase = ?state.session.phase, "begin tracing rejected");
            return Err(Error::InvalidState(
                "a session is already active or owned by another subscriber",
            ));
        }
        info!(target: "trace.controller", %filter, endpoints = state.registry.count(), "tracing started");
        begin_recording(&mut state, Some(Arc::clone(subscriber)), filter);
        Ok(())
    }

    /// Stops the running session.
    ///
    /// Completion arrives through [`TraceSubscriber::on_end_tracing_complete`]
    /// once every endpoint counted here has acknowledged or disconnected;
    /// with no endpoints registered it fires before this call returns.
    /// Rejected while a buffer query is still in flight.
    pub fn end_tracing_async(&self, subscriber: &Arc<dyn TraceSubscriber>) -> Result<()> {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.session.can_end_tracing(subscriber) {
                debug!(target: "trace.controller", phase = ?state.session.phase, "end tracing rejected");
                return Err(Error::InvalidState(
                    "no tracing session to end, a buffer query is in flight, or another subscriber owns it",
                ));
            }
            // Startup tracing runs ownerless; whoever ends it owns the result.
            state.session.owner = Some(Arc::clone(subscriber));
            info!(target: "trace.controller", endpoints = state.registry.count(), "ending tracing");
            begin_ending(&mut state, &mut notifications);
        }
        deliver(notifications);
        Ok(())
    }

    /// Asks every endpoint how full its trace buffer is.
    ///
    /// Recording continues while the query runs. The maximum across replies
    /// arrives through [`TraceSubscriber::on_trace_buffer_percent_full_reply`];
    /// with no endpoints registered it fires before this call returns,
    /// reporting zero. Only one query may be in flight at a time.
    pub fn get_buffer_percent_full_async(
        &self,
        subscriber: &Arc<dyn TraceSubscriber>,
    ) -> Result<()> {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.session.can_get_buffer_percent_full(subscriber) {
                debug!(target: "trace.controller", phase = ?state.session.phase, "buffer query rejected");
                return Err(Error::InvalidState(
                    "buffer queries require an owned tracing session with none in flight",
                ));
            }
            state.session.owner = Some(Arc::clone(subscriber));
            let generation = state.session.fresh_generation();
            let pending: HashSet<EndpointId> = state.registry.ids().collect();
            let drained = pending.is_empty();
            state.session.buffer_query = Some(BufferQuery {
                generation,
                pending,
                maximum: 0.0,
            });
            if drained {
                finish_buffer_query(&mut state.session, &mut notifications);
            } else {
                for endpoint in state.registry.endpoints() {
                    endpoint.request_buffer_percent_full(generation);
                }
            }
        }
        deliver(notifications);
        Ok(())
    }

    /// Tears down the session owned by `subscriber`, regardless of phase.
    ///
    /// In-flight acknowledgment tallies are discarded and no completion
    /// notification fires for them; replies already on the way become stale.
    /// Used for abnormal teardown, e.g. when a subscriber is dropped.
    pub fn cancel_subscriber(&self, subscriber: &Arc<dyn TraceSubscriber>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.session.owned_by(subscriber) {
            debug!(target: "trace.controller", "cancel rejected: not the owning subscriber");
            return Err(Error::InvalidState("subscriber does not own the session"));
        }
        let was_recording = state.session.phase == Phase::Tracing;
        state.session.reset();
        info!(target: "trace.controller", "subscriber cancelled, session reset");
        if was_recording {
            // Workers would otherwise keep recording into a session nobody
            // owns. Their acks are already stale under the reset generation.
            let generation = state.session.fresh_generation();
            for endpoint in state.registry.endpoints() {
                endpoint.end_tracing(generation);
            }
        }
        Ok(())
    }

    /// Thread-safe reply entry point; transport glue calls this from any
    /// task or thread.
    ///
    /// Stale, duplicate, and unknown replies are absorbed here and never
    /// reach the subscriber.
    pub fn on_reply(&self, id: EndpointId, reply: TraceReply) {
        match reply {
            TraceReply::KnownCategories {
                generation,
                categories,
            } => self.on_known_categories(id, generation, categories),
            TraceReply::EndTracingAck {
                generation,
                categories,
            } => self.on_end_tracing_ack(id, generation, categories),
            TraceReply::BufferPercentFull {
                generation,
                percent,
            } => self.on_buffer_percent_full(id, generation, percent),
            TraceReply::BufferFull => self.on_buffer_full(id),
            TraceReply::TraceData { chunk } => self.on_trace_data(id, chunk),
        }
    }

    fn on_known_categories(&self, id: EndpointId, generation: u64, categories: BTreeSet<String>) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            let session = &mut state.session;
            if session.phase != Phase::CategoryDiscovery
                || generation != session.generation
                || !session.pending.remove(&id)
            {
                debug!(target: "trace.controller", %id, generation, "stale categories reply dropped");
                return;
            }
            session.known_categories.extend(categories);
            if session.pending.is_empty() {
                finish_counted_phase(session, &mut notifications);
            }
        }
        deliver(notifications);
    }

    fn on_end_tracing_ack(&self, id: EndpointId, generation: u64, categories: BTreeSet<String>) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            let session = &mut state.session;
            if session.phase != Phase::Ending
                || generation != session.generation
                || !session.pending.remove(&id)
            {
                debug!(target: "trace.controller", %id, generation, "stale end-tracing ack dropped");
                return;
            }
            session.known_categories.extend(categories);
            if session.pending.is_empty() {
                finish_counted_phase(session, &mut notifications);
            }
        }
        deliver(notifications);
    }

    fn on_buffer_percent_full(&self, id: EndpointId, generation: u64, percent: f32) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            let session = &mut state.session;
            let drained = match session.buffer_query.as_mut() {
                Some(query) if query.generation == generation && query.pending.contains(&id) => {
                    query.pending.remove(&id);
                    query.maximum = query.maximum.max(percent);
                    query.pending.is_empty()
                }
                _ => {
                    debug!(target: "trace.controller", %id, generation, percent, "stale buffer fullness reply dropped");
                    return;
                }
            };
            if drained {
                finish_buffer_query(session, &mut notifications);
            }
        }
        deliver(notifications);
    }

    /// An endpoint ran out of buffer space; nothing further it records can
    /// be kept, so the whole session is ended on the owner's behalf.
    fn on_buffer_full(&self, id: EndpointId) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if state.session.phase != Phase::Tracing {
                debug!(target: "trace.controller", %id, "buffer-full notice outside tracing dropped");
                return;
            }
            info!(target: "trace.controller", %id, "endpoint buffer full, ending session");
            if state.session.buffer_query.take().is_some() {
                debug!(target: "trace.controller", "in-flight buffer query discarded");
            }
            begin_ending(&mut state, &mut notifications);
        }
        deliver(notifications);
    }

    fn on_trace_data(&self, id: EndpointId, chunk: Vec<u8>) {
        let owner = {
            let state = self.state.lock();
            match state.session.phase {
                Phase::Tracing | Phase::Ending => state.session.owner.clone(),
                Phase::Idle | Phase::CategoryDiscovery => None,
            }
        };
        match owner {
            Some(owner) => owner.on_trace_data_collected(chunk),
            None => {
                debug!(target: "trace.controller", %id, bytes = chunk.len(), "trace data with no session owner dropped");
            }
        }
    }

    pub(crate) fn register_endpoint(&self, endpoint: Arc<dyn TraceEndpoint>) -> EndpointId {
        let id = EndpointId(self.next_endpoint_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        state.registry.insert(id, Arc::clone(&endpoint));
        debug!(target: "trace.registry", %id, endpoints = state.registry.count(), "endpoint registered");
        // A late joiner never enters an in-flight tally; it participates in
        // future phases only. Active recording still applies to it.
        if state.session.phase == Phase::Tracing {
            endpoint.begin_tracing(state.session.generation, state.session.filter.clone());
        }
        id
    }

    pub(crate) fn unregister_endpoint(&self, id: EndpointId) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if state.registry.remove(id).is_none() {
                debug!(target: "trace.registry", %id, "unregister of unknown endpoint ignored");
                return;
            }
            debug!(target: "trace.registry", %id, endpoints = state.registry.count(), "endpoint unregistered");
            // The endpoint will never send the acknowledgment it owes; its
            // removal counts as one so it cannot block phase completion.
            if state.session.pending.remove(&id) {
                debug!(target: "trace.controller", %id, phase = ?state.session.phase, "implicit ack from disconnect");
                if state.session.pending.is_empty() {
                    finish_counted_phase(&mut state.session, &mut notifications);
                }
            }
            let query_drained = state
                .session
                .buffer_query
                .as_mut()
                .map(|query| query.pending.remove(&id) && query.pending.is_empty())
                .unwrap_or(false);
            if query_drained {
                finish_buffer_query(&mut state.session, &mut notifications);
            }
        }
        deliver(notifications);
    }
}

impl Default for TraceController {
    fn default() -> Self {
        Self::new()
    }
}

/// Enters the tracing phase and broadcasts the begin command. Caller holds
/// the lock and has already validated the guard and the filter.
fn begin_recording(
    state: &mut ControlState,
    owner: Option<Arc<dyn TraceSubscriber>>,
    filter: CategoryFilter,
) {
    let generation = state.session.begin_phase(Phase::Tracing);
    state.session.owner = owner;
    state.session.filter = filter.clone();
    for endpoint in state.registry.endpoints() {
        endpoint.begin_tracing(generation, filter.clone());
    }
}

/// Enters the ending phase, counting the currently registered endpoints, and
/// broadcasts the stop command; completes on the spot when none are
/// registered. Caller holds the lock.
fn begin_ending(state: &mut ControlState, out: &mut Vec<Notification>) {
    let generation = state.session.begin_phase(Phase::Ending);
    state.session.pending = state.registry.ids().collect();
    if state.session.pending.is_empty() {
        finish_counted_phase(&mut state.session, out);
    } else {
        for endpoint in state.registry.endpoints() {
            endpoint.end_tracing(generation);
        }
    }
}

/// Completes a counted phase (discovery or ending) once its pending set has
/// drained. Caller holds the lock.
fn finish_counted_phase(session: &mut SessionState, out: &mut Vec<Notification>) {
    match session.phase {
        Phase::CategoryDiscovery => {
            let categories = session.known_categories.clone();
            let owner = session.owner.take();
            session.reset();
            info!(target: "trace.controller", categories = categories.len(), "category discovery complete");
            if let Some(owner) = owner {
                out.push(Notification::KnownCategories(owner, categories));
            }
        }
        Phase::Ending => {
            let categories = session.known_categories.clone();
            let owner = session.owner.take();
            session.reset();
            info!(target: "trace.controller", categories = categories.len(), "tracing ended");
            if let Some(owner) = owner {
                out.push(Notification::EndTracingComplete(owner, categories));
            }
        }
        Phase::Idle | Phase::Tracing => {}
    }
}

fn finish_buffer_query(session: &mut SessionState, out: &mut Vec<Notification>) {
    if let Some(query) = session.buffer_query.take() {
        debug!(target: "trace.controller", maximum = query.maximum, "buffer query complete");
        if let Some(owner) = session.owner.clone() {
            out.push(Notification::BufferPercentFull(owner, query.maximum));
        }
    }
}

fn deliver(notifications: Vec<Notification>) {
    for notification in notifications {
        notification.deliver();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_endpoint::FakeEndpointBuilder;
    use tracehub_protocol::TraceCommand;

    #[derive(Default)]
    struct CountingSubscriber {
        known: Mutex<Vec<BTreeSet<String>>>,
        ended: Mutex<Vec<BTreeSet<String>>>,
    }

    impl TraceSubscriber for CountingSubscriber {
        fn on_known_categories_collected(&self, categories: BTreeSet<String>) {
            self.known.lock().push(categories);
        }
        fn on_end_tracing_complete(&self, categories: BTreeSet<String>) {
            self.ended.lock().push(categories);
        }
        fn on_trace_buffer_percent_full_reply(&self, _: f32) {}
        fn on_trace_data_collected(&self, _: Vec<u8>) {}
    }

    fn subscriber() -> (Arc<CountingSubscriber>, Arc<dyn TraceSubscriber>) {
        let concrete = Arc::new(CountingSubscriber::default());
        let erased: Arc<dyn TraceSubscriber> = concrete.clone();
        (concrete, erased)
    }

    #[test]
    fn ambiguous_filter_rejected_without_mutation() {
        let controller = Arc::new(TraceController::new());
        let registrar = controller.registrar();
        let (endpoint, handle) = FakeEndpointBuilder::new().build();
        registrar.register(endpoint);

        let (_, sub) = subscriber();
        let filter = CategoryFilter::parse("net,-gpu");
        assert_eq!(
            controller.begin_tracing(&sub, filter),
            Err(Error::InvalidFilter)
        );
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(handle.take_sent().is_empty());
    }

    #[test]
    fn discovery_with_no_endpoints_completes_before_returning() {
        let controller = TraceController::new();
        let (concrete, sub) = subscriber();

        controller.get_known_categories_async(&sub).unwrap();
        assert_eq!(controller.phase(), Phase::Idle);
        let collected = concrete.known.lock();
        assert_eq!(collected.as_slice(), &[BTreeSet::new()]);
    }

    #[test]
    fn foreign_subscriber_cannot_control_owned_session() {
        let controller = TraceController::new();
        let (_, owner) = subscriber();
        let (_, other) = subscriber();

        controller
            .begin_tracing(&owner, CategoryFilter::all())
            .unwrap();
        assert!(controller.begin_tracing(&other, CategoryFilter::all()).is_err());
        assert!(controller.end_tracing_async(&other).is_err());
        assert!(controller.cancel_subscriber(&other).is_err());
        assert!(controller.end_tracing_async(&owner).is_ok());
    }

    #[test]
    fn late_registration_during_tracing_receives_begin_command() {
        let controller = Arc::new(TraceController::new());
        let registrar = controller.registrar();
        let (_, sub) = subscriber();
        let filter = CategoryFilter::include(["net"]);
        controller.begin_tracing(&sub, filter.clone()).unwrap();

        let (endpoint, handle) = FakeEndpointBuilder::new().build();
        registrar.register(endpoint);
        match handle.take_sent().as_slice() {
            [TraceCommand::BeginTracing { filter: sent, .. }] => assert_eq!(sent, &filter),
            other => panic!("expected catch-up begin command, got {other:?}"),
        }
    }
}
