//! Session state machine.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracehub_protocol::CategoryFilter;

use crate::endpoint::EndpointId;
use crate::subscriber::TraceSubscriber;

/// Stage of the session lifecycle.
///
/// Buffer fullness queries are not a phase of their own: they run alongside
/// `Tracing` without suspending it (see [`BufferQuery`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CategoryDiscovery,
    Tracing,
    Ending,
}

/// In-flight buffer fullness query.
///
/// Carries its own generation and pending set so recording continues
/// undisturbed while endpoints report.
#[derive(Debug)]
pub(crate) struct BufferQuery {
    pub(crate) generation: u64,
    pub(crate) pending: HashSet<EndpointId>,
    pub(crate) maximum: f32,
}

/// The single process-wide session, mutated only under the controller lock.
pub(crate) struct SessionState {
    pub(crate) phase: Phase,
    /// Generation of the current phase. Commands carry it and replies echo
    /// it back, so an acknowledgment addressed to an abandoned phase can
    /// never be mistaken for one addressed to the current phase.
    pub(crate) generation: u64,
    /// Monotone source for generation values; also feeds buffer queries and
    /// resets so no two phases ever share a generation.
    counter: u64,
    pub(crate) owner: Option<Arc<dyn TraceSubscriber>>,
    pub(crate) filter: CategoryFilter,
    /// Categories reported by any endpoint, accumulated across the
    /// process lifetime. Cleared when a discovery phase starts.
    pub(crate) known_categories: BTreeSet<String>,
    /// Endpoints counted at phase start that have not acknowledged yet.
    /// Used by the counted phases (discovery and ending); membership doubles
    /// as the per-endpoint dedup marking.
    pub(crate) pending: HashSet<EndpointId>,
    pub(crate) buffer_query: Option<BufferQuery>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            counter: 0,
            owner: None,
            filter: CategoryFilter::all(),
            known_categories: BTreeSet::new(),
            pending: HashSet::new(),
            buffer_query: None,
        }
    }

    /// Enters `phase` under a fresh generation and returns it.
    pub(crate) fn begin_phase(&mut self, phase: Phase) -> u64 {
        self.counter += 1;
        self.generation = self.counter;
        self.phase = phase;
        self.generation
    }

    /// Fresh generation that does not displace the current phase's, for
    /// buffer queries and cancellation stop commands.
    pub(crate) fn fresh_generation(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    pub(crate) fn owned_by(&self, subscriber: &Arc<dyn TraceSubscriber>) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| Arc::ptr_eq(owner, subscriber))
    }

    /// Whether `subscriber` may control the active session: either no owner
    /// exists yet (startup tracing runs ownerless until claimed) or the
    /// owner is this subscriber.
    pub(crate) fn claimable_by(&self, subscriber: &Arc<dyn TraceSubscriber>) -> bool {
        match &self.owner {
            None => true,
            Some(owner) => Arc::ptr_eq(owner, subscriber),
        }
    }

    pub(crate) fn can_begin_tracing(&self, subscriber: &Arc<dyn TraceSubscriber>) -> bool {
        self.phase == Phase::Idle && self.claimable_by(subscriber)
    }

    pub(crate) fn can_end_tracing(&self, subscriber: &Arc<dyn TraceSubscriber>) -> bool {
        self.phase == Phase::Tracing && self.buffer_query.is_none() && self.claimable_by(subscriber)
    }

    pub(crate) fn can_get_buffer_percent_full(&self, subscriber: &Arc<dyn TraceSubscriber>) -> bool {
        self.phase == Phase::Tracing && self.buffer_query.is_none() && self.claimable_by(subscriber)
    }

    /// Resets to `Idle`, dropping owner, filter, tallies, and any buffer
    /// query. The generation moves on so replies addressed to the abandoned
    /// phase are recognizably stale. Known categories survive; they
    /// accumulate for the life of the process.
    pub(crate) fn reset(&mut self) {
        self.counter += 1;
        self.generation = self.counter;
        self.phase = Phase::Idle;
        self.owner = None;
        self.filter = CategoryFilter::all();
        self.pending.clear();
        self.buffer_query = None;
    }
}
