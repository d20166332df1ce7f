//! Tracing session coordination across worker endpoints.
//!
//! One [`TraceController`] per process manages the lifecycle of a tracing
//! session spanning any number of independently executing workers. A single
//! [`TraceSubscriber`] owns each session; the transport layer registers one
//! [`TraceEndpoint`] per worker connection through the [`Registrar`]
//! capability and feeds worker replies back through
//! [`TraceController::on_reply`].
//!
//! Every control operation is fire-and-forget: it validates against the
//! current session state, broadcasts a command to the registered endpoints,
//! and returns. Completion reaches the subscriber once every endpoint
//! counted at phase start has acknowledged or disconnected.
//!
//! Wire types for commands and replies live in [`tracehub_protocol`],
//! re-exported as [`protocol`].

pub mod channel;
pub mod controller;
pub mod endpoint;
pub mod error;
pub mod fake_endpoint;
pub mod registry;
pub mod session;
pub mod startup;
pub mod subscriber;

pub use controller::TraceController;
pub use endpoint::{EndpointId, TraceEndpoint};
pub use error::{Error, Result};
pub use registry::Registrar;
pub use session::Phase;
pub use startup::StartupTraceConfig;
pub use subscriber::TraceSubscriber;

pub use tracehub_protocol as protocol;
