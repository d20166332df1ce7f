//! Channel-backed endpoint for in-process workers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use tracehub_protocol::{TraceCommand, TraceReply};

use crate::controller::TraceController;
use crate::endpoint::{EndpointId, TraceEndpoint};

/// Endpoint that forwards commands over an unbounded channel.
///
/// The worker side drains the receiver returned by [`ChannelEndpoint::new`];
/// replies travel back through the sender made by [`reply_sender`], which
/// marshals them onto the controller from the worker's own task.
pub struct ChannelEndpoint {
    tx: mpsc::UnboundedSender<TraceCommand>,
}

impl ChannelEndpoint {
    /// Creates the endpoint and the worker-side command receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TraceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TraceEndpoint for ChannelEndpoint {
    fn send_command(&self, command: TraceCommand) {
        // A worker that hung up gets deregistered by the transport layer;
        // a failed send here is the window between the two.
        if self.tx.send(command).is_err() {
            debug!(target: "trace.registry", "command to disconnected worker dropped");
        }
    }
}

/// Spawns a pump that feeds one worker's replies into the controller.
///
/// Returns the sender handed to the worker side. The pump exits when every
/// sender is dropped.
pub fn reply_sender(
    controller: Arc<TraceController>,
    id: EndpointId,
) -> mpsc::UnboundedSender<TraceReply> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            controller.on_reply(id, reply);
        }
    });
    tx
}
