//! End-to-end flow through channel endpoints: commands out over mpsc,
//! replies pumped back from a worker task.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{RecordingSubscriber, categories, init_tracing};
use tracehub::channel::{ChannelEndpoint, reply_sender};
use tracehub::protocol::{CategoryFilter, TraceCommand, TraceReply};
use tracehub::{Phase, TraceController};

/// Spawns a worker that answers every command and streams one data chunk
/// while recording.
fn spawn_worker(
    controller: &Arc<TraceController>,
    known: BTreeSet<String>,
    buffer_percent: f32,
) {
    let (endpoint, mut commands) = ChannelEndpoint::new();
    let id = controller.registrar().register(Arc::new(endpoint));
    let replies = reply_sender(Arc::clone(controller), id);

    tokio::spawn(async move {
        let mut exercised = BTreeSet::new();
        while let Some(command) = commands.recv().await {
            let reply = match command {
                TraceCommand::BeginTracing { filter, .. } => {
                    exercised = known
                        .iter()
                        .filter(|category| filter.matches(category))
                        .cloned()
                        .collect();
                    TraceReply::TraceData {
                        chunk: b"chunk".to_vec(),
                    }
                }
                TraceCommand::EndTracing { generation } => TraceReply::EndTracingAck {
                    generation,
                    categories: exercised.clone(),
                },
                TraceCommand::GetKnownCategories { generation } => TraceReply::KnownCategories {
                    generation,
                    categories: known.clone(),
                },
                TraceCommand::GetBufferPercentFull { generation } => {
                    TraceReply::BufferPercentFull {
                        generation,
                        percent: buffer_percent,
                    }
                }
            };
            if replies.send(reply).is_err() {
                break;
            }
        }
    });
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn full_session_round_trip_over_channels() -> anyhow::Result<()> {
    init_tracing();
    let controller = Arc::new(TraceController::new());
    spawn_worker(&controller, categories(["net", "ui"]), 35.0);
    spawn_worker(&controller, categories(["gpu", "ui"]), 60.0);
    let (recording, subscriber) = RecordingSubscriber::pair();

    controller.get_known_categories_async(&subscriber)?;
    wait_until(|| !recording.known.lock().is_empty()).await;
    assert_eq!(
        recording.known.lock().as_slice(),
        &[categories(["gpu", "net", "ui"])]
    );
    assert_eq!(controller.phase(), Phase::Idle);

    controller.begin_tracing(&subscriber, CategoryFilter::include(["net", "gpu"]))?;
    wait_until(|| recording.data.lock().len() == 2).await;

    controller.get_buffer_percent_full_async(&subscriber)?;
    wait_until(|| !recording.buffer.lock().is_empty()).await;
    assert_eq!(recording.buffer.lock().as_slice(), &[60.0]);
    assert!(controller.is_tracing());

    controller.end_tracing_async(&subscriber)?;
    wait_until(|| !recording.ended.lock().is_empty()).await;
    assert_eq!(
        recording.ended.lock().as_slice(),
        &[categories(["gpu", "net"])]
    );
    assert_eq!(controller.phase(), Phase::Idle);
    Ok(())
}

#[tokio::test]
async fn worker_disconnect_mid_phase_does_not_block_completion() -> anyhow::Result<()> {
    init_tracing();
    let controller = Arc::new(TraceController::new());
    spawn_worker(&controller, categories(["net"]), 10.0);

    // A silent worker: registered, never drains its command channel.
    let (endpoint, commands) = ChannelEndpoint::new();
    let silent = controller.registrar().register(Arc::new(endpoint));

    let (recording, subscriber) = RecordingSubscriber::pair();
    controller.begin_tracing(&subscriber, CategoryFilter::all())?;
    controller.end_tracing_async(&subscriber)?;

    // Only the silent worker is still owed; dropping its connection counts
    // as the missing acknowledgment.
    controller.registrar().unregister(silent);
    drop(commands);

    wait_until(|| !recording.ended.lock().is_empty()).await;
    assert_eq!(recording.ended.lock().as_slice(), &[categories(["net"])]);
    Ok(())
}
