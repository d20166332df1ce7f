#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Once};

use parking_lot::Mutex;

use tracehub::TraceSubscriber;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Subscriber that records every notification for later assertions.
#[derive(Default)]
pub struct RecordingSubscriber {
    pub known: Mutex<Vec<BTreeSet<String>>>,
    pub ended: Mutex<Vec<BTreeSet<String>>>,
    pub buffer: Mutex<Vec<f32>>,
    pub data: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSubscriber {
    /// Returns the concrete handle for assertions and the erased handle to
    /// pass to the controller. Both point at the same allocation, which is
    /// what the controller's owner identity check requires.
    pub fn pair() -> (Arc<RecordingSubscriber>, Arc<dyn TraceSubscriber>) {
        let concrete = Arc::new(RecordingSubscriber::default());
        let erased: Arc<dyn TraceSubscriber> = concrete.clone();
        (concrete, erased)
    }
}

impl TraceSubscriber for RecordingSubscriber {
    fn on_known_categories_collected(&self, categories: BTreeSet<String>) {
        self.known.lock().push(categories);
    }

    fn on_end_tracing_complete(&self, categories: BTreeSet<String>) {
        self.ended.lock().push(categories);
    }

    fn on_trace_buffer_percent_full_reply(&self, percent: f32) {
        self.buffer.lock().push(percent);
    }

    fn on_trace_data_collected(&self, chunk: Vec<u8>) {
        self.data.lock().push(chunk);
    }
}

pub fn categories<const N: usize>(names: [&str; N]) -> BTreeSet<String> {
    names.iter().map(ToString::to_string).collect()
}
