// SPDX-License-Identifier: GPL-3.0-only
use parking_lot::Mutex;
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{Result, WatchError};
use crate::event::{Event, EventFlags};
use crate::logging::setup_logging;
use crate::stream::{NativeSource, NativeSubscription, RawEvent, RawSink, SubscribeRequest};

/// Upper bound on how long a test waits for a batch.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install the tracing subscriber once, keeping test output quiet
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = setup_logging("error");
    });
}

/// Receive the next batch or fail the test after [`EVENT_TIMEOUT`]
pub async fn recv_batch(events: &mut mpsc::Receiver<Vec<Event>>) -> Vec<Event> {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("Timed out waiting for events")
        .expect("Event stream closed")
}

/// Native source driven by hand, so delivery can be tested without a kernel.
#[derive(Clone, Default)]
pub struct ManualSource {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    sinks: Vec<RawSink>,
    requests: Vec<SubscribeRequest>,
    subscriptions: usize,
    closed: usize,
    fail_next: Option<String>,
}

struct ManualSubscription {
    inner: Arc<Mutex<ManualState>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate one native callback carrying a single event. Returns false
    /// when no live subscription accepted it.
    pub fn emit(&self, path: impl AsRef<Path>, flags: EventFlags) -> bool {
        let sinks = self.inner.lock().sinks.clone();
        let event = RawEvent::new(path.as_ref(), flags);
        sinks
            .iter()
            .fold(false, |accepted, sink| sink.send(vec![event.clone()]) || accepted)
    }

    /// Make the next `subscribe` call fail with `message`
    pub fn fail_next(&self, message: &str) {
        self.inner.lock().fail_next = Some(message.to_string());
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions
    }

    pub fn closed_count(&self) -> usize {
        self.inner.lock().closed
    }

    pub fn last_request(&self) -> Option<SubscribeRequest> {
        self.inner.lock().requests.last().cloned()
    }
}

impl NativeSource for ManualSource {
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        sink: RawSink,
    ) -> Result<Box<dyn NativeSubscription>> {
        let mut state = self.inner.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(WatchError::Subscription {
                path: request.roots.first().cloned().unwrap_or_default(),
                source: notify::Error::generic(&message),
            });
        }
        state.sinks.push(sink);
        state.requests.push(request.clone());
        state.subscriptions += 1;
        Ok(Box::new(ManualSubscription {
            inner: Arc::clone(&self.inner),
        }))
    }
}

impl NativeSubscription for ManualSubscription {
    fn close(self: Box<Self>) {
        let mut state = self.inner.lock();
        state.sinks.clear();
        state.closed += 1;
    }
}
