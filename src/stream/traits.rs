// SPDX-License-Identifier: GPL-3.0-only
use crossbeam_channel::Sender;
use std::path::PathBuf;

use crate::error::Result;
use crate::event::EventFlags;

/// A change as reported by the native layer, before ids and granularity
/// are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub flags: EventFlags,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, flags: EventFlags) -> Self {
        Self {
            path: path.into(),
            flags,
        }
    }
}

/// What a stream asks the native layer to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Absolute roots, watched recursively.
    pub roots: Vec<PathBuf>,
    /// Also observe each root's parent and report `ROOT_CHANGED`.
    pub watch_root: bool,
}

/// Where native callbacks hand off their events. Never blocks.
#[derive(Debug, Clone)]
pub struct RawSink {
    tx: Sender<Vec<RawEvent>>,
}

impl RawSink {
    pub(crate) fn new(tx: Sender<Vec<RawEvent>>) -> Self {
        Self { tx }
    }

    /// Push the events of one native callback. Returns false once the stream
    /// has stopped listening.
    pub fn send(&self, events: Vec<RawEvent>) -> bool {
        if events.is_empty() {
            return true;
        }
        self.tx.send(events).is_ok()
    }
}

/// The operating system's notification subsystem.
pub trait NativeSource: Send + Sync {
    /// Register `request` and start pushing callbacks into `sink`.
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        sink: RawSink,
    ) -> Result<Box<dyn NativeSubscription>>;
}

/// A live native registration, exclusively owned by one stream.
pub trait NativeSubscription: Send {
    /// Release the native resources. Callbacks already in flight may still
    /// reach the sink.
    fn close(self: Box<Self>);
}
