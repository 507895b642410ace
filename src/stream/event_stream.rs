// SPDX-License-Identifier: GPL-3.0-only
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::device::{DeviceId, device_for_path};
use crate::error::{Result, WatchError};
use crate::event::{CreateFlags, Event, EventId};
use crate::stream::clock::{self, EventIdClock};
use crate::stream::delivery::{Control, Delivery, Outlet};
use crate::stream::native::NotifySource;
use crate::stream::traits::{NativeSource, NativeSubscription, RawSink, SubscribeRequest};
use crate::stream::translate::RootMap;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Watches a set of paths and delivers batches of [`Event`]s.
///
/// A stream is inert until [`start`](Self::start), which returns the
/// receiving end of a bounded channel. Every batch is one coalescing window's
/// worth of native callbacks, in native order.
///
/// The channel is the backpressure boundary: delivery never waits for the
/// consumer. When the channel is full the batch is dropped, and the next batch
/// that fits starts with a `MUST_SCAN_SUB_DIRS | USER_DROPPED` note for every
/// root. Consumers that cannot keep up should rescan when they see it.
///
/// [`stop`](Self::stop) may be called any number of times, from any thread,
/// including from the task consuming this stream's events.
pub struct EventStream {
    paths: Vec<PathBuf>,
    latency: Duration,
    device: Option<DeviceId>,
    flags: CreateFlags,
    channel_capacity: usize,
    source: Arc<dyn NativeSource>,
    clock: Option<Arc<EventIdClock>>,
    state: Mutex<Lifecycle>,
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    outlet: Outlet,
    control_tx: Sender<Control>,
    subscription: Box<dyn NativeSubscription>,
    thread: JoinHandle<()>,
    clock: Arc<EventIdClock>,
}

impl EventStream {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            latency: Duration::ZERO,
            device: None,
            flags: CreateFlags::empty(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            source: Arc::new(NotifySource::new()),
            clock: None,
            state: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Build a stream from configuration, bound to the device of its first path.
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        let first = config.paths.first().ok_or(WatchError::NoPaths)?;
        let device = device_for_path(first)?;
        Ok(Self::new(config.paths.iter().cloned())
            .with_latency(config.latency())
            .with_device(device)
            .with_flags(config.create_flags())
            .with_channel_capacity(config.channel_capacity))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Only accept paths residing on `device`.
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_flags(mut self, flags: CreateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Replace the native notification backend.
    pub fn with_source(mut self, source: Arc<dyn NativeSource>) -> Self {
        self.source = source;
        self
    }

    /// Use a dedicated id clock instead of the process-wide one.
    pub fn with_clock(mut self, clock: Arc<EventIdClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn flags(&self) -> CreateFlags {
        self.flags
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), Lifecycle::Running(_))
    }

    /// Begin watching. Starting a running stream is a caller error and
    /// returns [`WatchError::AlreadyRunning`] without touching it.
    ///
    /// On failure nothing is left registered and the stream stays inert.
    pub fn start(&self) -> Result<mpsc::Receiver<Vec<Event>>> {
        let mut state = self.state.lock();
        if matches!(*state, Lifecycle::Running(_)) {
            return Err(WatchError::AlreadyRunning);
        }
        if self.paths.is_empty() {
            return Err(WatchError::NoPaths);
        }

        let roots = self.resolve_roots()?;
        let (raw_tx, raw_rx) = crossbeam_channel::unbounded();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let request = SubscribeRequest {
            roots: roots.clone(),
            watch_root: self.flags.contains(CreateFlags::WATCH_ROOT),
        };
        let subscription = self.source.subscribe(&request, RawSink::new(raw_tx))?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let outlet: Outlet = Arc::new(Mutex::new(Some(tx)));
        let clock = self.clock.clone().unwrap_or_else(EventIdClock::shared);
        let delivery = Delivery::new(
            raw_rx,
            control_rx,
            Arc::clone(&outlet),
            self.latency,
            self.flags,
            RootMap::new(&roots),
            Arc::clone(&clock),
        );
        let thread = match thread::Builder::new()
            .name("fsevents-delivery".to_string())
            .spawn(move || delivery.run())
        {
            Ok(thread) => thread,
            Err(e) => {
                subscription.close();
                return Err(WatchError::Spawn(e));
            }
        };

        info!(
            paths = ?roots,
            latency_ms = self.latency.as_millis() as u64,
            flags = ?self.flags,
            "Started event stream"
        );
        *state = Lifecycle::Running(Running {
            outlet,
            control_tx,
            subscription,
            thread,
            clock,
        });
        Ok(rx)
    }

    /// Stop watching and release the native subscription.
    ///
    /// Once this returns no further batches are sent; the receiver yields
    /// what was already queued and then `None`.
    pub fn stop(&self) {
        let running = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, Lifecycle::Stopped) {
                Lifecycle::Running(running) => {
                    running.outlet.lock().take();
                    running
                }
                other => {
                    *state = other;
                    return;
                }
            }
        };

        let _ = running.control_tx.send(Control::Shutdown);
        running.subscription.close();
        if running.thread.thread().id() != thread::current().id()
            && running.thread.join().is_err()
        {
            warn!("Delivery thread panicked");
        }
        info!(paths = ?self.paths, "Stopped event stream");
    }

    /// Stop, then start again with the same configuration.
    pub fn restart(&self) -> Result<mpsc::Receiver<Vec<Event>>> {
        self.stop();
        self.start()
    }

    /// Deliver pending events without waiting for the latency window.
    pub fn flush(&self) {
        if let Some(control_tx) = self.control() {
            let _ = control_tx.send(Control::Flush(None));
        }
    }

    /// Like [`flush`](Self::flush), but returns only after the pending batch
    /// has been handed to the channel (or dropped, if it is full).
    pub fn flush_sync(&self) {
        let Some(control_tx) = self.control() else {
            return;
        };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if control_tx.send(Control::Flush(Some(ack_tx))).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Most recent event id issued by this stream's clock.
    pub fn latest_event_id(&self) -> EventId {
        match (&*self.state.lock(), &self.clock) {
            (Lifecycle::Running(running), _) => running.clock.current(),
            (_, Some(clock)) => clock.current(),
            (_, None) => clock::latest_event_id(),
        }
    }

    fn control(&self) -> Option<Sender<Control>> {
        match &*self.state.lock() {
            Lifecycle::Running(running) => Some(running.control_tx.clone()),
            _ => None,
        }
    }

    fn resolve_roots(&self) -> Result<Vec<PathBuf>> {
        let mut roots = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let found = device_for_path(path)?;
            if let Some(expected) = self.device {
                if found != expected {
                    return Err(WatchError::DeviceMismatch {
                        path: path.clone(),
                        expected,
                        found,
                    });
                }
            }
            roots.push(absolutize(path)?);
        }
        debug!(roots = ?roots, "Resolved watch roots");
        Ok(roots)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|source| WatchError::DeviceResolution {
            path: path.to_path_buf(),
            source,
        })
}
