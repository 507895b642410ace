// SPDX-License-Identifier: GPL-3.0-only
use crossbeam_channel::{Receiver, Sender, select};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use crate::event::{CreateFlags, Event, EventFlags};
use crate::stream::clock::EventIdClock;
use crate::stream::traits::RawEvent;
use crate::stream::translate::RootMap;

/// Sending half of a stream's output, emptied by `stop`. Delivery only sends
/// while holding this lock, so nothing is sent once it is `None`.
pub(crate) type Outlet = Arc<Mutex<Option<mpsc::Sender<Vec<Event>>>>>;

pub(crate) enum Control {
    /// Deliver whatever is pending now; acknowledge once handed off.
    Flush(Option<Sender<()>>),
    Shutdown,
}

enum Wake {
    Raw(Vec<RawEvent>),
    Flush(Option<Sender<()>>),
    Stop,
}

enum WindowEnd {
    Elapsed,
    Flushed(Option<Sender<()>>),
    Closed,
}

/// Per-stream background loop: coalesces native callbacks over the latency
/// window and pushes the resulting batches to the outlet.
pub(crate) struct Delivery {
    raw_rx: Receiver<Vec<RawEvent>>,
    control_rx: Receiver<Control>,
    outlet: Outlet,
    latency: Duration,
    flags: CreateFlags,
    roots: RootMap,
    clock: Arc<EventIdClock>,
    epoch: Option<u64>,
    dropped: bool,
    last_delivery: Option<Instant>,
}

impl Delivery {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        raw_rx: Receiver<Vec<RawEvent>>,
        control_rx: Receiver<Control>,
        outlet: Outlet,
        latency: Duration,
        flags: CreateFlags,
        roots: RootMap,
        clock: Arc<EventIdClock>,
    ) -> Self {
        Self {
            raw_rx,
            control_rx,
            outlet,
            latency,
            flags,
            roots,
            clock,
            epoch: None,
            dropped: false,
            last_delivery: None,
        }
    }

    pub(crate) fn run(mut self) {
        debug!(latency_ms = self.latency.as_millis() as u64, "Delivery loop started");
        loop {
            let mut pending = match self.wait_idle() {
                Wake::Raw(events) => events,
                Wake::Flush(ack) => {
                    let pending = self.drain_raw();
                    self.deliver(pending);
                    acknowledge(ack);
                    continue;
                }
                Wake::Stop => break,
            };

            let quiet = self
                .last_delivery
                .is_none_or(|at| at.elapsed() >= self.latency);
            if self.flags.contains(CreateFlags::NO_DEFER) && quiet {
                self.deliver(pending);
                continue;
            }

            match self.collect_window(&mut pending) {
                WindowEnd::Elapsed => self.deliver(pending),
                WindowEnd::Flushed(ack) => {
                    self.deliver(pending);
                    acknowledge(ack);
                }
                WindowEnd::Closed => break,
            }
        }
        debug!("Delivery loop exited");
    }

    fn wait_idle(&self) -> Wake {
        select! {
            recv(self.raw_rx) -> msg => match msg {
                Ok(events) => Wake::Raw(events),
                Err(_) => Wake::Stop,
            },
            recv(self.control_rx) -> msg => match msg {
                Ok(Control::Flush(ack)) => Wake::Flush(ack),
                Ok(Control::Shutdown) | Err(_) => Wake::Stop,
            },
        }
    }

    fn collect_window(&self, pending: &mut Vec<RawEvent>) -> WindowEnd {
        let deadline = Instant::now() + self.latency;
        loop {
            select! {
                recv(self.raw_rx) -> msg => match msg {
                    Ok(events) => pending.extend(events),
                    Err(_) => return WindowEnd::Closed,
                },
                recv(self.control_rx) -> msg => match msg {
                    Ok(Control::Flush(ack)) => {
                        pending.extend(self.drain_raw());
                        return WindowEnd::Flushed(ack);
                    }
                    Ok(Control::Shutdown) | Err(_) => return WindowEnd::Closed,
                },
                recv(crossbeam_channel::at(deadline)) -> _ => return WindowEnd::Elapsed,
            }
        }
    }

    /// Everything already queued by native callbacks.
    fn drain_raw(&self) -> Vec<RawEvent> {
        self.raw_rx.try_iter().flatten().collect()
    }

    fn deliver(&mut self, raw: Vec<RawEvent>) {
        let mut shaped: Vec<(PathBuf, EventFlags)> = Vec::with_capacity(raw.len() + 1);
        if self.dropped {
            for root in self.roots.roots() {
                shaped.push((
                    root.to_path_buf(),
                    EventFlags::MUST_SCAN_SUB_DIRS | EventFlags::USER_DROPPED,
                ));
            }
        }
        for event in raw {
            let entry = self.shape(event);
            if !self.flags.contains(CreateFlags::FILE_EVENTS) && shaped.contains(&entry) {
                continue;
            }
            shaped.push(entry);
        }
        if shaped.is_empty() {
            return;
        }

        let batch: Vec<Event> = shaped
            .into_iter()
            .map(|(path, mut flags)| {
                let stamp = self.clock.next();
                if self.epoch.is_some_and(|epoch| epoch != stamp.epoch) {
                    flags |= EventFlags::EVENT_IDS_WRAPPED;
                }
                self.epoch = Some(stamp.epoch);
                Event::new(stamp.id, path, flags)
            })
            .collect();

        let outlet = self.outlet.lock();
        let Some(tx) = outlet.as_ref() else {
            trace!("Stream stopped, discarding batch");
            return;
        };
        let size = batch.len();
        match tx.try_send(batch) {
            Ok(()) => {
                trace!(events = size, "Delivered batch");
                self.dropped = false;
                self.last_delivery = Some(Instant::now());
            }
            Err(TrySendError::Full(_)) => {
                warn!(events = size, "Output channel full, dropping batch");
                self.dropped = true;
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Receiver dropped, discarding batch");
            }
        }
    }

    fn shape(&self, event: RawEvent) -> (PathBuf, EventFlags) {
        let path = self.roots.rewrite(event.path);
        if self.flags.contains(CreateFlags::FILE_EVENTS) || event.flags.is_note() {
            return (path, event.flags);
        }
        // Directory granularity: report the directory whose contents changed.
        let dir = match path.parent() {
            Some(parent) if !self.roots.is_root(&path) => parent.to_path_buf(),
            _ => path,
        };
        (dir, event.flags.notes())
    }
}

fn acknowledge(ack: Option<Sender<()>>) {
    if let Some(ack) = ack {
        let _ = ack.send(());
    }
}
