// SPDX-License-Identifier: GPL-3.0-only
use notify::event::ModifyKind;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WatchError};
use crate::event::EventFlags;
use crate::stream::traits::{NativeSource, NativeSubscription, RawEvent, RawSink, SubscribeRequest};
use crate::stream::translate::{RootMap, rescan_notes, translate};

/// The platform's recommended notification backend, through `notify`
/// (FSEvents on macOS, inotify on Linux, ReadDirectoryChangesW on Windows).
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl NotifySource {
    pub fn new() -> Self {
        Self
    }
}

pub struct NotifySubscription {
    watchers: Vec<RecommendedWatcher>,
}

impl NativeSource for NotifySource {
    fn subscribe(
        &self,
        request: &SubscribeRequest,
        sink: RawSink,
    ) -> Result<Box<dyn NativeSubscription>> {
        let mut watchers = Vec::with_capacity(2);

        let roots = request.roots.clone();
        let item_sink = sink.clone();
        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<notify::Event>| {
                Self::handle_item_event(&item_sink, &roots, event)
            },
            Config::default(),
        )
        .map_err(|source| subscription_error(&request.roots, source))?;

        for root in &request.roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::Subscription {
                    path: root.clone(),
                    source,
                })?;
            info!(path = %root.display(), "Subscribed to native events");
        }
        watchers.push(watcher);

        if request.watch_root {
            watchers.push(Self::watch_roots(request, sink)?);
        }

        Ok(Box::new(NotifySubscription { watchers }))
    }
}

impl NotifySource {
    fn handle_item_event(sink: &RawSink, roots: &[PathBuf], event: notify::Result<notify::Event>) {
        let raw = match event {
            Ok(event) => translate(&event, roots),
            Err(e) => {
                error!(error = %e, "Native watcher error");
                rescan_notes(&e.paths, roots)
            }
        };
        if !sink.send(raw) {
            debug!("Dropping native callback, stream no longer listening");
        }
    }

    /// Observe each root's parent so that replacing or deleting a root is
    /// reported even though the recursive watch on it is gone.
    fn watch_roots(request: &SubscribeRequest, sink: RawSink) -> Result<RecommendedWatcher> {
        let root_map = RootMap::new(&request.roots);
        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<notify::Event>| {
                let Ok(event) = event else {
                    return;
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
                ) {
                    return;
                }
                let notes: Vec<RawEvent> = event
                    .paths
                    .iter()
                    .filter(|path| root_map.is_root(path))
                    .map(|path| RawEvent::new(root_map.rewrite(path.clone()), EventFlags::ROOT_CHANGED))
                    .collect();
                sink.send(notes);
            },
            Config::default(),
        )
        .map_err(|source| subscription_error(&request.roots, source))?;

        for root in &request.roots {
            let Some(parent) = root.parent() else {
                warn!(path = %root.display(), "Root has no parent, root changes will not be reported");
                continue;
            };
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Subscription {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        Ok(watcher)
    }
}

impl NativeSubscription for NotifySubscription {
    fn close(self: Box<Self>) {
        // Dropping a notify watcher unregisters it and stops its event loop.
        let count = self.watchers.len();
        drop(self.watchers);
        debug!(watchers = count, "Released native subscription");
    }
}

fn subscription_error(roots: &[PathBuf], source: notify::Error) -> WatchError {
    WatchError::Subscription {
        path: roots.first().cloned().unwrap_or_default(),
        source,
    }
}
