// SPDX-License-Identifier: GPL-3.0-only
use notify::event::{
    AccessKind, AccessMode, CreateKind, MetadataKind, ModifyKind, RemoveKind,
};
use notify::EventKind;
use std::path::{Path, PathBuf};

use crate::event::EventFlags;
use crate::stream::traits::RawEvent;

/// Map one `notify` event onto FSEvents-style raw events, one per path.
///
/// Rescan requests become `MUST_SCAN_SUB_DIRS | KERNEL_DROPPED` notes on the
/// affected paths, or on every root when the backend names none.
pub fn translate(event: &notify::Event, roots: &[PathBuf]) -> Vec<RawEvent> {
    if event.need_rescan() {
        return rescan_notes(&event.paths, roots);
    }

    let Some(change) = change_flags(&event.kind) else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .map(|path| RawEvent::new(path.clone(), change | item_type(&event.kind, path)))
        .collect()
}

/// Notes telling the consumer that events were lost below `paths`.
pub fn rescan_notes(paths: &[PathBuf], roots: &[PathBuf]) -> Vec<RawEvent> {
    let targets = if paths.is_empty() { roots } else { paths };
    targets
        .iter()
        .map(|path| {
            RawEvent::new(
                path.clone(),
                EventFlags::MUST_SCAN_SUB_DIRS | EventFlags::KERNEL_DROPPED,
            )
        })
        .collect()
}

fn change_flags(kind: &EventKind) -> Option<EventFlags> {
    match kind {
        EventKind::Create(_) => Some(EventFlags::ITEM_CREATED),
        EventKind::Remove(_) => Some(EventFlags::ITEM_REMOVED),
        EventKind::Modify(ModifyKind::Name(_)) => Some(EventFlags::ITEM_RENAMED),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::Ownership)) => {
            Some(EventFlags::ITEM_CHANGE_OWNER)
        }
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::Extended)) => {
            Some(EventFlags::ITEM_XATTR_MOD)
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(EventFlags::ITEM_INODE_META_MOD),
        EventKind::Modify(_) => Some(EventFlags::ITEM_MODIFIED),
        // A writer closing the file is the only access that implies a change.
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(EventFlags::ITEM_MODIFIED),
        EventKind::Access(_) => None,
        EventKind::Any => Some(EventFlags::ITEM_MODIFIED),
        EventKind::Other => None,
    }
}

fn item_type(kind: &EventKind, path: &Path) -> EventFlags {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            return EventFlags::ITEM_IS_SYMLINK;
        }
        if file_type.is_dir() {
            return EventFlags::ITEM_IS_DIR;
        }
        if file_type.is_file() {
            return EventFlags::ITEM_IS_FILE;
        }
    }

    // Gone already; fall back to what the backend told us.
    match kind {
        EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => {
            EventFlags::ITEM_IS_FILE
        }
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
            EventFlags::ITEM_IS_DIR
        }
        _ => EventFlags::empty(),
    }
}

#[derive(Debug, Clone)]
struct Root {
    display: PathBuf,
    canonical: Option<PathBuf>,
}

/// Rewrites natively reported paths back onto the roots the caller asked for.
///
/// Backends may report a symlinked root under its target; consumers expect
/// the path they configured.
#[derive(Debug, Clone)]
pub struct RootMap {
    roots: Vec<Root>,
}

impl RootMap {
    pub fn new(roots: &[PathBuf]) -> Self {
        let roots = roots
            .iter()
            .map(|display| Root {
                display: display.clone(),
                canonical: std::fs::canonicalize(display)
                    .ok()
                    .filter(|canonical| canonical != display),
            })
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(|root| root.display.as_path())
    }

    pub fn rewrite(&self, path: PathBuf) -> PathBuf {
        if self.roots.iter().any(|root| path.starts_with(&root.display)) {
            return path;
        }
        for root in &self.roots {
            let Some(canonical) = &root.canonical else {
                continue;
            };
            if let Ok(rest) = path.strip_prefix(canonical) {
                if rest.as_os_str().is_empty() {
                    return root.display.clone();
                }
                return root.display.join(rest);
            }
        }
        path
    }

    /// True when `path` names one of the roots itself.
    pub fn is_root(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| {
            root.display == path || root.canonical.as_deref() == Some(path)
        })
    }
}
