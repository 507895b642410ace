// SPDX-License-Identifier: GPL-3.0-only
use bitflags::bitflags;
use std::fmt;

// Bit values follow FSEvents.h (kFSEventStreamEventFlag*) so raw values can be
// exchanged with the native API unchanged.
bitflags! {
    /// What happened to an item, plus stream-level notes.
    ///
    /// An empty set is a directory-granularity event: something below the
    /// reported directory changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const MUST_SCAN_SUB_DIRS = 0x0000_0001;
        const USER_DROPPED = 0x0000_0002;
        const KERNEL_DROPPED = 0x0000_0004;
        const EVENT_IDS_WRAPPED = 0x0000_0008;
        const HISTORY_DONE = 0x0000_0010;
        const ROOT_CHANGED = 0x0000_0020;
        const MOUNT = 0x0000_0040;
        const UNMOUNT = 0x0000_0080;

        const ITEM_CREATED = 0x0000_0100;
        const ITEM_REMOVED = 0x0000_0200;
        const ITEM_INODE_META_MOD = 0x0000_0400;
        const ITEM_RENAMED = 0x0000_0800;
        const ITEM_MODIFIED = 0x0000_1000;
        const ITEM_FINDER_INFO_MOD = 0x0000_2000;
        const ITEM_CHANGE_OWNER = 0x0000_4000;
        const ITEM_XATTR_MOD = 0x0000_8000;
        const ITEM_IS_FILE = 0x0001_0000;
        const ITEM_IS_DIR = 0x0002_0000;
        const ITEM_IS_SYMLINK = 0x0004_0000;
    }
}

const NOTE_MASK: u32 = 0x0000_00ff;

/// Diagnostic labels in ascending bit order.
const LABELS: &[(EventFlags, &str)] = &[
    (EventFlags::MUST_SCAN_SUB_DIRS, "MustScanSubdirs"),
    (EventFlags::USER_DROPPED, "UserDropped"),
    (EventFlags::KERNEL_DROPPED, "KernelDropped"),
    (EventFlags::EVENT_IDS_WRAPPED, "EventIDsWrapped"),
    (EventFlags::HISTORY_DONE, "HistoryDone"),
    (EventFlags::ROOT_CHANGED, "RootChanged"),
    (EventFlags::MOUNT, "Mount"),
    (EventFlags::UNMOUNT, "Unmount"),
    (EventFlags::ITEM_CREATED, "Created"),
    (EventFlags::ITEM_REMOVED, "Removed"),
    (EventFlags::ITEM_INODE_META_MOD, "InodeMetaMod"),
    (EventFlags::ITEM_RENAMED, "Renamed"),
    (EventFlags::ITEM_MODIFIED, "Modified"),
    (EventFlags::ITEM_FINDER_INFO_MOD, "FinderInfoMod"),
    (EventFlags::ITEM_CHANGE_OWNER, "ChangeOwner"),
    (EventFlags::ITEM_XATTR_MOD, "XAttrMod"),
    (EventFlags::ITEM_IS_FILE, "IsFile"),
    (EventFlags::ITEM_IS_DIR, "IsDir"),
    (EventFlags::ITEM_IS_SYMLINK, "IsSymLink"),
];

impl EventFlags {
    /// Stream-level notes (dropped events, wrapped ids, root changes, mounts).
    pub fn notes(self) -> EventFlags {
        EventFlags::from_bits_truncate(self.bits() & NOTE_MASK)
    }

    /// Item-level descriptors (what happened, and to what kind of entry).
    pub fn items(self) -> EventFlags {
        EventFlags::from_bits_truncate(self.bits() & !NOTE_MASK)
    }

    /// True when the event only carries stream notes and describes no item.
    pub fn is_note(self) -> bool {
        !self.notes().is_empty() && self.items().is_empty()
    }

    /// Space-joined labels for every set bit, in ascending bit order.
    pub fn describe(self) -> String {
        LABELS
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, label)| *label)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

bitflags! {
    /// Stream creation flags (kFSEventStreamCreateFlag*).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateFlags: u32 {
        /// Accepted for compatibility; paths are always delivered as `PathBuf`.
        const USE_CF_TYPES = 0x0000_0001;
        /// Deliver the first event after a quiet period immediately.
        const NO_DEFER = 0x0000_0002;
        /// Report `ROOT_CHANGED` when a watched root is created, removed or renamed.
        const WATCH_ROOT = 0x0000_0004;
        /// Accepted for compatibility; backends without process attribution ignore it.
        const IGNORE_SELF = 0x0000_0008;
        /// Report individual entries instead of their containing directories.
        const FILE_EVENTS = 0x0000_0010;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_match_native_values() {
        assert_eq!(EventFlags::MUST_SCAN_SUB_DIRS.bits(), 0x1);
        assert_eq!(EventFlags::UNMOUNT.bits(), 0x80);
        assert_eq!(EventFlags::ITEM_CREATED.bits(), 0x100);
        assert_eq!(EventFlags::ITEM_MODIFIED.bits(), 0x1000);
        assert_eq!(EventFlags::ITEM_IS_SYMLINK.bits(), 0x40000);
        assert_eq!(CreateFlags::FILE_EVENTS.bits(), 0x10);
        assert_eq!(CreateFlags::WATCH_ROOT.bits(), 0x4);
    }

    #[test]
    fn test_describe_two_bits() {
        let flags = EventFlags::ITEM_CREATED | EventFlags::ITEM_IS_FILE;
        let description = flags.describe();
        let labels: Vec<&str> = description.split(' ').collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"Created"));
        assert!(labels.contains(&"IsFile"));
    }

    #[test]
    fn test_describe_every_bit_once() {
        let description = EventFlags::all().describe();
        let labels: Vec<&str> = description.split(' ').collect();
        assert_eq!(labels.len(), LABELS.len());
        for (_, label) in LABELS {
            assert_eq!(labels.iter().filter(|l| *l == label).count(), 1, "{label}");
        }
    }

    #[test]
    fn test_describe_empty() {
        assert_eq!(EventFlags::empty().describe(), "");
        assert_eq!(EventFlags::empty().to_string(), "");
    }

    #[test]
    fn test_families_split() {
        let flags = EventFlags::USER_DROPPED
            | EventFlags::MUST_SCAN_SUB_DIRS
            | EventFlags::ITEM_REMOVED
            | EventFlags::ITEM_IS_DIR;
        assert_eq!(flags.notes(), EventFlags::USER_DROPPED | EventFlags::MUST_SCAN_SUB_DIRS);
        assert_eq!(flags.items(), EventFlags::ITEM_REMOVED | EventFlags::ITEM_IS_DIR);
        assert!(!flags.is_note());
        assert!(flags.notes().is_note());
        assert!(!EventFlags::empty().is_note());
    }
}
