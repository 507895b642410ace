// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;
use std::path::{Path, PathBuf};

use crate::event::flags::EventFlags;

/// Identifier assigned to every delivered event, increasing over a session.
pub type EventId = u64;

/// A single change delivered by an `EventStream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    id: EventId,
    path: PathBuf,
    flags: EventFlags,
}

impl Event {
    pub fn new(id: EventId, path: PathBuf, flags: EventFlags) -> Self {
        Self { id, path, flags }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flags(&self) -> EventFlags {
        self.flags
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventID: {} Path: {} Flags: {}",
            self.id,
            self.path.display(),
            self.flags
        )
    }
}
