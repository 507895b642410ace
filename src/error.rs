// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;

use crate::device::DeviceId;

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("No paths configured for event stream")]
    NoPaths,

    #[error("Failed to resolve device for {}: {source}", path.display())]
    DeviceResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path {} is on device {found}, stream is bound to device {expected}", path.display())]
    DeviceMismatch {
        path: PathBuf,
        expected: DeviceId,
        found: DeviceId,
    },

    #[error("Failed to subscribe to {}: {source}", path.display())]
    Subscription {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Event stream is already running")]
    AlreadyRunning,

    #[error("Failed to spawn delivery thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
