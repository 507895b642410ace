// SPDX-License-Identifier: GPL-3.0-only
//! Filesystem change notifications with FSEvents semantics.
//!
//! An [`EventStream`] watches a set of paths through the platform's native
//! notification backend and delivers batches of [`Event`]s, each carrying an
//! increasing id, the affected path and an [`EventFlags`] bit set whose values
//! match FSEvents.
//!
//! ```no_run
//! use fs_eventstream::{CreateFlags, EventStream, device_for_path};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), fs_eventstream::WatchError> {
//! let dev = device_for_path("/tmp")?;
//! let stream = EventStream::new(["/tmp"])
//!     .with_latency(Duration::from_millis(1))
//!     .with_device(dev)
//!     .with_flags(CreateFlags::FILE_EVENTS);
//!
//! let mut events = stream.start()?;
//! if let Some(batch) = events.recv().await {
//!     for event in batch {
//!         println!("{event}");
//!     }
//! }
//! stream.stop();
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod logging;
pub mod stream;

#[cfg(test)]
mod test_helpers;

pub use config::WatchConfig;
pub use device::{DeviceId, device_for_path};
pub use error::{Result, WatchError};
pub use event::{CreateFlags, Event, EventFlags, EventId};
pub use logging::{LogFormat, setup_logging, setup_logging_with};
pub use stream::{EventIdClock, EventStream, NativeSource, NotifySource, latest_event_id};
