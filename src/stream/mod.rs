// SPDX-License-Identifier: GPL-3.0-only
pub mod clock;
mod delivery;
pub mod event_stream;
pub mod native;
pub mod traits;
pub mod translate;

#[cfg(test)]
mod harness;

pub use clock::{EventIdClock, latest_event_id};
pub use event_stream::{DEFAULT_CHANNEL_CAPACITY, EventStream};
pub use native::NotifySource;
pub use traits::{NativeSource, NativeSubscription, RawEvent, RawSink, SubscribeRequest};
