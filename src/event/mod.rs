// SPDX-License-Identifier: GPL-3.0-only
pub mod flags;
pub mod model;

pub use flags::{CreateFlags, EventFlags};
pub use model::{Event, EventId};
