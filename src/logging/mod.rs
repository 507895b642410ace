// SPDX-License-Identifier: GPL-3.0-only
pub mod setup;

pub use setup::{LogFormat, setup_logging, setup_logging_with};
