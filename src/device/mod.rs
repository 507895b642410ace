// SPDX-License-Identifier: GPL-3.0-only
pub mod resolve;

pub use resolve::{DeviceId, device_for_path};
