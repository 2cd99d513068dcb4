// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod cancel;
pub mod duration;

pub use cancel::{CancelReason, CancellationSignal};
pub use duration::parse_duration;
