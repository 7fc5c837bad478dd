// SPDX-License-Identifier: MPL-2.0

//! Widget module organization

pub mod arrows;
pub mod network;
pub mod speed;

pub use arrows::ArrowPair;
pub use network::{
    CounterSnapshot, CounterSource, InterfaceFilter, NetworkMonitor, ProcNetDev, RateSample,
    SampleError,
};
pub use speed::{SpeedDisplay, SpeedParts, compose_display, format_speed_with_unit};
