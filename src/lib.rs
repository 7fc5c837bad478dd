// SPDX-License-Identifier: MPL-2.0

//! Network throughput applet for desktop panels.
//!
//! Samples the kernel's per-interface byte counters on a timer and renders
//! download/upload rates as fixed-width labels.

pub mod applet;
pub mod config;
pub mod panel;
pub mod scheduler;
pub mod widget;

pub use applet::{Applet, AppletHandle, Message};
pub use config::Config;
