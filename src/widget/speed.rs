// SPDX-License-Identifier: MPL-2.0

//! Throughput formatting
//!
//! Rates are scaled by powers of 1000 and rendered into fixed-width columns
//! so the label does not jitter as the digit count changes between refreshes.

use super::arrows::ArrowPair;
use super::network::RateSample;

pub const SPEED_UNITS: [&str; 9] = [
    "B/s", "KB/s", "MB/s", "GB/s", "TB/s", "PB/s", "EB/s", "ZB/s", "YB/s",
];

/// Width of the amount column, enough for `999.99`.
pub const AMOUNT_WIDTH: usize = 6;

/// Padding character that panel layouts do not collapse.
pub const NBSP: char = '\u{a0}';

/// Width of the unit column, the longest entry of [`SPEED_UNITS`].
pub fn unit_width() -> usize {
    SPEED_UNITS.iter().map(|unit| unit.len()).max().unwrap_or(0)
}

/// A formatted rate with amount and unit kept apart for column alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedParts {
    pub amount: String,
    pub unit: &'static str,
}

/// Final label text for both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedDisplay {
    pub download_text: String,
    pub upload_text: String,
}

fn precision(amount: f64) -> usize {
    if amount >= 100.0 || amount < 0.01 {
        0
    } else if amount >= 10.0 {
        1
    } else {
        2
    }
}

pub fn format_speed_with_unit(bytes_per_second: f64) -> SpeedParts {
    let mut amount = bytes_per_second;
    let mut unit_index = 0;

    while amount >= 1000.0 && unit_index < SPEED_UNITS.len() - 1 {
        amount /= 1000.0;
        unit_index += 1;
    }

    SpeedParts {
        amount: format!("{:.*}", precision(amount), amount),
        unit: SPEED_UNITS[unit_index],
    }
}

fn pad_right(text: &str, width: usize) -> String {
    let mut padded = String::from(text);
    let len = text.chars().count();
    padded.extend(std::iter::repeat_n(NBSP, width.saturating_sub(len)));
    padded
}

fn compose_side(arrow: &str, bytes_per_second: f64) -> String {
    let parts = format_speed_with_unit(bytes_per_second);
    format!(
        "{}{}{}",
        arrow,
        pad_right(&parts.amount, AMOUNT_WIDTH),
        pad_right(parts.unit, unit_width())
    )
}

pub fn compose_display(rate: RateSample, down_arrow: &str, up_arrow: &str) -> SpeedDisplay {
    SpeedDisplay {
        download_text: compose_side(down_arrow, rate.down),
        upload_text: compose_side(up_arrow, rate.up),
    }
}

/// Same as [`compose_display`] with glyphs taken from an arrow pair.
pub fn compose_with_arrows(rate: RateSample, arrows: ArrowPair) -> SpeedDisplay {
    compose_display(rate, arrows.down(), arrows.up())
}
