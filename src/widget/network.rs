// SPDX-License-Identifier: MPL-2.0

//! Network throughput sampling
//!
//! Reads the per-interface byte counters exposed by the kernel, drops virtual
//! interfaces, and turns two cumulative snapshots into a bytes-per-second rate.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::time::Instant;

/// Interface name prefixes excluded from aggregation.
///
/// `ifb` is created by the traffictoll bandwidth manager, `lxdbr` by lxd.
pub const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "ifb", "lxdbr", "virbr", "br", "vnet", "tun", "tap", "docker", "utun", "wg", "veth",
];

/// Minimum number of fields in an interface record line.
const RECORD_FIELDS: usize = 17;
const RX_BYTES_FIELD: usize = 1;
const TX_BYTES_FIELD: usize = 9;

/// Fallback used when neither the measured nor the configured interval is usable.
const DEFAULT_INTERVAL_SECS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read counters from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Prefix-based test for virtual/synthetic interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceFilter {
    prefixes: Vec<String>,
}

impl Default for InterfaceFilter {
    fn default() -> Self {
        Self::new(VIRTUAL_INTERFACE_PREFIXES.iter().copied())
    }
}

impl InterfaceFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds another excluded prefix, e.g. for new virtualization tooling.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_virtual(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// Returns true if `name` matches one of [`VIRTUAL_INTERFACE_PREFIXES`].
pub fn is_virtual_interface(name: &str) -> bool {
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// One parsed interface record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSample {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl InterfaceSample {
    /// Parses a single counters line. Header lines, short lines and lines
    /// with non-numeric byte fields yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line
            .split(|c: char| c == ':' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();
        if fields.len() < RECORD_FIELDS {
            return None;
        }

        let rx_bytes = fields[RX_BYTES_FIELD].parse::<u64>().ok()?;
        let tx_bytes = fields[TX_BYTES_FIELD].parse::<u64>().ok()?;

        Some(Self {
            name: fields[0].to_string(),
            rx_bytes,
            tx_bytes,
        })
    }
}

/// Cumulative byte totals at one point in time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub down: u64,
    pub up: u64,
}

/// Throughput in bytes per second.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub down: f64,
    pub up: f64,
}

/// Iterates over every well-formed interface record in `text`.
pub fn parse_interfaces(text: &str) -> impl Iterator<Item = InterfaceSample> + '_ {
    text.lines().filter_map(InterfaceSample::parse_line)
}

/// Sums the counters of all non-virtual interfaces in `text`.
pub fn parse_counters(text: &str) -> CounterSnapshot {
    parse_counters_with(text, &InterfaceFilter::default())
}

pub fn parse_counters_with(text: &str, filter: &InterfaceFilter) -> CounterSnapshot {
    parse_interfaces(text)
        .filter(|sample| !filter.is_virtual(&sample.name))
        .fold(CounterSnapshot::default(), |sum, sample| CounterSnapshot {
            down: sum.down.saturating_add(sample.rx_bytes),
            up: sum.up.saturating_add(sample.tx_bytes),
        })
}

fn usable_interval(secs: f64) -> Option<f64> {
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

fn side_delta(previous: u64, current: u64) -> u64 {
    // A zero baseline is the first observation for this side.
    if previous == 0 {
        return 0;
    }
    // Counter wrap or device reset: report nothing rather than a bogus value.
    current.saturating_sub(previous)
}

/// Derives the rate between two snapshots and returns it together with the
/// baseline to carry into the next cycle.
pub fn compute_rate(
    previous: CounterSnapshot,
    current: CounterSnapshot,
    elapsed_secs: f64,
    fallback_interval_secs: f64,
) -> (RateSample, CounterSnapshot) {
    let interval = usable_interval(elapsed_secs)
        .or_else(|| usable_interval(fallback_interval_secs))
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    let rate = RateSample {
        down: side_delta(previous.down, current.down) as f64 / interval,
        up: side_delta(previous.up, current.up) as f64 / interval,
    };

    (rate, current)
}

/// Something that yields the text of the counters file.
pub trait CounterSource {
    fn read(&self) -> impl Future<Output = Result<String, SampleError>> + Send;
}

/// The kernel's network device statistics pseudo-file.
#[derive(Debug, Clone)]
pub struct ProcNetDev {
    path: PathBuf,
}

impl ProcNetDev {
    pub const DEFAULT_PATH: &'static str = "/proc/net/dev";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ProcNetDev {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

impl CounterSource for ProcNetDev {
    async fn read(&self) -> Result<String, SampleError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SampleError::Read {
                path: self.path.clone(),
                source,
            })
    }
}

/// Carries the previous snapshot between sample cycles.
pub struct NetworkMonitor {
    filter: InterfaceFilter,
    previous: CounterSnapshot,
    last_sample: Option<Instant>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self::with_filter(InterfaceFilter::default())
    }

    pub fn with_filter(filter: InterfaceFilter) -> Self {
        Self {
            filter,
            previous: CounterSnapshot::default(),
            last_sample: None,
        }
    }

    pub fn previous(&self) -> CounterSnapshot {
        self.previous
    }

    /// Runs one sample pass over freshly read counters text.
    ///
    /// `fallback_interval_secs` is used when no earlier sample exists or the
    /// measured elapsed time is not positive.
    pub fn update(&mut self, content: &str, now: Instant, fallback_interval_secs: f64) -> RateSample {
        let current = parse_counters_with(content, &self.filter);
        let elapsed = self
            .last_sample
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);

        let (rate, next) = compute_rate(self.previous, current, elapsed, fallback_interval_secs);
        self.previous = next;
        self.last_sample = Some(now);
        rate
    }

    /// Forgets the carried snapshot so the next sample reports zero.
    pub fn reset(&mut self) {
        self.previous = CounterSnapshot::default();
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const HEADER: &str = "Inter-|   Receive                                                |  Transmit\n \
        face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n";

    fn record(name: &str, rx: u64, tx: u64) -> String {
        format!("{name:>6}: {rx} 2000 0 0 0 0 0 0 {tx} 1500 0 0 0 0 0 0\n")
    }

    fn counters(records: &[(&str, u64, u64)]) -> String {
        let mut text = HEADER.to_string();
        for (name, rx, tx) in records {
            text.push_str(&record(name, *rx, *tx));
        }
        text
    }

    // --- interface filter ---

    #[test]
    fn test_virtual_interfaces_detected() {
        assert!(is_virtual_interface("lo"));
        assert!(is_virtual_interface("docker0"));
        assert!(is_virtual_interface("veth1234"));
        assert!(is_virtual_interface("wg0"));
        assert!(is_virtual_interface("virbr0"));
    }

    #[test]
    fn test_physical_interfaces_pass() {
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("wlan0"));
        assert!(!is_virtual_interface("enp3s0"));
    }

    #[test]
    fn test_filter_is_case_sensitive() {
        assert!(!is_virtual_interface("LO"));
        assert!(!is_virtual_interface("Docker0"));
    }

    #[test]
    fn test_filter_can_be_extended() {
        let filter = InterfaceFilter::default().with_prefix("podman");
        assert!(filter.is_virtual("podman0"));
        assert!(filter.is_virtual("lo"));
        assert!(!filter.is_virtual("eth0"));
    }

    #[test]
    fn test_filter_can_be_replaced() {
        let filter = InterfaceFilter::new(["eth"]);
        assert!(filter.is_virtual("eth0"));
        assert!(!filter.is_virtual("lo"));
    }

    // --- parser ---

    #[test]
    fn test_parse_line_reads_rx_and_tx_fields() {
        let sample = InterfaceSample::parse_line(&record("eth0", 1_000_000, 500_000)).unwrap();
        assert_eq!(sample.name, "eth0");
        assert_eq!(sample.rx_bytes, 1_000_000);
        assert_eq!(sample.tx_bytes, 500_000);
    }

    #[test]
    fn test_parse_line_without_space_after_colon() {
        let line = "  eth0:123456789 10 0 0 0 0 0 0 987654321 20 0 0 0 0 0 0";
        let sample = InterfaceSample::parse_line(line).unwrap();
        assert_eq!(sample.rx_bytes, 123_456_789);
        assert_eq!(sample.tx_bytes, 987_654_321);
    }

    #[test]
    fn test_parse_line_skips_headers_and_short_lines() {
        for line in HEADER.lines() {
            assert_eq!(InterfaceSample::parse_line(line), None);
        }
        assert_eq!(InterfaceSample::parse_line("eth0: 1 2 3"), None);
        assert_eq!(InterfaceSample::parse_line(""), None);
    }

    #[test]
    fn test_parse_line_skips_non_numeric_bytes() {
        let line = "eth0: abc 2 0 0 0 0 0 0 100 1 0 0 0 0 0 0";
        assert_eq!(InterfaceSample::parse_line(line), None);
        let line = "eth0: 100 2 0 0 0 0 0 0 -5 1 0 0 0 0 0 0";
        assert_eq!(InterfaceSample::parse_line(line), None);
    }

    #[test]
    fn test_parse_counters_excludes_loopback() {
        let text = counters(&[("lo", 2_776_770, 2_776_770), ("eth0", 1_000_000, 500_000)]);
        assert_eq!(
            parse_counters(&text),
            CounterSnapshot {
                down: 1_000_000,
                up: 500_000
            }
        );
    }

    #[test]
    fn test_parse_counters_sums_physical_interfaces() {
        let text = counters(&[
            ("eth0", 100, 10),
            ("wlan0", 200, 20),
            ("docker0", 5_000, 5_000),
        ]);
        assert_eq!(parse_counters(&text), CounterSnapshot { down: 300, up: 30 });
    }

    #[test]
    fn test_parse_counters_bad_line_does_not_abort() {
        let mut text = counters(&[("eth0", 100, 10)]);
        text.push_str("garbage line that is not a record\n");
        text.push_str("eth1: x 0 0 0 0 0 0 0 y 0 0 0 0 0 0 0\n");
        text.push_str(&record("eth2", 50, 5));
        assert_eq!(parse_counters(&text), CounterSnapshot { down: 150, up: 15 });
    }

    #[test]
    fn test_parse_counters_empty_input_is_zero() {
        assert_eq!(parse_counters(""), CounterSnapshot::default());
        assert_eq!(parse_counters(HEADER), CounterSnapshot::default());
        let only_virtual = counters(&[("lo", 10, 10), ("veth9", 20, 20)]);
        assert_eq!(parse_counters(&only_virtual), CounterSnapshot::default());
    }

    // --- rate calculator ---

    #[test]
    fn test_compute_rate_divides_delta_by_elapsed() {
        let previous = CounterSnapshot { down: 1000, up: 500 };
        let current = CounterSnapshot { down: 2500, up: 800 };
        let (rate, next) = compute_rate(previous, current, 1.0, 1.0);
        assert_eq!(rate, RateSample { down: 1500.0, up: 300.0 });
        assert_eq!(next, current);

        let (rate, _) = compute_rate(previous, current, 2.0, 1.0);
        assert_eq!(rate, RateSample { down: 750.0, up: 150.0 });
    }

    #[test]
    fn test_compute_rate_zero_baseline_reports_zero() {
        let previous = CounterSnapshot { down: 0, up: 500 };
        let current = CounterSnapshot { down: 9_999_999, up: 600 };
        let (rate, next) = compute_rate(previous, current, 1.0, 1.0);
        assert_eq!(rate.down, 0.0);
        assert_eq!(rate.up, 100.0);
        assert_eq!(next, current);
    }

    #[test]
    fn test_compute_rate_uses_fallback_for_bad_elapsed() {
        let previous = CounterSnapshot { down: 100, up: 100 };
        let current = CounterSnapshot { down: 300, up: 200 };
        for elapsed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let (rate, _) = compute_rate(previous, current, elapsed, 2.0);
            assert_eq!(rate, RateSample { down: 100.0, up: 50.0 });
        }
    }

    #[test]
    fn test_compute_rate_bad_fallback_uses_one_second() {
        let previous = CounterSnapshot { down: 100, up: 100 };
        let current = CounterSnapshot { down: 300, up: 200 };
        let (rate, _) = compute_rate(previous, current, 0.0, 0.0);
        assert_eq!(rate, RateSample { down: 200.0, up: 100.0 });
    }

    #[test]
    fn test_compute_rate_counter_reset_clamps_to_zero() {
        let previous = CounterSnapshot { down: 5000, up: 5000 };
        let current = CounterSnapshot { down: 100, up: 6000 };
        let (rate, next) = compute_rate(previous, current, 1.0, 1.0);
        assert_eq!(rate.down, 0.0);
        assert_eq!(rate.up, 1000.0);
        assert_eq!(next, current);
    }

    // --- monitor ---

    #[tokio::test(start_paused = true)]
    async fn test_monitor_first_sample_is_zero() {
        let mut monitor = NetworkMonitor::new();
        let text = counters(&[("eth0", 1_000_000, 500_000)]);
        let rate = monitor.update(&text, Instant::now(), 1.0);
        assert_eq!(rate, RateSample::default());
        assert_eq!(
            monitor.previous(),
            CounterSnapshot {
                down: 1_000_000,
                up: 500_000
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_uses_measured_elapsed_time() {
        let mut monitor = NetworkMonitor::new();
        monitor.update(&counters(&[("eth0", 1000, 500)]), Instant::now(), 1.0);

        tokio::time::advance(Duration::from_secs(2)).await;
        let rate = monitor.update(&counters(&[("eth0", 3000, 900)]), Instant::now(), 1.0);
        assert_eq!(rate, RateSample { down: 1000.0, up: 200.0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reset_discards_baseline() {
        let mut monitor = NetworkMonitor::new();
        monitor.update(&counters(&[("eth0", 1000, 500)]), Instant::now(), 1.0);
        monitor.reset();
        assert_eq!(monitor.previous(), CounterSnapshot::default());

        tokio::time::advance(Duration::from_secs(1)).await;
        let rate = monitor.update(&counters(&[("eth0", 9000, 900)]), Instant::now(), 1.0);
        assert_eq!(rate, RateSample::default());
    }

    #[tokio::test]
    async fn test_proc_net_dev_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(counters(&[("eth0", 42, 24)]).as_bytes()).unwrap();

        let source = ProcNetDev::new(file.path());
        let text = source.read().await.unwrap();
        assert_eq!(parse_counters(&text), CounterSnapshot { down: 42, up: 24 });
    }

    #[tokio::test]
    async fn test_proc_net_dev_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProcNetDev::new(dir.path().join("missing"));
        let err = source.read().await.unwrap_err();
        assert!(matches!(err, SampleError::Read { .. }));
        assert!(err.to_string().contains("missing"));
    }
}
