// SPDX-License-Identifier: MPL-2.0

//! Applet controller
//!
//! Owns the configuration and the carried network snapshot, and runs one
//! sample cycle per timer tick. Messages are handled one at a time, so a new
//! cycle never starts before the previous one has rendered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{Config, ConfigError, DEFAULT_REFRESH_INTERVAL};
use crate::panel::{PanelFrame, PanelSink};
use crate::scheduler::{CancelToken, Scheduler};
use crate::widget::speed::compose_with_arrows;
use crate::widget::{
    CounterSource, InterfaceFilter, NetworkMonitor, RateSample, format_speed_with_unit,
};

/// How often the config file is checked for changes.
pub const CONFIG_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Messages handled by the applet.
#[derive(Debug, Clone)]
pub enum Message {
    /// Timer fired. Carries the generation of the timer that sent it.
    Tick(u64),
    UpdateConfig(Config),
    Shutdown,
}

/// Outcome of a sample cycle.
enum Cycle {
    Done,
    Aborted,
}

/// Cloneable control handle for a running [`Applet`].
#[derive(Debug, Clone)]
pub struct AppletHandle {
    tx: mpsc::UnboundedSender<Message>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppletHandle {
    /// Returns false once the applet has stopped.
    pub fn update_config(&self, config: Config) -> bool {
        self.tx.send(Message::UpdateConfig(config)).is_ok()
    }

    /// Stops the applet, abandoning any read in flight.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let _ = self.tx.send(Message::Shutdown);
    }
}

pub struct Applet<S, P, D> {
    source: S,
    sink: P,
    scheduler: D,
    config: Config,
    network: NetworkMonitor,
    rate: RateSample,
    pending: Option<CancelToken>,
    generation: u64,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    shutdown: watch::Receiver<bool>,
}

/// Resolves once shutdown was requested or every handle is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn tick_interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|interval| !interval.is_zero())
        .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_REFRESH_INTERVAL))
}

impl<S, P, D> Applet<S, P, D>
where
    S: CounterSource,
    P: PanelSink,
    D: Scheduler,
{
    pub fn new(source: S, sink: P, scheduler: D, config: Config) -> (Self, AppletHandle) {
        Self::with_filter(source, sink, scheduler, config, InterfaceFilter::default())
    }

    /// Like [`Applet::new`], with a custom set of excluded interface prefixes.
    pub fn with_filter(
        source: S,
        sink: P,
        scheduler: D,
        config: Config,
        filter: InterfaceFilter,
    ) -> (Self, AppletHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = AppletHandle {
            tx: tx.clone(),
            shutdown: Arc::new(shutdown_tx),
        };

        let applet = Self {
            source,
            sink,
            scheduler,
            config,
            network: NetworkMonitor::with_filter(filter),
            rate: RateSample::default(),
            pending: None,
            generation: 0,
            tx,
            rx,
            shutdown: shutdown_rx,
        };

        (applet, handle)
    }

    /// Renders an initial zero rate, then samples on every tick until shut down.
    pub async fn run(mut self) {
        log::info!(
            "starting net speed applet, refresh every {}s",
            self.config.refresh_interval
        );
        self.render();
        self.schedule_tick();

        loop {
            let message = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => Message::Shutdown,
                message = self.rx.recv() => message.unwrap_or(Message::Shutdown),
            };
            if !self.update(message).await {
                break;
            }
        }

        self.teardown();
    }

    /// Handles one message, returning false when the applet should stop.
    async fn update(&mut self, message: Message) -> bool {
        match message {
            Message::Tick(generation) => {
                if generation != self.generation {
                    log::debug!("dropping stale tick {generation}");
                    return true;
                }
                self.pending = None;
                if let Cycle::Aborted = self.sample().await {
                    return false;
                }
                self.schedule_tick();
            }
            Message::UpdateConfig(config) => {
                let interval_changed = config.refresh_interval != self.config.refresh_interval;
                let style_changed = self.config.style_differs(&config);
                self.config = config;

                if interval_changed {
                    log::info!("refresh interval changed to {}s", self.config.refresh_interval);
                    self.reschedule();
                }
                if style_changed {
                    self.render();
                }
            }
            Message::Shutdown => return false,
        }
        true
    }

    async fn sample(&mut self) -> Cycle {
        let read = tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => return Cycle::Aborted,
            read = self.source.read() => read,
        };

        match read {
            Ok(content) => {
                self.rate = self
                    .network
                    .update(&content, Instant::now(), self.config.refresh_interval);
                log::debug!("sampled down={:.1}B/s up={:.1}B/s", self.rate.down, self.rate.up);
                self.render();
            }
            // Keep the previous snapshot; the next tick retries.
            Err(e) => log::warn!("{e}"),
        }
        Cycle::Done
    }

    fn render(&mut self) {
        let display = compose_with_arrows(self.rate, self.config.arrows);
        let download = format_speed_with_unit(self.rate.down);
        let upload = format_speed_with_unit(self.rate.up);
        let frame = PanelFrame {
            display: &display,
            download: &download,
            upload: &upload,
            config: &self.config,
        };
        if let Err(e) = self.sink.render(&frame) {
            log::warn!("failed to write panel output: {e}");
        }
    }

    fn schedule_tick(&mut self) {
        let tx = self.tx.clone();
        let generation = self.generation;
        let task = async move {
            let _ = tx.send(Message::Tick(generation));
        }
        .boxed();
        let after = tick_interval(self.config.refresh_interval);
        self.pending = Some(self.scheduler.schedule(after, task));
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// Replaces the pending timer. Ticks already queued by the old timer are
    /// ignored through the generation counter.
    fn reschedule(&mut self) {
        self.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
        self.schedule_tick();
    }

    fn teardown(&mut self) {
        self.cancel_pending();
        self.network.reset();
        self.rate = RateSample::default();
        log::info!("net speed applet stopped");
    }
}

/// Polls the config file and forwards changed values to the applet.
///
/// The file is applied on top of the running config. A file that cannot be
/// read, is malformed or holds any invalid value is skipped, so the applet
/// keeps its last valid config. `interval_override` pins the refresh
/// interval regardless of the file.
pub fn spawn_config_watcher(
    path: PathBuf,
    mut current: Config,
    interval_override: Option<f64>,
    handle: AppletHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CONFIG_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // last reported problem, so a broken file is logged once
        let mut last_error: Option<String> = None;

        loop {
            ticker.tick().await;
            let loaded = match tokio::fs::read_to_string(&path).await {
                Ok(content) => Config::try_from_json(&content, &current),
                Err(source) => Err(ConfigError::Io {
                    path: path.clone(),
                    source,
                }),
            };
            let mut config = match loaded {
                Ok(config) => config,
                Err(e) => {
                    let message = e.to_string();
                    if last_error.as_deref() != Some(message.as_str()) {
                        log::warn!("keeping current config: {message}");
                        last_error = Some(message);
                    }
                    continue;
                }
            };
            last_error = None;

            if let Some(secs) = interval_override {
                config.refresh_interval = secs;
            }
            if config == current {
                continue;
            }
            log::debug!("config changed on disk: {config:?}");
            current = config.clone();
            if !handle.update_config(config) {
                break;
            }
        }
    })
}
