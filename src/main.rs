// SPDX-License-Identifier: MPL-2.0

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use cosmic_net_speed::applet::{Applet, spawn_config_watcher};
use cosmic_net_speed::config::{self, Config};
use cosmic_net_speed::panel::{PanelSink, PlainSink, WaybarSink};
use cosmic_net_speed::scheduler::TokioScheduler;
use cosmic_net_speed::widget::{InterfaceFilter, ProcNetDev};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// One JSON object per line with Pango markup (waybar custom module)
    Waybar,
    /// Bare label text per line
    Plain,
}

#[derive(Parser)]
#[command(name = "cosmic-net-speed", about = "Network throughput applet for desktop panels")]
struct Cli {
    /// Network device statistics file
    #[arg(long, default_value = ProcNetDev::DEFAULT_PATH)]
    counters: PathBuf,
    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output format written to stdout
    #[arg(long, value_enum, default_value_t = Format::Waybar)]
    format: Format,
    /// Refresh interval in seconds, overriding the settings file
    #[arg(long, value_parser = config::parse_refresh_interval)]
    interval: Option<f64>,
    /// Also ignore interfaces whose name starts with this prefix (repeatable)
    #[arg(long = "exclude-prefix", value_name = "PREFIX")]
    exclude_prefixes: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli {
        counters,
        config: config_arg,
        format,
        interval,
        exclude_prefixes,
    } = Cli::parse();

    let config_path = match config_arg {
        Some(path) => path,
        None => Config::default_path().context("cannot locate settings file")?,
    };
    let mut config = Config::load_from(&config_path);
    if let Some(secs) = interval {
        config.refresh_interval = secs;
    }

    let filter = exclude_prefixes
        .into_iter()
        .fold(InterfaceFilter::default(), |filter, prefix| filter.with_prefix(prefix));
    log::debug!("excluded interface prefixes: {:?}", filter.prefixes());

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(async move {
        let source = ProcNetDev::new(counters);
        let settings = Settings {
            config,
            config_path,
            interval_override: interval,
            filter,
        };
        match format {
            Format::Waybar => run(source, WaybarSink::new(io::stdout()), settings).await,
            Format::Plain => run(source, PlainSink::new(io::stdout()), settings).await,
        }
    });

    Ok(())
}

struct Settings {
    config: Config,
    config_path: PathBuf,
    interval_override: Option<f64>,
    filter: InterfaceFilter,
}

async fn run<P: PanelSink>(source: ProcNetDev, sink: P, settings: Settings) {
    let Settings {
        config,
        config_path,
        interval_override,
        filter,
    } = settings;
    let (applet, handle) =
        Applet::with_filter(source, sink, TokioScheduler, config.clone(), filter);
    let watcher = spawn_config_watcher(config_path, config, interval_override, handle.clone());

    let signal = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for interrupt: {e}");
                return;
            }
            handle.shutdown();
        })
    };

    applet.run().await;
    watcher.abort();
    signal.abort();
}
