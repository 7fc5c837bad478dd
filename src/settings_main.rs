// SPDX-License-Identifier: MPL-2.0

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cosmic_net_speed::config::{Config, ConfigError};
use cosmic_net_speed::widget::ArrowPair;

#[derive(Parser)]
#[command(
    name = "cosmic-net-speed-settings",
    about = "View and change the net speed applet settings"
)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current settings
    Show,
    /// Refresh interval in seconds (e.g. 0.5)
    Interval { seconds: String },
    /// Download text color as 6 hex digits
    DownloadColor { hex: String },
    /// Upload text color as 6 hex digits
    UploadColor { hex: String },
    /// inherit, a pixel count, or a number with px|em|pt|%
    FontSize { size: String },
    /// Select an arrow pair by number
    Arrows {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=ArrowPair::COUNT as i64))]
        number: u8,
    },
    /// Switch to the next arrow pair
    NextArrows,
    /// List the available arrow pairs
    ListArrows,
    /// Restore defaults
    Reset,
}

fn print_settings(config: &Config) {
    println!("refresh interval: {}s", config.refresh_interval);
    println!("download color:   {}", config.download_color);
    println!("upload color:     {}", config.upload_color);
    println!("font size:        {}", config.font_size);
    println!("arrows:           {}", config.arrows);
}

fn print_arrows(config: &Config) {
    for pair in ArrowPair::all() {
        let marker = if pair == config.arrows { '*' } else { ' ' };
        println!("{marker} {pair}");
    }
}

/// Applies `command` to `config`, returning whether it needs saving.
fn apply(command: Command, config: &mut Config) -> Result<bool, ConfigError> {
    match command {
        Command::Show | Command::ListArrows => return Ok(false),
        Command::Interval { seconds } => config.set_refresh_interval(&seconds)?,
        Command::DownloadColor { hex } => config.set_download_color(&hex)?,
        Command::UploadColor { hex } => config.set_upload_color(&hex)?,
        Command::FontSize { size } => config.set_font_size(&size)?,
        Command::Arrows { number } => config.set_arrow_index(usize::from(number) - 1)?,
        Command::NextArrows => {
            config.cycle_arrows();
        }
        Command::Reset => *config = Config::default(),
    }
    Ok(true)
}

/// Loads the settings at `path`, applies `command` and saves the result.
/// Invalid input leaves the file untouched.
fn execute(command: Command, path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load_from(path);
    if apply(command, &mut config)? {
        config
            .save_to(path)
            .with_context(|| format!("failed to save settings to {}", path.display()))?;
        log::info!("saved settings to {}", path.display());
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => Config::default_path().context("cannot locate settings file")?,
    };

    let command = cli.command.unwrap_or(Command::Show);
    let list_arrows = matches!(command, Command::ListArrows);
    let config = execute(command, &path)?;
    if list_arrows {
        print_arrows(&config);
    } else {
        print_settings(&config);
    }
    Ok(())
}
