// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::widget::ArrowPair;

/// Unique identifier in RDNN (reverse domain name notation) format.
pub const APP_ID: &str = "io.github.cosmic_net_speed.NetSpeed";

pub const DEFAULT_REFRESH_INTERVAL: f64 = 1.0;
pub const DEFAULT_DOWNLOAD_COLOR: HexColor = HexColor::rgb(0x3f, 0xd7, 0xe5);
pub const DEFAULT_UPLOAD_COLOR: HexColor = HexColor::rgb(0xff, 0xb8, 0x4d);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("refresh interval must be a positive number of seconds, got {0:?}")]
    InvalidInterval(String),
    #[error("color must be 6 hex digits, got {0:?}")]
    InvalidColor(String),
    #[error("font size must be 'inherit', a number, or a number with px|em|pt|%, got {0:?}")]
    InvalidFontSize(String),
    #[error("arrow pair index {0} is out of range")]
    InvalidArrowIndex(usize),
    #[error("unknown download arrow {0:?}")]
    InvalidArrowGlyph(String),
    #[error("no user configuration directory available")]
    NoConfigDir,
    #[error("config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for HexColor {
    type Err = ConfigError;

    /// Accepts `rrggbb` with an optional leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidColor(s.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ConfigError::InvalidColor(s.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontSize {
    #[default]
    Inherit,
    Px(u32),
    Em(u32),
    Pt(u32),
    Percent(u32),
}

impl FromStr for FontSize {
    type Err = ConfigError;

    /// A bare number is taken as pixels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        if value.is_empty() || value == "inherit" {
            return Ok(Self::Inherit);
        }

        let digits_end = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (digits, suffix) = value.split_at(digits_end);
        let invalid = || ConfigError::InvalidFontSize(s.to_string());
        if digits.is_empty() {
            return Err(invalid());
        }
        let size: u32 = digits.parse().map_err(|_| invalid())?;

        match suffix {
            "" | "px" => Ok(Self::Px(size)),
            "em" => Ok(Self::Em(size)),
            "pt" => Ok(Self::Pt(size)),
            "%" => Ok(Self::Percent(size)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("inherit"),
            Self::Px(n) => write!(f, "{n}px"),
            Self::Em(n) => write!(f, "{n}em"),
            Self::Pt(n) => write!(f, "{n}pt"),
            Self::Percent(n) => write!(f, "{n}%"),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ConfigError + use<> {
    let path = path.to_path_buf();
    move |source| ConfigError::Io { path, source }
}

/// Parses a refresh interval in seconds; must be finite and positive.
pub fn parse_refresh_interval(s: &str) -> Result<f64, ConfigError> {
    match s.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
        _ => Err(ConfigError::InvalidInterval(s.to_string())),
    }
}

/// On-disk shape. Every field is optional so partial files still load.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    refresh_interval: Option<f64>,
    download_color: Option<String>,
    upload_color: Option<String>,
    font_size: Option<String>,
    arrow_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    down_arrow: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Seconds between samples.
    pub refresh_interval: f64,
    pub download_color: HexColor,
    pub upload_color: HexColor,
    pub font_size: FontSize,
    pub arrows: ArrowPair,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            download_color: DEFAULT_DOWNLOAD_COLOR,
            upload_color: DEFAULT_UPLOAD_COLOR,
            font_size: FontSize::Inherit,
            arrows: ArrowPair::default(),
        }
    }
}

impl Config {
    pub const VERSION: u64 = 1;

    /// `<config dir>/cosmic/<APP_ID>/v<VERSION>/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base
            .join("cosmic")
            .join(APP_ID)
            .join(format!("v{}", Self::VERSION))
            .join("config.json"))
    }

    /// Loads the config at `path`, falling back to defaults for a missing
    /// file, an unparsable file, or any individual invalid field.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("failed to read config at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let raw = match serde_json::from_str::<RawConfig>(&content) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("invalid config at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let mut config = Self::default();
        for e in config.apply_raw(raw) {
            log::warn!("ignoring config value: {e}");
        }
        config
    }

    /// Applies the fields present in `content` on top of `base`. Fields the
    /// document leaves out keep their value from `base`.
    ///
    /// Unlike [`Config::load_from`] nothing is defaulted: malformed JSON or
    /// any invalid field is an error.
    pub fn try_from_json(content: &str, base: &Self) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(content)?;
        let mut config = base.clone();
        match config.apply_raw(raw).into_iter().next() {
            Some(e) => Err(e),
            None => Ok(config),
        }
    }

    /// Applies every valid field and returns the errors for the rest.
    fn apply_raw(&mut self, raw: RawConfig) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if let Some(secs) = raw.refresh_interval {
            errors.extend(self.set_refresh_interval(&secs.to_string()).err());
        }
        if let Some(color) = raw.download_color {
            errors.extend(self.set_download_color(&color).err());
        }
        if let Some(color) = raw.upload_color {
            errors.extend(self.set_upload_color(&color).err());
        }
        if let Some(size) = raw.font_size {
            errors.extend(self.set_font_size(&size).err());
        }
        match (raw.arrow_index, raw.down_arrow) {
            (Some(index), _) => errors.extend(self.set_arrow_index(index).err()),
            // older files stored the download glyph itself
            (None, Some(glyph)) => match ArrowPair::from_down_glyph(&glyph) {
                Some(arrows) => self.arrows = arrows,
                None => errors.push(ConfigError::InvalidArrowGlyph(glyph)),
            },
            (None, None) => {}
        }

        errors
    }

    fn to_raw(&self) -> RawConfig {
        RawConfig {
            refresh_interval: Some(self.refresh_interval),
            download_color: Some(self.download_color.to_string()),
            upload_color: Some(self.upload_color.to_string()),
            font_size: Some(self.font_size.to_string()),
            arrow_index: Some(self.arrows.index()),
            down_arrow: None,
        }
    }

    /// Writes the config through a sibling temp file renamed over `path`, so
    /// readers see either the old or the new file, never a partial one.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let json = serde_json::to_string_pretty(&self.to_raw())?;
        let mut file = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
        file.write_all(json.as_bytes()).map_err(io_error(file.path()))?;
        file.persist(path).map_err(|e| io_error(path)(e.error))?;
        Ok(())
    }

    pub fn set_refresh_interval(&mut self, value: &str) -> Result<(), ConfigError> {
        self.refresh_interval = parse_refresh_interval(value)?;
        Ok(())
    }

    pub fn set_download_color(&mut self, value: &str) -> Result<(), ConfigError> {
        self.download_color = value.parse()?;
        Ok(())
    }

    pub fn set_upload_color(&mut self, value: &str) -> Result<(), ConfigError> {
        self.upload_color = value.parse()?;
        Ok(())
    }

    pub fn set_font_size(&mut self, value: &str) -> Result<(), ConfigError> {
        self.font_size = value.parse()?;
        Ok(())
    }

    pub fn set_arrow_index(&mut self, index: usize) -> Result<(), ConfigError> {
        self.arrows = ArrowPair::new(index).ok_or(ConfigError::InvalidArrowIndex(index))?;
        Ok(())
    }

    pub fn cycle_arrows(&mut self) -> ArrowPair {
        self.arrows = self.arrows.next();
        self.arrows
    }

    /// True if anything other than the refresh interval differs.
    pub fn style_differs(&self, other: &Self) -> bool {
        self.download_color != other.download_color
            || self.upload_color != other.upload_color
            || self.font_size != other.font_size
            || self.arrows != other.arrows
    }
}
