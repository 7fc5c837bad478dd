// SPDX-License-Identifier: MPL-2.0

//! Panel output
//!
//! The applet hands each rendered frame to a sink. [`WaybarSink`] writes one
//! JSON object per line with Pango markup so the panel applies colors and
//! font size; [`PlainSink`] writes bare text.

use std::io::{self, Write};

use serde::Serialize;

use crate::config::{Config, FontSize};
use crate::widget::{SpeedDisplay, SpeedParts};

/// Everything a panel needs to draw one refresh.
#[derive(Debug, Clone, Copy)]
pub struct PanelFrame<'a> {
    pub display: &'a SpeedDisplay,
    pub download: &'a SpeedParts,
    pub upload: &'a SpeedParts,
    pub config: &'a Config,
}

pub trait PanelSink {
    fn render(&mut self, frame: &PanelFrame<'_>) -> io::Result<()>;
}

#[derive(Serialize)]
struct WaybarItem<'a> {
    text: String,
    tooltip: String,
    class: &'a str,
}

/// Pango `font_size` value for a configured size, `None` to inherit.
fn pango_font_size(size: FontSize) -> Option<String> {
    match size {
        FontSize::Inherit => None,
        FontSize::Px(n) => Some(format!("{}pt", f64::from(n) * 0.75)),
        FontSize::Pt(n) => Some(format!("{n}pt")),
        FontSize::Em(n) => Some(format!("{}%", u64::from(n) * 100)),
        FontSize::Percent(n) => Some(format!("{n}%")),
    }
}

fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn span(text: &str, color: impl std::fmt::Display, font_size: Option<&str>) -> String {
    let size = font_size
        .map(|size| format!(" font_size=\"{size}\""))
        .unwrap_or_default();
    format!(
        "<span font_family=\"monospace\" font_weight=\"500\" foreground=\"{color}\"{size}>{}</span>",
        escape_markup(text)
    )
}

pub fn markup(frame: &PanelFrame<'_>) -> String {
    let size = pango_font_size(frame.config.font_size);
    format!(
        "{} {}",
        span(&frame.display.download_text, frame.config.download_color, size.as_deref()),
        span(&frame.display.upload_text, frame.config.upload_color, size.as_deref()),
    )
}

pub fn tooltip(frame: &PanelFrame<'_>) -> String {
    format!(
        "Download: {} {}\nUpload: {} {}",
        frame.download.amount, frame.download.unit, frame.upload.amount, frame.upload.unit
    )
}

pub struct WaybarSink<W> {
    out: W,
}

impl<W: Write> WaybarSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PanelSink for WaybarSink<W> {
    fn render(&mut self, frame: &PanelFrame<'_>) -> io::Result<()> {
        let item = WaybarItem {
            text: markup(frame),
            tooltip: tooltip(frame),
            class: "net-speed",
        };
        serde_json::to_writer(&mut self.out, &item)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

pub struct PlainSink<W> {
    out: W,
}

impl<W: Write> PlainSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PanelSink for PlainSink<W> {
    fn render(&mut self, frame: &PanelFrame<'_>) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {}",
            frame.display.download_text, frame.display.upload_text
        )?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HexColor;
    use crate::widget::network::RateSample;
    use crate::widget::speed::compose_display;
    use crate::widget::format_speed_with_unit;

    fn frame_parts(rate: RateSample) -> (SpeedDisplay, SpeedParts, SpeedParts) {
        (
            compose_display(rate, "⇣", "⇡"),
            format_speed_with_unit(rate.down),
            format_speed_with_unit(rate.up),
        )
    }

    #[test]
    fn test_pango_font_size() {
        assert_eq!(pango_font_size(FontSize::Inherit), None);
        assert_eq!(pango_font_size(FontSize::Px(16)).as_deref(), Some("12pt"));
        assert_eq!(pango_font_size(FontSize::Px(15)).as_deref(), Some("11.25pt"));
        assert_eq!(pango_font_size(FontSize::Pt(10)).as_deref(), Some("10pt"));
        assert_eq!(pango_font_size(FontSize::Em(2)).as_deref(), Some("200%"));
        assert_eq!(pango_font_size(FontSize::Percent(90)).as_deref(), Some("90%"));
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_markup("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape_markup("⇣1.50\u{a0}KB/s"), "⇣1.50\u{a0}KB/s");
    }

    #[test]
    fn test_waybar_line() {
        let (display, down, up) = frame_parts(RateSample { down: 1500.0, up: 300.0 });
        let mut config = Config::default();
        config.font_size = FontSize::Pt(11);
        config.upload_color = HexColor::rgb(0xff, 0, 0);
        let frame = PanelFrame {
            display: &display,
            download: &down,
            upload: &up,
            config: &config,
        };

        let mut sink = WaybarSink::new(Vec::new());
        sink.render(&frame).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.ends_with('\n'));
        assert_eq!(out.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        let text = value["text"].as_str().unwrap();
        assert!(text.contains("foreground=\"#3fd7e5\""));
        assert!(text.contains("foreground=\"#ff0000\""));
        assert!(text.contains("font_size=\"11pt\""));
        assert!(text.contains(&display.download_text));
        assert_eq!(value["tooltip"], "Download: 1.50 KB/s\nUpload: 300 B/s");
        assert_eq!(value["class"], "net-speed");
    }

    #[test]
    fn test_waybar_inherit_omits_font_size() {
        let (display, down, up) = frame_parts(RateSample::default());
        let config = Config::default();
        let frame = PanelFrame {
            display: &display,
            download: &down,
            upload: &up,
            config: &config,
        };
        assert!(!markup(&frame).contains("font_size"));
    }

    #[test]
    fn test_plain_line() {
        let (display, down, up) = frame_parts(RateSample { down: 0.0, up: 12.3 });
        let config = Config::default();
        let frame = PanelFrame {
            display: &display,
            download: &down,
            upload: &up,
            config: &config,
        };

        let mut sink = PlainSink::new(Vec::new());
        sink.render(&frame).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, format!("{} {}\n", display.download_text, display.upload_text));
    }
}
