use crossterm::style::Color;
use supports_color::Stream;

use crate::message::Role;

/// Detect if the terminal supports ANSI colors
pub fn supports_colors() -> bool {
    supports_color::on(Stream::Stdout).is_some()
}

/// Detect the level of color support
pub fn color_level() -> ColorLevel {
    match supports_color::on(Stream::Stdout) {
        Some(level) => match level.has_16m {
            true => ColorLevel::TrueColor,
            false => match level.has_256 {
                true => ColorLevel::Color256,
                false => ColorLevel::Color16,
            },
        },
        None => ColorLevel::None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorLevel {
    /// No color support
    None,
    /// 16 basic colors
    Color16,
    /// 256 ANSI colors
    Color256,
    /// True color (24-bit RGB)
    TrueColor,
}

/// Parse `#rrggbb`
fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Colors the terminal client draws with, picked once for the detected color level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    level: ColorLevel,
}

impl Palette {
    pub fn new(level: ColorLevel) -> Self {
        Self { level }
    }

    pub fn detect() -> Self {
        Self::new(color_level())
    }

    pub fn level(&self) -> ColorLevel {
        self.level
    }

    /// Color of a graph edge stroke, e.g. one produced by [`crate::layout::role_stroke`]
    pub fn stroke(&self, stroke: &str, role: Role) -> Color {
        match (self.level, hex_to_rgb(stroke)) {
            (ColorLevel::TrueColor, Some((r, g, b))) => Color::Rgb { r, g, b },
            (ColorLevel::None, _) => Color::Reset,
            _ => self.role(role),
        }
    }

    pub fn role(&self, role: Role) -> Color {
        if self.level == ColorLevel::None {
            return Color::Reset;
        }
        match role {
            Role::User => Color::Blue,
            Role::Assistant => Color::Green,
            Role::System => Color::DarkGrey,
        }
    }

    pub fn highlight(&self) -> Color {
        match self.level {
            ColorLevel::None => Color::Reset,
            _ => Color::DarkGrey,
        }
    }

    pub fn status(&self, busy: bool) -> Color {
        match (self.level, busy) {
            (ColorLevel::None, _) => Color::Reset,
            (_, true) => Color::Yellow,
            (_, false) => Color::Green,
        }
    }
}
