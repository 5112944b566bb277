use std::io::Write;

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use unicode_width::UnicodeWidthChar;

/// Marks the second column of a wide character
const CONTINUATION: char = '\0';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Reset,
            bg: Color::Reset,
        }
    }
}

/// A virtual buffer for rendering to a bounded rectangular area
/// Panes draw into this instead of directly to stdout, coordinates outside are clipped
pub struct TerminalBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl TerminalBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        self.offset(x as i32, y as i32).map(|offset| self.cells[offset])
    }

    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Color, bg: Color) -> &mut Self {
        if let Some(offset) = self.offset(x, y) {
            self.cells[offset] = Cell { ch, fg, bg };
        }
        self
    }

    /// Write `text` on one row starting at `x`. Returns the columns consumed.
    pub fn put_str(&mut self, x: i32, y: i32, text: &str, fg: Color, bg: Color) -> u16 {
        let mut column = x;
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0) as i32;
            if width == 0 {
                continue;
            }
            self.set(column, y, ch, fg, bg);
            if width == 2 {
                self.set(column + 1, y, CONTINUATION, fg, bg);
            }
            column += width;
        }
        (column - x) as u16
    }

    /// Paint a whole row's background
    pub fn fill_row(&mut self, y: i32, bg: Color) -> &mut Self {
        for x in 0..self.width as i32 {
            self.set(x, y, ' ', Color::Reset, bg);
        }
        self
    }

    /// Copy `other` onto this buffer with its top-left corner at (x, y)
    pub fn blit(&mut self, other: &TerminalBuffer, x: i32, y: i32) -> &mut Self {
        for row in 0..other.height {
            for col in 0..other.width {
                if let Some(cell) = other.get(col, row) {
                    self.set(x + col as i32, y + row as i32, cell.ch, cell.fg, cell.bg);
                }
            }
        }
        self
    }

    /// Row contents as text, for tests and logging
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.get(x, y))
            .filter(|cell| cell.ch != CONTINUATION)
            .map(|cell| cell.ch)
            .collect()
    }

    /// Queue the whole buffer to `out`, only switching colors when they change
    pub fn flush<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut fg = None;
        let mut bg = None;
        for y in 0..self.height {
            queue!(out, MoveTo(0, y))?;
            for x in 0..self.width {
                let Some(cell) = self.get(x, y) else {
                    continue;
                };
                if cell.ch == CONTINUATION {
                    continue;
                }
                if fg != Some(cell.fg) {
                    queue!(out, SetForegroundColor(cell.fg))?;
                    fg = Some(cell.fg);
                }
                if bg != Some(cell.bg) {
                    queue!(out, SetBackgroundColor(cell.bg))?;
                    bg = Some(cell.bg);
                }
                queue!(out, Print(cell.ch))?;
            }
        }
        queue!(out, ResetColor)?;
        out.flush()?;
        Ok(())
    }
}
