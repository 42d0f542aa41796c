use log::*;

use crate::memory::Byte;

pub const TEXT_ROWS: usize = 4;
pub const TEXT_COLUMNS: usize = 16;
pub const GRAPHICS_SIZE: usize = 32;

/// Which grid the display instructions operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    Text,
    Graphics,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::Text
    }
}

/// Character grid, pixel grid and cursor. Only mutated by the processor's
/// display instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    text: [[Byte; TEXT_COLUMNS]; TEXT_ROWS],
    graphics: [[bool; GRAPHICS_SIZE]; GRAPHICS_SIZE],
    cursor_x: usize,
    cursor_y: usize,
    mode: DisplayMode,
    scroll_offset: usize,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            text: [[0; TEXT_COLUMNS]; TEXT_ROWS],
            graphics: [[false; GRAPHICS_SIZE]; GRAPHICS_SIZE],
            cursor_x: 0,
            cursor_y: 0,
            mode: DisplayMode::Text,
            scroll_offset: 0,
        }
    }
}

impl Display {
    pub fn text(&self) -> &[[Byte; TEXT_COLUMNS]; TEXT_ROWS] {
        &self.text
    }

    pub fn graphics(&self) -> &[[bool; GRAPHICS_SIZE]; GRAPHICS_SIZE] {
        &self.graphics
    }

    /// Pixel at column `x`, row `y`. Out of bounds reads are off.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.graphics
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// Cursor position as `(x, y)`
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Writes `character` at the cursor and advances it, wrapping into the
    /// next row and back to the top. Ignored in graphics mode.
    pub fn put_char(&mut self, character: Byte) {
        if self.mode != DisplayMode::Text {
            return;
        }

        self.text[self.cursor_y][self.cursor_x] = character;
        self.cursor_x += 1;
        if self.cursor_x >= TEXT_COLUMNS {
            self.cursor_x = 0;
            self.cursor_y = (self.cursor_y + 1) % TEXT_ROWS;
        }
    }

    /// Column in the low nibble, row in bits 4-5
    pub fn set_cursor(&mut self, value: Byte) {
        self.cursor_x = (value & 0x0F) as usize;
        self.cursor_y = ((value >> 4) & 0x03) as usize;
    }

    /// Clears the grid of the active mode and homes the cursor
    pub fn clear(&mut self) {
        match self.mode {
            DisplayMode::Text => self.text = [[0; TEXT_COLUMNS]; TEXT_ROWS],
            DisplayMode::Graphics => self.graphics = [[false; GRAPHICS_SIZE]; GRAPHICS_SIZE],
        }
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
    }

    /// Turns on the pixel at `(x, y)` if it lies on the grid
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        if x < GRAPHICS_SIZE && y < GRAPHICS_SIZE {
            self.graphics[y][x] = true;
            trace!("Set pixel at ({}, {})", x, y);
        }
    }

    /// Scrolls the text display by `lines` rows. Ignored in graphics mode.
    pub fn scroll(&mut self, lines: Byte) {
        if self.mode == DisplayMode::Text {
            self.scroll_offset = (self.scroll_offset + lines as usize) % TEXT_ROWS;
        }
    }

    /// Renders the text grid, starting at the scrolled-to row. Empty cells
    /// are rendered as spaces.
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity(TEXT_ROWS * (TEXT_COLUMNS + 1));
        for i in 0..TEXT_ROWS {
            let row = &self.text[(i + self.scroll_offset) % TEXT_ROWS];
            out.extend(row.iter().map(|&c| if c == 0 { ' ' } else { char::from(c) }));
            out.push('\n');
        }
        out
    }

    /// Renders the pixel grid with `#` for lit pixels
    pub fn render_graphics(&self) -> String {
        let mut out = String::with_capacity(GRAPHICS_SIZE * (GRAPHICS_SIZE + 1));
        for row in self.graphics.iter() {
            out.extend(row.iter().map(|&on| if on { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}
