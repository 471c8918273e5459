use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;

const BLANK: u32 = 0x2800;

/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots) and carries
/// one foreground color: the pen color of the last dot drawn into it.
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    pixels: Vec<Vec<u8>>,
    colors: Vec<Vec<Option<Color>>>,
    pen: Option<Color>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![vec![0u8; width]; height],
            colors: vec![vec![None; width]; height],
            pen: None,
        }
    }

    pub fn pixel_width(&self) -> usize {
        self.width * 2
    }

    pub fn pixel_height(&self) -> usize {
        self.height * 4
    }

    /// Color applied to every dot drawn until the pen changes
    pub fn set_pen(&mut self, color: Option<Color>) {
        self.pen = color;
    }

    /// Set a pixel at the given coordinates.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        self.pixels[cy][cx] |= bit;
        if self.pen.is_some() {
            self.colors[cy][cx] = self.pen;
        }
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    fn glyph(bits: u8) -> char {
        char::from_u32(BLANK + bits as u32).unwrap_or(' ')
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        (0..self.height)
            .map(|i| self.row_to_string(i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Get a specific row as a string (for line-by-line rendering)
    pub fn row_to_string(&self, row: usize) -> String {
        if row >= self.height {
            return String::new();
        }
        self.pixels[row].iter().map(|&b| Self::glyph(b)).collect()
    }

    pub fn color_at(&self, cx: usize, cy: usize) -> Option<Color> {
        self.colors.get(cy).and_then(|r| r.get(cx)).copied().flatten()
    }

    /// Write non-empty cells into the buffer; uncolored dots use `default`
    pub fn blit(&self, area: Rect, buf: &mut Buffer, default: Color) {
        for (cy, row) in self.pixels.iter().enumerate().take(area.height as usize) {
            let y = area.y + cy as u16;
            for (cx, &bits) in row.iter().enumerate().take(area.width as usize) {
                if bits == 0 {
                    continue;
                }
                let x = area.x + cx as u16;
                let fg = self.colors[cy][cx].unwrap_or(default);
                buf[(x, y)].set_char(Self::glyph(bits)).set_fg(fg);
            }
        }
    }
}
