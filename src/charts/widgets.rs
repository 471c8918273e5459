//! Small drawing helpers shared by the chart renderers.

use crate::filter::{Emphasis, Tone, Visual};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};

pub const MUTED: Color = Color::DarkGray;
pub const ACCENT: Color = Color::Rgb(0xfb, 0xbf, 0x24);

/// Write `text` at (x, y) relative to `area`, clipped to the area. Returns columns written.
pub fn put(buf: &mut Buffer, area: Rect, x: u16, y: u16, text: &str, style: Style) -> u16 {
    if x >= area.width || y >= area.height {
        return 0;
    }
    let max = (area.width - x) as usize;
    let mut written = 0u16;
    for ch in text.chars().take(max) {
        buf[(area.x + x + written, area.y + y)].set_char(ch).set_style(style);
        written += 1;
    }
    written
}

/// Truncate to `max` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

/// Horizontal bar of `value / max` over `width` cells with eighth-block precision
pub fn bar(value: f64, max: f64, width: u16) -> String {
    const PARTIAL: [char; 8] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉'];
    if max <= 0.0 || width == 0 {
        return String::new();
    }
    let eighths = ((value / max).clamp(0.0, 1.0) * width as f64 * 8.0).round() as usize;
    let mut out = "█".repeat(eighths / 8);
    if eighths % 8 > 0 {
        out.push(PARTIAL[eighths % 8]);
    }
    out
}

/// Terminal style for an entity given its base color and filter visual
pub fn styled(visual: &Visual, base: Color) -> Style {
    let fg = match visual.tone {
        Tone::Member => base,
        Tone::NonMember => MUTED,
    };
    let mut style = Style::default().fg(fg);
    style = match visual.emphasis {
        Emphasis::Highlight => style.add_modifier(Modifier::BOLD),
        Emphasis::Dimmed => style.fg(MUTED).add_modifier(Modifier::DIM),
        Emphasis::Normal => style,
    };
    if visual.pinned {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if visual.hovered {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Split an area into the chart body and a right-hand detail column
pub fn with_sidebar(area: Rect, side_width: u16) -> (Rect, Rect) {
    let side = side_width.min(area.width / 2);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(side)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Header lines on top, body below
pub fn with_header(area: Rect, header_height: u16) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header_height), Constraint::Min(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// Bordered panel with wrapped text lines
pub fn panel(title: &str, lines: Vec<Line<'_>>, area: Rect, buf: &mut Buffer) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(MUTED))
        .title(format!(" {title} "));
    Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

pub fn heading(text: impl Into<String>) -> Line<'static> {
    Line::styled(text.into(), Style::default().add_modifier(Modifier::BOLD))
}

pub fn muted(text: impl Into<String>) -> Line<'static> {
    Line::styled(text.into(), Style::default().fg(MUTED))
}

/// Centered message for empty states
pub fn empty_state(message: &str, area: Rect, buf: &mut Buffer) {
    let y = area.height / 2;
    let width = message.chars().count() as u16;
    let x = area.width.saturating_sub(width) / 2;
    put(buf, area, x, y, message, Style::default().fg(MUTED));
}

/// "N" with thousands separators
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
