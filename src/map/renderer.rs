use crate::braille::BrailleCanvas;
use crate::data::Country;
use crate::map::geometry::{draw_circle, draw_line, draw_wide_line, fill_polygon};
use crate::map::projection::Viewport;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};

/// Text placed over the canvas at a character position
#[derive(Debug, Clone)]
pub struct Label {
    pub x: u16,
    pub y: u16,
    pub text: String,
    pub style: Style,
}

/// How a single country is drawn
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
}

/// Draws country shapes, flows and markers onto a Braille canvas
#[derive(Debug, Clone, Default)]
pub struct MapRenderer;

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill then outline every country in the viewport, styled per country
    pub fn draw_countries<F>(&self, canvas: &mut BrailleCanvas, countries: &[Country], viewport: &Viewport, style: F)
    where
        F: Fn(&Country) -> CountryStyle,
    {
        for country in countries {
            let s = style(country);
            if let Some(fill) = s.fill {
                canvas.set_pen(Some(fill));
                for ring in &country.rings {
                    let points = self.project_ring(ring, viewport);
                    if ring_might_be_visible(&points, viewport) {
                        fill_polygon(canvas, &points);
                    }
                }
            }
            if let Some(stroke) = s.stroke {
                canvas.set_pen(Some(stroke));
                for ring in &country.rings {
                    self.draw_linestring(canvas, ring, viewport);
                }
            }
        }
        canvas.set_pen(None);
    }

    fn project_ring(&self, ring: &[(f64, f64)], viewport: &Viewport) -> Vec<(i32, i32)> {
        ring.iter().map(|&(lon, lat)| viewport.project(lon, lat)).collect()
    }

    /// Draw a linestring with viewport culling
    fn draw_linestring(&self, canvas: &mut BrailleCanvas, line: &[(f64, f64)], viewport: &Viewport) {
        if line.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;

        for &(lon, lat) in line {
            let (px, py) = viewport.project(lon, lat);

            if let Some((prev_x, prev_y)) = prev {
                // Segments spanning the whole canvas are antimeridian wraps
                let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
                if dist < viewport.width && viewport.line_might_be_visible((prev_x, prev_y), (px, py)) {
                    draw_line(canvas, prev_x, prev_y, px, py);
                }
            }

            prev = Some((px, py));
        }
    }

    /// Straight flow between two (lon, lat) points
    pub fn draw_flow(
        &self,
        canvas: &mut BrailleCanvas,
        from: (f64, f64),
        to: (f64, f64),
        width: i32,
        color: Color,
        viewport: &Viewport,
    ) {
        let a = viewport.project(from.0, from.1);
        let b = viewport.project(to.0, to.1);
        if !viewport.line_might_be_visible(a, b) {
            return;
        }
        canvas.set_pen(Some(color));
        draw_wide_line(canvas, a.0, a.1, b.0, b.1, width);
        canvas.set_pen(None);
    }

    /// Filled circle marker; returns the character cell it landed in, if visible
    pub fn draw_marker(
        &self,
        canvas: &mut BrailleCanvas,
        at: (f64, f64),
        radius: i32,
        color: Color,
        viewport: &Viewport,
    ) -> Option<(u16, u16)> {
        let (px, py) = viewport.project(at.0, at.1);
        if !viewport.is_visible(px, py) {
            return None;
        }
        canvas.set_pen(Some(color));
        draw_circle(canvas, px, py, radius);
        canvas.set_pen(None);
        Some(((px / 2) as u16, (py / 4) as u16))
    }
}

fn ring_might_be_visible(points: &[(i32, i32)], viewport: &Viewport) -> bool {
    let (Some(min_x), Some(max_x)) = (points.iter().map(|p| p.0).min(), points.iter().map(|p| p.0).max()) else {
        return false;
    };
    let (Some(min_y), Some(max_y)) = (points.iter().map(|p| p.1).min(), points.iter().map(|p| p.1).max()) else {
        return false;
    };
    viewport.line_might_be_visible((min_x, min_y), (max_x, max_y))
}

/// Overlay labels, truncated at the right edge of the area
pub fn draw_labels(labels: &[Label], area: Rect, buf: &mut Buffer) {
    for label in labels {
        if label.y >= area.height || label.x >= area.width {
            continue;
        }
        let y = area.y + label.y;
        let max_len = (area.width - label.x) as usize;
        for (i, ch) in label.text.chars().take(max_len).enumerate() {
            buf[(area.x + label.x + i as u16, y)].set_char(ch).set_style(label.style);
        }
    }
}
