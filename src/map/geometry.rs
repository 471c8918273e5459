use crate::braille::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Line of the given thickness in pixels, widened perpendicular to its major axis
pub fn draw_wide_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32, width: i32) {
    let steep = (y1 - y0).abs() > (x1 - x0).abs();
    for offset in 0..width.max(1) {
        let o = offset - (width - 1) / 2;
        if steep {
            draw_line(canvas, x0 + o, y0, x1 + o, y1);
        } else {
            draw_line(canvas, x0, y0 + o, x1, y1 + o);
        }
    }
}

/// Draw a filled circle (for institution markers)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

/// Scanline fill of a closed pixel polygon with the even-odd rule
pub fn fill_polygon(canvas: &mut BrailleCanvas, points: &[(i32, i32)]) {
    if points.len() < 3 {
        return;
    }
    let min_y = points.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_y = points
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(canvas.pixel_height() as i32 - 1);

    let mut crossings: Vec<i32> = Vec::new();
    for y in min_y..=max_y {
        crossings.clear();
        let scan = y as f64 + 0.5;
        for i in 0..points.len() {
            let (ax, ay) = points[i];
            let (bx, by) = points[(i + 1) % points.len()];
            let (ayf, byf) = (ay as f64, by as f64);
            if (ayf <= scan && byf > scan) || (byf <= scan && ayf > scan) {
                let t = (scan - ayf) / (byf - ayf);
                crossings.push((ax as f64 + t * (bx - ax) as f64).round() as i32);
            }
        }
        crossings.sort_unstable();
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].max(0);
            let end = pair[1].min(canvas.pixel_width() as i32 - 1);
            for x in start..=end {
                canvas.set_pixel_signed(x, y);
            }
        }
    }
}
