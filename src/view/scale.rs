use ratatui::style::Color;
use std::collections::HashMap;

/// Parse `#rrggbb` into a terminal color
pub fn hex(s: &str) -> Color {
    let s = s.trim_start_matches('#');
    if s.len() != 6 {
        return Color::Reset;
    }
    let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).unwrap_or(0);
    Color::Rgb(channel(0), channel(2), channel(4))
}

/// Dark or light text for a background, by perceived luminance
pub fn text_on(background: Color) -> Color {
    match background {
        Color::Rgb(r, g, b) => {
            let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            if luminance > 140.0 {
                Color::Rgb(0x22, 0x22, 0x22)
            } else {
                Color::White
            }
        }
        _ => Color::White,
    }
}

/// FNV-1a over UTF-16 code units
pub fn fnv1a(s: &str) -> u32 {
    let mut h: u32 = 2166136261;
    for unit in s.encode_utf16() {
        h ^= unit as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}

/// Square-root scale from a count domain onto an output range
#[derive(Debug, Clone, Copy)]
pub struct SqrtScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl SqrtScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn apply(&self, v: f64) -> f64 {
        let (d0, d1) = (self.domain.0.max(0.0).sqrt(), self.domain.1.max(0.0).sqrt());
        if (d1 - d0).abs() < f64::EPSILON {
            // Degenerate domain maps to the middle of the range
            return (self.range.0 + self.range.1) / 2.0;
        }
        let t = (v.max(0.0).sqrt() - d0) / (d1 - d0);
        self.range.0 + t * (self.range.1 - self.range.0)
    }
}

/// Discrete color classes with log-spaced thresholds
#[derive(Debug, Clone)]
pub struct ThresholdScale {
    pub thresholds: Vec<u64>,
    pub colors: Vec<Color>,
    pub max: u64,
}

impl ThresholdScale {
    /// Thresholds at `round(min * (max/min)^(i/k))` for i in 1..k, deduplicated and below max.
    pub fn log(values: impl IntoIterator<Item = u64>, palette: &[Color]) -> Self {
        let mut v: Vec<u64> = values.into_iter().filter(|&x| x > 0).collect();
        v.sort_unstable();
        let (Some(&min), Some(&max)) = (v.first(), v.last()) else {
            return Self { thresholds: Vec::new(), colors: Vec::new(), max: 0 };
        };

        let k = palette.len();
        let (lmin, lmax) = ((min as f64).ln(), (max as f64).ln());
        let mut thresholds: Vec<u64> = Vec::new();
        for i in 1..k {
            let t = (lmin + (lmax - lmin) * i as f64 / k as f64).exp().round() as u64;
            if !thresholds.contains(&t) && t < max {
                thresholds.push(t);
            }
        }
        thresholds.sort_unstable();
        let colors = palette[..(thresholds.len() + 1).min(k)].to_vec();
        Self { thresholds, colors, max }
    }

    /// Class color for a value; `None` when the scale is empty
    pub fn color(&self, value: u64) -> Option<Color> {
        if self.colors.is_empty() {
            return None;
        }
        // bisect-right: a value equal to a threshold belongs to the upper class
        let idx = self.thresholds.partition_point(|&t| t <= value);
        self.colors.get(idx.min(self.colors.len() - 1)).copied()
    }
}

/// Ordinal palette: each new key takes the next color, cycling.
/// The domain is fixed at construction so colors never depend on render order.
#[derive(Debug, Clone, Default)]
pub struct OrdinalPalette {
    palette: Vec<Color>,
    assigned: HashMap<String, Color>,
}

impl OrdinalPalette {
    pub fn new<I, S>(palette: &[Color], domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut assigned = HashMap::new();
        let mut next = 0;
        for key in domain {
            let key = key.into();
            if assigned.contains_key(&key) || palette.is_empty() {
                continue;
            }
            assigned.insert(key, palette[next % palette.len()]);
            next += 1;
        }
        Self {
            palette: palette.to_vec(),
            assigned,
        }
    }

    /// Color of a key; keys outside the domain hash onto the palette
    pub fn color(&self, key: &str) -> Color {
        if let Some(&c) = self.assigned.get(key) {
            return c;
        }
        if self.palette.is_empty() {
            return Color::Reset;
        }
        self.palette[fnv1a(key) as usize % self.palette.len()]
    }
}

/// d3 Blues, nine classes
pub const BLUES: [&str; 9] = [
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c", "#08306b",
];

/// Categorical palette shared by leaderboard and word cloud
pub const MODERN: [&str; 12] = [
    "#5e96f0", "#ef4444", "#10b981", "#f59e0b", "#4749d1", "#ec4899", "#8b5cf6", "#13d1bb", "#f97316",
    "#84cc16", "#119ab2", "#64748b",
];

pub fn palette(hexes: &[&str]) -> Vec<Color> {
    hexes.iter().map(|h| hex(h)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(hex("#ff0007"), Color::Rgb(255, 0, 7));
        assert_eq!(hex("bad"), Color::Reset);
    }

    #[test]
    fn test_text_on() {
        assert_eq!(text_on(hex("#ffffff")), Color::Rgb(0x22, 0x22, 0x22));
        assert_eq!(text_on(hex("#08306b")), Color::White);
    }

    #[test]
    fn test_fnv1a_known_value() {
        // FNV-1a of the empty input is the offset basis
        assert_eq!(fnv1a(""), 2166136261);
        assert_eq!(fnv1a("a"), 0xe40c292c);
    }

    #[test]
    fn test_sqrt_scale() {
        let s = SqrtScale::new((1.0, 100.0), (12.0, 45.0));
        assert!((s.apply(1.0) - 12.0).abs() < 1e-9);
        assert!((s.apply(100.0) - 45.0).abs() < 1e-9);
        let flat = SqrtScale::new((5.0, 5.0), (10.0, 20.0));
        assert_eq!(flat.apply(5.0), 15.0);
    }

    #[test]
    fn test_threshold_scale_classes() {
        let colors = palette(&BLUES[3..]);
        let scale = ThresholdScale::log([1, 10, 100, 1000, 0], &colors);
        assert_eq!(scale.max, 1000);
        assert!(!scale.thresholds.is_empty());
        assert!(scale.thresholds.windows(2).all(|w| w[0] < w[1]));
        assert!(scale.thresholds.iter().all(|&t| t < 1000));
        assert_eq!(scale.colors.len(), scale.thresholds.len() + 1);
        assert_eq!(scale.color(1), Some(scale.colors[0]));
        assert_eq!(scale.color(1000), scale.colors.last().copied());
    }

    #[test]
    fn test_threshold_scale_degenerate() {
        let colors = palette(&BLUES[3..]);
        let single = ThresholdScale::log([7, 7], &colors);
        assert!(single.thresholds.is_empty());
        assert_eq!(single.colors.len(), 1);
        let empty = ThresholdScale::log([0], &colors);
        assert_eq!(empty.color(3), None);
    }

    #[test]
    fn test_ordinal_palette_is_stable() {
        let colors = palette(&MODERN);
        let p = OrdinalPalette::new(&colors, ["b", "a", "b"]);
        assert_eq!(p.color("b"), colors[0]);
        assert_eq!(p.color("a"), colors[1]);
        assert_eq!(p.color("zzz"), p.color("zzz"));
    }
}
