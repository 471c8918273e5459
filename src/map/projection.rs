use std::f64::consts::{PI, TAU};

/// Width the region presets were tuned against
const REFERENCE_WIDTH: f64 = 1100.0;

/// Named map framings shared by the flow map and the pictorial chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    World,
    Europe,
    Asia,
    Usa,
    Italy,
}

impl Region {
    pub const ALL: [Region; 5] = [Region::World, Region::Europe, Region::Asia, Region::Usa, Region::Italy];

    pub fn label(self) -> &'static str {
        match self {
            Region::World => "World",
            Region::Europe => "Europe",
            Region::Asia => "Asia",
            Region::Usa => "USA",
            Region::Italy => "Italy",
        }
    }

    /// Mercator scale (pixels per radian at the reference width) and center
    fn preset(self) -> (f64, (f64, f64)) {
        match self {
            Region::World => (REFERENCE_WIDTH / 6.3, (0.0, 20.0)),
            Region::Europe => (600.0, (15.0, 50.0)),
            Region::Asia => (400.0, (90.0, 30.0)),
            Region::Usa => (700.0, (-96.0, 38.0)),
            Region::Italy => (2300.0, (12.5, 42.0)),
        }
    }

    /// Zoom factor relative to a full-width world
    pub fn zoom(self) -> f64 {
        let (scale, _) = self.preset();
        scale * TAU / REFERENCE_WIDTH
    }

    pub fn center(self) -> (f64, f64) {
        self.preset().1
    }

    pub fn next(self) -> Region {
        let i = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Region {
        let i = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Viewport representing the visible map area and zoom level
#[derive(Debug, Clone)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-90 to 90)
    pub center_lat: f64,
    /// Zoom level (higher = more zoomed in)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Create a world view (shows entire world)
    pub fn world(width: usize, height: usize) -> Self {
        Self::region(Region::World, width, height)
    }

    pub fn region(region: Region, width: usize, height: usize) -> Self {
        let (lon, lat) = region.center();
        Self::new(lon, lat, region.zoom(), width, height)
    }

    /// Same framing on a canvas of a different pixel size
    pub fn resized(&self, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..self.clone()
        }
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = 360.0 / (self.zoom * self.width.max(1) as f64);
        self.center_lon += dx as f64 * scale;
        self.center_lat -= dy as f64 * scale * 0.5; // Mercator distortion

        // Wrap longitude
        if self.center_lon > 180.0 {
            self.center_lon -= 360.0;
        } else if self.center_lon < -180.0 {
            self.center_lon += 360.0;
        }

        self.center_lat = self.center_lat.clamp(-85.0, 85.0);
    }

    pub fn center_on(&mut self, lon: f64, lat: f64) {
        self.center_lon = lon.clamp(-180.0, 180.0);
        self.center_lat = lat.clamp(-85.0, 85.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.5).min(100.0);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 1.5).max(0.5);
    }

    fn mercator_y(lat: f64) -> f64 {
        let lat_rad = lat.clamp(-85.0, 85.0) * PI / 180.0;
        (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let scale = self.zoom * self.width as f64;

        let center_x = (self.center_lon + 180.0) / 360.0;
        let center_y = Self::mercator_y(self.center_lat);

        let x = (px as f64 - self.width as f64 / 2.0) / scale + center_x;
        let y = (py as f64 - self.height as f64 / 2.0) / scale + center_y;

        let lon = x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * y)).sinh().atan() * 180.0 / PI;

        (lon, lat)
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon + 180.0) / 360.0;
        let y = Self::mercator_y(lat);

        let center_x = (self.center_lon + 180.0) / 360.0;
        let center_y = Self::mercator_y(self.center_lat);

        let scale = self.zoom * self.width as f64;

        let px = ((x - center_x) * scale + self.width as f64 / 2.0) as i32;
        let py = ((y - center_y) * scale + self.height as f64 / 2.0) as i32;

        (px, py)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= 0 && px < self.width as i32 && py >= 0 && py < self.height as i32
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
