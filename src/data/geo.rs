use crate::error::LoadError;
use geojson::{Feature, GeoJson, Geometry, Value};
use glam::DVec2;
use std::fs;
use std::path::Path;

/// A polygon ring as (lon, lat) pairs
pub type Ring = Vec<(f64, f64)>;

/// A country shape with its resolved ISO-2 code and display name
#[derive(Clone, Debug)]
pub struct Country {
    pub iso2: Option<String>,
    pub name: String,
    /// Exterior rings of every polygon part
    pub rings: Vec<Ring>,
    /// (min_lon, min_lat, max_lon, max_lat)
    pub bbox: (f64, f64, f64, f64),
}

impl Country {
    pub fn new(iso2: Option<String>, name: String, rings: Vec<Ring>) -> Self {
        let bbox = bounding_box(&rings);
        Self { iso2, name, rings, bbox }
    }

    /// Area-weighted centroid of all rings, in (lon, lat)
    pub fn centroid(&self) -> (f64, f64) {
        let mut weighted = DVec2::ZERO;
        let mut total_area = 0.0;
        for ring in &self.rings {
            let (area, centroid) = ring_area_centroid(ring);
            weighted += centroid * area.abs();
            total_area += area.abs();
        }
        if total_area > f64::EPSILON {
            let c = weighted / total_area;
            (c.x, c.y)
        } else {
            let (min_lon, min_lat, max_lon, max_lat) = self.bbox;
            ((min_lon + max_lon) / 2.0, (min_lat + max_lat) / 2.0)
        }
    }

    /// Point-in-polygon test over all parts (even-odd rule)
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let (min_lon, min_lat, max_lon, max_lat) = self.bbox;
        if lon < min_lon || lon > max_lon || lat < min_lat || lat > max_lat {
            return false;
        }
        let p = DVec2::new(lon, lat);
        self.rings.iter().any(|ring| ring_contains(ring, p))
    }
}

fn bounding_box(rings: &[Ring]) -> (f64, f64, f64, f64) {
    let mut bbox = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for &(lon, lat) in rings.iter().flatten() {
        bbox.0 = bbox.0.min(lon);
        bbox.1 = bbox.1.min(lat);
        bbox.2 = bbox.2.max(lon);
        bbox.3 = bbox.3.max(lat);
    }
    if bbox.0 > bbox.2 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        bbox
    }
}

/// Signed area and centroid of a ring (shoelace formula)
fn ring_area_centroid(ring: &Ring) -> (f64, DVec2) {
    let mut area = 0.0;
    let mut c = DVec2::ZERO;
    for w in ring.windows(2) {
        let a = DVec2::new(w[0].0, w[0].1);
        let b = DVec2::new(w[1].0, w[1].1);
        let cross = a.perp_dot(b);
        area += cross;
        c += (a + b) * cross;
    }
    area *= 0.5;
    if area.abs() > f64::EPSILON {
        (area, c / (6.0 * area))
    } else {
        (0.0, DVec2::ZERO)
    }
}

fn ring_contains(ring: &Ring, p: DVec2) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > p.y) != (yj > p.y) && p.x < (xj - xi) * (p.y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Load country polygons from a GeoJSON FeatureCollection. Antarctica is dropped.
pub fn load_countries(path: &Path) -> Result<Vec<Country>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_countries(&content).map_err(|source| LoadError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

pub fn parse_countries(content: &str) -> Result<Vec<Country>, geojson::Error> {
    let geojson: GeoJson = content.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => Vec::new(),
    };

    Ok(features
        .iter()
        .filter_map(|feature| {
            let rings = feature
                .geometry
                .as_ref()
                .map(polygon_rings)
                .unwrap_or_default();
            if rings.is_empty() {
                return None;
            }
            let iso2 = iso2_from_feature(feature);
            if iso2.as_deref() == Some("AQ") {
                return None;
            }
            Some(Country::new(iso2, name_from_feature(feature), rings))
        })
        .collect())
}

/// Resolve an ISO-2 code from the usual property spellings
fn iso2_from_feature(feature: &Feature) -> Option<String> {
    const KEYS: [&str; 6] = ["ISO_A2", "ISO2", "iso2", "iso_a2", "A2", "ISO3166-1-Alpha-2"];
    let props = feature.properties.as_ref()?;

    let code = KEYS.iter().find_map(|k| {
        let v = props.get(*k)?;
        if let Some(s) = v.as_str() {
            let s = s.trim();
            (!s.is_empty() && s != "-99").then(|| s.to_uppercase())
        } else {
            // Numeric -99 marks "no code"
            None
        }
    });
    if code.is_some() {
        return code;
    }

    let name = ["ADMIN", "NAME", "name"]
        .iter()
        .find_map(|k| props.get(*k).and_then(|v| v.as_str()))
        .unwrap_or("")
        .to_lowercase();
    match name.as_str() {
        "france" => Some("FR".to_string()),
        "norway" => Some("NO".to_string()),
        _ => None,
    }
}

fn name_from_feature(feature: &Feature) -> String {
    const KEYS: [&str; 6] = ["ADMIN", "NAME", "name", "admin", "NAME_EN", "BRK_NAME"];
    feature
        .properties
        .as_ref()
        .and_then(|p| {
            KEYS.iter()
                .find_map(|k| p.get(*k).and_then(|v| v.as_str()).map(str::trim))
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("Region")
        .to_string()
}

fn polygon_rings(geometry: &Geometry) -> Vec<Ring> {
    let mut out = Vec::new();
    collect_rings(geometry, &mut out);
    out
}

fn collect_rings(geometry: &Geometry, out: &mut Vec<Ring>) {
    match &geometry.value {
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                out.push(exterior.iter().map(|c| (c[0], c[1])).collect());
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    out.push(exterior.iter().map(|c| (c[0], c[1])).collect());
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_rings(g, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"ISO_A2": "it", "ADMIN": "Italy"},
             "geometry": {"type": "Polygon", "coordinates": [[[6,36],[18,36],[18,47],[6,47],[6,36]]]}},
            {"type": "Feature", "properties": {"ISO_A2": "-99", "ADMIN": "France"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[-5,42],[8,42],[8,51],[-5,51],[-5,42]]]]}},
            {"type": "Feature", "properties": {"ISO_A2": "AQ", "ADMIN": "Antarctica"},
             "geometry": {"type": "Polygon", "coordinates": [[[-180,-90],[180,-90],[180,-60],[-180,-60],[-180,-90]]]}},
            {"type": "Feature", "properties": {"ISO_A2": -99},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"name": "Nowhere"}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_parse_resolves_codes_and_drops_antarctica() {
        let countries = parse_countries(COLLECTION).unwrap();
        assert_eq!(countries.len(), 3);
        assert_eq!(countries[0].iso2.as_deref(), Some("IT"));
        assert_eq!(countries[0].name, "Italy");
        assert_eq!(countries[1].iso2.as_deref(), Some("FR"));
        assert_eq!(countries[2].iso2, None);
        assert_eq!(countries[2].name, "Region");
    }

    #[test]
    fn test_contains_and_centroid() {
        let countries = parse_countries(COLLECTION).unwrap();
        let italy = &countries[0];
        assert!(italy.contains(12.0, 42.0));
        assert!(!italy.contains(20.0, 42.0));
        let (lon, lat) = italy.centroid();
        assert!((lon - 12.0).abs() < 1e-9);
        assert!((lat - 41.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_geojson_errors() {
        assert!(parse_countries("{\"type\": \"Nope\"}").is_err());
    }
}
