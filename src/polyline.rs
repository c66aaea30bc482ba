//! Polyline representation for route geometries.
//!
//! Geometry is kept as decoded (lat, lng) points internally. Conversion to
//! GeoJSON order or the compact encoded format happens at the boundary, when
//! reading an OSRM response or handing a route to a map view.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Precision used by the Google encoded polyline format (1e5).
const ENCODING_FACTOR: f64 = 1e5;

/// A route geometry as decoded coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Builds a polyline from GeoJSON `[lng, lat]` pairs.
    pub fn from_lng_lat(coordinates: &[[f64; 2]]) -> Self {
        Self {
            points: coordinates
                .iter()
                .map(|[lng, lat]| Coordinate::new(*lat, *lng))
                .collect(),
        }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// GeoJSON `[lng, lat]` pairs, as map renderers expect them.
    pub fn to_lng_lat(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|c| [c.lng, c.lat]).collect()
    }

    /// Great-circle length of the line in kilometers.
    pub fn length_km(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].haversine_km(&pair[1]))
            .sum()
    }

    /// Encodes the line in the Google polyline format (precision 5).
    pub fn encode(&self) -> String {
        let mut encoded = String::new();
        let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

        for point in &self.points {
            let lat = (point.lat * ENCODING_FACTOR).round() as i64;
            let lng = (point.lng * ENCODING_FACTOR).round() as i64;
            encode_value(lat - prev_lat, &mut encoded);
            encode_value(lng - prev_lng, &mut encoded);
            prev_lat = lat;
            prev_lng = lng;
        }

        encoded
    }

    /// Decodes a Google polyline string. Returns `None` on truncated input.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = encoded.as_bytes();
        let mut index = 0;
        let (mut lat, mut lng) = (0i64, 0i64);
        let mut points = Vec::new();

        while index < bytes.len() {
            lat += decode_value(bytes, &mut index)?;
            lng += decode_value(bytes, &mut index)?;
            points.push(Coordinate::new(
                lat as f64 / ENCODING_FACTOR,
                lng as f64 / ENCODING_FACTOR,
            ));
        }

        Some(Self { points })
    }
}

fn encode_value(value: i64, out: &mut String) {
    let mut value = if value < 0 { !(value << 1) } else { value << 1 };
    while value >= 0x20 {
        out.push((((value & 0x1f) | 0x20) as u8 + 63) as char);
        value >>= 5;
    }
    out.push((value as u8 + 63) as char);
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let byte = (*bytes.get(*index)? as i64) - 63;
        *index += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}
