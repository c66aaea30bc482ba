//! Coordinates, pickup points and the small amount of geometry the engine needs.

use serde::{Deserialize, Serialize};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Euclidean distance in raw lat/lon space (degrees).
    ///
    /// This is what the clustering step minimises; it is not a travel distance.
    pub fn planar_distance(&self, other: &Coordinate) -> f64 {
        let d_lat = self.lat - other.lat;
        let d_lng = self.lng - other.lng;
        (d_lat * d_lat + d_lng * d_lng).sqrt()
    }

    /// Great-circle distance in kilometers.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// A geocoded employee pickup location.
///
/// Created per routing request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupPoint {
    /// Employee or stop reference supplied by the caller.
    pub id: String,
    pub location: Coordinate,
    pub label: String,
}

impl PickupPoint {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: Coordinate::new(lat, lng),
            label: label.into(),
        }
    }
}

/// Arithmetic mean of the given coordinates, `None` for an empty slice.
pub fn centroid<'a, I>(coordinates: I) -> Option<Coordinate>
where
    I: IntoIterator<Item = &'a Coordinate>,
{
    let (count, lat, lng) = coordinates
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(count, lat, lng), c| (count + 1, lat + c.lat, lng + c.lng));

    if count == 0 {
        None
    } else {
        Some(Coordinate::new(lat / count as f64, lng / count as f64))
    }
}
