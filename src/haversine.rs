//! Haversine travel estimates (fallback when OSRM is unavailable).
//!
//! Uses great-circle distance, a road coefficient and an assumed speed to
//! estimate travel. Less accurate than OSRM (ignores roads) but always
//! available, which also makes it the provider of choice in tests.

use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::traits::{DistanceMatrixProvider, RouteGeometryProvider, TravelMatrix};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Straight line to road distance ratio.
const DEFAULT_ROAD_COEFFICIENT: f64 = 1.3;

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
    /// Multiplier applied to the great-circle distance.
    pub road_coefficient: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            road_coefficient: DEFAULT_ROAD_COEFFICIENT,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64, road_coefficient: f64) -> Self {
        Self {
            speed_kmh,
            road_coefficient,
        }
    }

    /// Estimated road distance in meters.
    fn road_meters(&self, from: &Coordinate, to: &Coordinate) -> f64 {
        from.haversine_km(to) * self.road_coefficient * 1000.0
    }

    /// Convert a road distance in meters to travel time in seconds.
    fn meters_to_seconds(&self, meters: f64) -> f64 {
        let hours = meters / 1000.0 / self.speed_kmh;
        (hours * 3600.0).round()
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<TravelMatrix, RoutingError> {
        let n = locations.len();
        let mut durations = vec![vec![0.0; n]; n];
        let mut distances = vec![vec![0.0; n]; n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate() {
                if i != j {
                    let meters = self.road_meters(from, to);
                    distances[i][j] = meters.round();
                    durations[i][j] = self.meters_to_seconds(meters);
                }
            }
        }

        Ok(TravelMatrix { durations, distances })
    }
}

impl RouteGeometryProvider for HaversineMatrix {
    /// Straight segments between the stops.
    fn geometry_for(&self, ordered: &[Coordinate]) -> Result<Polyline, RoutingError> {
        Ok(Polyline::new(ordered.to_vec()))
    }
}
