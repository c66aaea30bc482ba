//! Collaborator seams for the routing engine.
//!
//! The engine owns clustering, sequencing, scheduling and driver assignment.
//! Everything else (road routing, geocoding, record storage, randomness) comes
//! in through these traits so callers can plug in their own implementations.

use serde::{Deserialize, Serialize};

use crate::assignment::{DriverRecord, RouteRecord};
use crate::error::{GeocodeError, RoutingError};
use crate::geo::Coordinate;
use crate::polyline::Polyline;

/// Pairwise travel costs between a set of locations.
///
/// Both matrices are indexed `[from][to]` in the order the locations were
/// supplied. Durations are in seconds, distances in meters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelMatrix {
    pub durations: Vec<Vec<f64>>,
    pub distances: Vec<Vec<f64>>,
}

impl TravelMatrix {
    pub fn size(&self) -> usize {
        self.durations.len()
    }

    /// Checks both matrices are `expected` x `expected`.
    pub fn ensure_size(&self, expected: usize) -> Result<(), RoutingError> {
        for matrix in [&self.durations, &self.distances] {
            if matrix.len() != expected {
                return Err(RoutingError::DimensionMismatch {
                    expected,
                    actual: matrix.len(),
                });
            }
            if let Some(row) = matrix.iter().find(|row| row.len() != expected) {
                return Err(RoutingError::DimensionMismatch {
                    expected,
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }
}

/// Provides a duration/distance matrix for a set of locations.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<TravelMatrix, RoutingError>;
}

/// Provides display geometry for an ordered list of locations.
pub trait RouteGeometryProvider {
    fn geometry_for(&self, ordered: &[Coordinate]) -> Result<Polyline, RoutingError>;
}

/// A resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub location: Coordinate,
    pub display_name: String,
}

/// Turns a free-text address into a coordinate.
pub trait Geocoder {
    fn geocode(&self, address: &str) -> Result<GeocodedAddress, GeocodeError>;
}

/// Chooses the initial k-means centroids.
pub trait PointSelector {
    /// Returns `k` distinct indices in `0..n`. Callers guarantee `k <= n`.
    fn select(&mut self, n: usize, k: usize) -> Vec<usize>;
}

/// Storage for the records the assignment scheduler mutates.
///
/// Implementations are owned by the scheduler's worker and are only ever
/// touched from that single task, so they need no internal locking.
/// Iteration order of `drivers` must be stable; it breaks load ties.
pub trait AssignmentStore: Send + 'static {
    fn drivers(&self) -> Vec<DriverRecord>;
    fn driver(&self, id: &str) -> Option<DriverRecord>;
    fn upsert_driver(&mut self, driver: DriverRecord);

    fn routes(&self) -> Vec<RouteRecord>;
    fn route(&self, id: &str) -> Option<RouteRecord>;
    fn upsert_route(&mut self, route: RouteRecord);

    /// Routes currently bound to the given driver.
    fn routes_for_driver(&self, driver_id: &str) -> Vec<RouteRecord> {
        self.routes()
            .into_iter()
            .filter(|route| route.assigned_driver_id.as_deref() == Some(driver_id))
            .collect()
    }
}
