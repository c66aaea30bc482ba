//! Test fixtures for ride-planner.
//!
//! Provides realistic test data and collaborator stubs:
//! - Real Las Vegas / Henderson homes (from OpenStreetMap)
//! - A Euclidean matrix provider for exact-cost assertions
//! - Request and date-time builders
//! - A containerised OSRM backend

#![allow(dead_code)]

pub mod las_vegas_locations;
pub mod osrm;

pub use las_vegas_locations::*;

use chrono::{NaiveDate, NaiveDateTime};

use ride_planner::error::RoutingError;
use ride_planner::geo::{Coordinate, PickupPoint};
use ride_planner::planner::PlanRequest;
use ride_planner::traits::{DistanceMatrixProvider, TravelMatrix};

pub fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

pub fn request(points: Vec<PickupPoint>, max_vehicles: usize) -> PlanRequest {
    PlanRequest {
        request_id: "morning".to_string(),
        points,
        destination: OFFICE.coordinate(),
        arrival: at(9, 0),
        max_vehicles,
    }
}

/// Durations are plain Euclidean distance in degrees times `scale`.
pub struct EuclideanMatrix {
    pub scale: f64,
}

impl DistanceMatrixProvider for EuclideanMatrix {
    fn matrix_for(&self, locations: &[Coordinate]) -> Result<TravelMatrix, RoutingError> {
        let durations: Vec<Vec<f64>> = locations
            .iter()
            .map(|a| locations.iter().map(|b| a.planar_distance(b) * self.scale).collect())
            .collect();
        Ok(TravelMatrix {
            distances: durations.clone(),
            durations,
        })
    }
}

/// Square matrix from points on a line, indexed in order.
pub fn line_matrix(positions: &[f64]) -> Vec<Vec<f64>> {
    positions
        .iter()
        .map(|a| positions.iter().map(|b| (a - b).abs()).collect())
        .collect()
}
