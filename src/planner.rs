//! End-to-end planning: pickups in, scheduled vehicle routes out.
//!
//! Clustering and sequencing are pure functions of the request, so clusters
//! are sequenced in parallel. Only [`dispatch`] touches shared state, and it
//! does so through the serialized [`AssignmentScheduler`].

use chrono::{NaiveDateTime, TimeDelta};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::assignment::{AssignmentResult, AssignmentScheduler, RouteRecord};
use crate::cluster::{Cluster, ClusterOptions, cluster, recommended_vehicle_count};
use crate::config::PlannerConfig;
use crate::error::{PlanError, RoutingError};
use crate::geo::{Coordinate, PickupPoint};
use crate::polyline::Polyline;
use crate::retry::with_retry;
use crate::schedule::{RouteStop, propagate};
use crate::sequence::{path_cost, sequence_with_limit};
use crate::traits::{DistanceMatrixProvider, PointSelector, RouteGeometryProvider, TravelMatrix};

/// One routing request: everyone travels to the same destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Prefix for the generated route ids.
    pub request_id: String,
    pub points: Vec<PickupPoint>,
    pub destination: Coordinate,
    /// When every vehicle must reach the destination.
    pub arrival: NaiveDateTime,
    pub max_vehicles: usize,
}

/// A sequenced, scheduled route for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRoute {
    pub id: String,
    /// Pickups in visiting order.
    pub stops: Vec<RouteStop>,
    pub destination: Coordinate,
    /// Seconds from the first pickup to the destination.
    pub total_duration_secs: f64,
    pub total_distance_m: f64,
    pub arrival: NaiveDateTime,
    pub rest_minutes: i64,
    pub driver_id: Option<String>,
    /// Display geometry; empty until [`attach_geometry`] fills it.
    #[serde(default)]
    pub geometry: Polyline,
}

impl VehicleRoute {
    /// Departure from the first pickup.
    pub fn start_time(&self) -> NaiveDateTime {
        self.arrival - TimeDelta::seconds(self.total_duration_secs.round() as i64)
    }

    /// Stop coordinates in visiting order, ending at the destination.
    pub fn waypoints(&self) -> Vec<Coordinate> {
        self.stops
            .iter()
            .map(|stop| stop.point.location)
            .chain(std::iter::once(self.destination))
            .collect()
    }

    /// The record the assignment scheduler stores for this route.
    pub fn record(&self) -> RouteRecord {
        RouteRecord {
            id: self.id.clone(),
            start_time: self.start_time(),
            end_time: self.arrival,
            rest_minutes: Some(self.rest_minutes),
            assigned_driver_id: self.driver_id.clone(),
            required_capacity: self.stops.len(),
        }
    }
}

fn validate(request: &PlanRequest, config: &PlannerConfig) -> Result<(), PlanError> {
    if request.points.is_empty() {
        return Err(PlanError::NoPickups);
    }
    if request.max_vehicles == 0 || config.max_per_vehicle == 0 {
        return Err(PlanError::InvalidVehicleCap);
    }
    if !request.destination.is_valid() {
        return Err(PlanError::InvalidCoordinate {
            id: "destination".to_string(),
        });
    }
    if let Some(point) = request.points.iter().find(|point| !point.location.is_valid()) {
        return Err(PlanError::InvalidCoordinate { id: point.id.clone() });
    }

    let seats = request.max_vehicles.saturating_mul(config.max_per_vehicle);
    if request.points.len() > seats {
        return Err(PlanError::InsufficientCapacity {
            points: request.points.len(),
            seats,
        });
    }
    Ok(())
}

/// Clusters, sequences and schedules the request's pickups.
///
/// Invalid requests are rejected before any work is done. A routing failure
/// for any cluster (after retries) fails the whole request, naming the cluster.
pub fn plan_routes<M, S>(
    request: &PlanRequest,
    matrix_provider: &M,
    config: &PlannerConfig,
    selector: &mut S,
) -> Result<Vec<VehicleRoute>, PlanError>
where
    M: DistanceMatrixProvider + Sync,
    S: PointSelector + ?Sized,
{
    validate(request, config)?;

    let mut options = ClusterOptions::from(config);
    if config.use_recommended_count {
        options.desired_clusters = Some(recommended_vehicle_count(
            &request.points,
            request.max_vehicles,
            config.max_per_vehicle,
        ));
    }
    let clusters = cluster(&request.points, request.max_vehicles, &options, selector);

    let routes = clusters
        .par_iter()
        .enumerate()
        .map(|(index, group)| plan_cluster(index, group, request, matrix_provider, config))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        request_id = %request.request_id,
        pickups = request.points.len(),
        routes = routes.len(),
        "routes planned"
    );
    Ok(routes)
}

fn plan_cluster<M>(
    index: usize,
    group: &Cluster,
    request: &PlanRequest,
    matrix_provider: &M,
    config: &PlannerConfig,
) -> Result<VehicleRoute, PlanError>
where
    M: DistanceMatrixProvider,
{
    let locations: Vec<Coordinate> = group
        .points
        .iter()
        .map(|point| point.location)
        .chain(std::iter::once(request.destination))
        .collect();

    let fetch = || -> Result<TravelMatrix, RoutingError> {
        let matrix = matrix_provider.matrix_for(&locations)?;
        matrix.ensure_size(locations.len())?;
        Ok(matrix)
    };
    let matrix = with_retry(&config.retry, "distance_matrix", fetch)
        .map_err(|source| PlanError::Routing { cluster: index, source })?;

    let sequence = sequence_with_limit(&matrix.durations, config.exact_search_limit)
        .map_err(|source| PlanError::Sequence { cluster: index, source })?;

    let stops = propagate(
        &group.points,
        &sequence.order,
        &matrix.durations,
        request.arrival.time(),
        config.ready_buffer_minutes,
    )
    .map_err(|source| PlanError::Schedule { cluster: index, source })?;

    Ok(VehicleRoute {
        id: format!("{}-{}", request.request_id, index + 1),
        stops,
        destination: request.destination,
        total_duration_secs: sequence.total_cost,
        total_distance_m: path_cost(&sequence.order, &matrix.distances),
        arrival: request.arrival,
        rest_minutes: config.rest_minutes,
        driver_id: None,
        geometry: Polyline::default(),
    })
}

/// Fills in display geometry. Failures only leave the geometry empty.
pub fn attach_geometry<G>(routes: &mut [VehicleRoute], provider: &G)
where
    G: RouteGeometryProvider + ?Sized,
{
    for route in routes.iter_mut() {
        match provider.geometry_for(&route.waypoints()) {
            Ok(geometry) => route.geometry = geometry,
            Err(err) => warn!(route_id = %route.id, error = %err, "route geometry unavailable"),
        }
    }
}

/// Registers each route with the scheduler and asks for a driver.
///
/// Routes that get no driver are kept; their failed result is returned
/// alongside the others, in route order.
pub async fn dispatch(
    routes: &mut [VehicleRoute],
    scheduler: &AssignmentScheduler,
) -> Vec<AssignmentResult> {
    let mut results = Vec::with_capacity(routes.len());

    for route in routes.iter_mut() {
        if let Err(err) = scheduler.register_route(route.record()).await {
            warn!(route_id = %route.id, error = %err, "route could not be registered");
            results.push(AssignmentResult::failed(err.to_string()));
            continue;
        }

        let result = scheduler.assign(&route.id).await;
        match &result.driver_id {
            Some(driver_id) => route.driver_id = Some(driver_id.clone()),
            None => warn!(
                route_id = %route.id,
                reason = %result.message,
                "route saved without a driver"
            ),
        }
        results.push(result);
    }

    results
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn request(points: usize, max_vehicles: usize) -> PlanRequest {
        PlanRequest {
            request_id: "test".to_string(),
            points: (0..points)
                .map(|i| {
                    PickupPoint::new(format!("e{}", i), 36.1 + i as f64 * 0.01, -115.1, "home")
                })
                .collect(),
            destination: Coordinate::new(36.2, -115.2),
            arrival: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(9, 0, 0).unwrap(),
            max_vehicles,
        }
    }

    #[test]
    fn test_validation_errors() {
        let config = PlannerConfig::default();
        assert!(matches!(validate(&request(0, 2), &config), Err(PlanError::NoPickups)));
        assert!(matches!(validate(&request(3, 0), &config), Err(PlanError::InvalidVehicleCap)));
        assert!(matches!(
            validate(&request(9, 2), &config),
            Err(PlanError::InsufficientCapacity { points: 9, seats: 8 })
        ));

        let mut bad = request(2, 2);
        bad.points[1].location.lat = f64::NAN;
        assert!(matches!(
            validate(&bad, &config),
            Err(PlanError::InvalidCoordinate { id }) if id == "e1"
        ));

        let mut no_destination = request(2, 2);
        no_destination.destination = Coordinate::new(f64::NAN, f64::NAN);
        assert!(matches!(
            validate(&no_destination, &config),
            Err(PlanError::InvalidCoordinate { id }) if id == "destination"
        ));
        assert!(validate(&request(8, 2), &config).is_ok());
    }

    #[test]
    fn test_route_window_and_record() {
        let arrival = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(0, 10, 0).unwrap();
        let route = VehicleRoute {
            id: "r".to_string(),
            stops: Vec::new(),
            destination: Coordinate::new(0.0, 0.0),
            total_duration_secs: 1800.0,
            total_distance_m: 0.0,
            arrival,
            rest_minutes: 15,
            driver_id: None,
            geometry: Polyline::default(),
        };

        // Crossing midnight moves the start to the previous day.
        let start = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap().and_hms_opt(23, 40, 0).unwrap();
        assert_eq!(route.start_time(), start);
        let record = route.record();
        assert_eq!(record.start_time, start);
        assert_eq!(record.end_time, arrival);
        assert_eq!(record.rest_minutes, Some(15));
    }
}
