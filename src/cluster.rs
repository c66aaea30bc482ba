//! Capacity-constrained clustering of pickup points into vehicles.
//!
//! A k-means variant over raw lat/lon: points go to their nearest centroid,
//! over-full clusters shed their most recently added members to the nearest
//! cluster with room, then centroids move to the mean of their members.

use rand::rngs::SmallRng;
use rand::{SeedableRng, seq::index};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PlannerConfig;
use crate::geo::{Coordinate, PickupPoint, centroid};
use crate::traits::PointSelector;

/// Median pairwise distance under which riders share vehicles as tightly as possible.
const TIGHT_SPREAD_KM: f64 = 2.0;

/// Median pairwise distance over which vehicles take small groups.
const WIDE_SPREAD_KM: f64 = 10.0;

/// A group of pickups served by one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub points: Vec<PickupPoint>,
    pub centroid: Coordinate,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_over_capacity(&self, max_per_vehicle: usize) -> bool {
        self.points.len() > max_per_vehicle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOptions {
    pub max_per_vehicle: usize,
    pub max_iterations: usize,
    /// Largest centroid movement (degrees) that still counts as converged.
    pub epsilon: f64,
    /// Number of seed centroids; defaults to the fewest vehicles that seat everyone.
    pub desired_clusters: Option<usize>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self::from(&PlannerConfig::default())
    }
}

impl From<&PlannerConfig> for ClusterOptions {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            max_per_vehicle: config.max_per_vehicle,
            max_iterations: config.kmeans_max_iterations,
            epsilon: config.kmeans_epsilon,
            desired_clusters: None,
        }
    }
}

/// Non-deterministic seeding from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl PointSelector for RandomSelector {
    fn select(&mut self, n: usize, k: usize) -> Vec<usize> {
        index::sample(&mut rand::thread_rng(), n, k).into_vec()
    }
}

/// Reproducible seeding for tests and replays.
#[derive(Debug, Clone)]
pub struct SeededSelector {
    rng: SmallRng,
}

impl SeededSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl PointSelector for SeededSelector {
    fn select(&mut self, n: usize, k: usize) -> Vec<usize> {
        index::sample(&mut self.rng, n, k).into_vec()
    }
}

/// Partitions `points` into at most `max_vehicles` clusters.
///
/// Every input point appears in exactly one returned cluster and no cluster
/// is empty. Clusters respect `max_per_vehicle` whenever
/// `points.len() <= max_vehicles * max_per_vehicle`; beyond that the surplus is
/// pushed into the smallest clusters and logged.
pub fn cluster<S>(
    points: &[PickupPoint],
    max_vehicles: usize,
    options: &ClusterOptions,
    selector: &mut S,
) -> Vec<Cluster>
where
    S: PointSelector + ?Sized,
{
    let n = points.len();
    let max_vehicles = max_vehicles.max(1);
    let capacity = options.max_per_vehicle.max(1);

    if n <= max_vehicles {
        return points
            .iter()
            .map(|point| Cluster {
                points: vec![point.clone()],
                centroid: point.location,
            })
            .collect();
    }

    let desired = options.desired_clusters.unwrap_or_else(|| n.div_ceil(capacity));
    let k = max_vehicles.min(desired).clamp(1, n);
    let mut centroids: Vec<Coordinate> = seed_indices(selector.select(n, k), n, k)
        .into_iter()
        .map(|i| points[i].location)
        .collect();

    let mut members: Vec<Vec<usize>> = Vec::new();
    for iteration in 0..options.max_iterations.max(1) {
        members = vec![Vec::new(); centroids.len()];
        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, &point.location, |_| true).unwrap_or(0);
            members[nearest].push(i);
        }

        enforce_capacity(points, &mut centroids, &mut members, capacity, max_vehicles);

        let mut movement: f64 = 0.0;
        for (centroid_slot, group) in centroids.iter_mut().zip(&members) {
            if let Some(updated) = centroid(group.iter().map(|&i| &points[i].location)) {
                movement = movement.max(centroid_slot.planar_distance(&updated));
                *centroid_slot = updated;
            }
        }

        debug!(iteration, clusters = centroids.len(), movement, "k-means iteration");
        if movement < options.epsilon {
            break;
        }
    }

    let clusters: Vec<Cluster> = members
        .into_iter()
        .zip(centroids)
        .filter(|(group, _)| !group.is_empty())
        .map(|(group, centroid)| Cluster {
            points: group.into_iter().map(|i| points[i].clone()).collect(),
            centroid,
        })
        .collect();

    info!(points = n, clusters = clusters.len(), "pickup points clustered");
    clusters
}

/// Exactly `k` distinct indices below `n`, starting from the selector's picks.
///
/// Out-of-range and repeated picks are dropped; a short selection is topped up
/// with the lowest unused indices.
fn seed_indices(selected: Vec<usize>, n: usize, k: usize) -> Vec<usize> {
    let mut used = vec![false; n];
    let mut seeds = Vec::with_capacity(k);
    for i in selected.into_iter().chain(0..n) {
        if seeds.len() == k {
            break;
        }
        if i < n && !used[i] {
            used[i] = true;
            seeds.push(i);
        }
    }
    if seeds.len() < k {
        warn!(seeds = seeds.len(), k, "selector returned too few seed points");
    }
    seeds
}

/// Moves points out of over-full clusters until every cluster fits.
///
/// New clusters are opened while under `max_vehicles`; once all seats are
/// gone the point is forced into the smallest cluster, which then keeps the
/// extra member for the rest of this pass.
fn enforce_capacity(
    points: &[PickupPoint],
    centroids: &mut Vec<Coordinate>,
    members: &mut Vec<Vec<usize>>,
    capacity: usize,
    max_vehicles: usize,
) {
    let mut limits = vec![capacity; members.len()];

    while let Some(over) = (0..members.len()).find(|&c| members[c].len() > limits[c]) {
        let Some(point) = members[over].pop() else {
            break;
        };
        let location = points[point].location;

        let has_room = |c: usize| members[c].len() < limits[c];
        if let Some(target) = nearest_centroid(centroids, &location, has_room) {
            members[target].push(point);
        } else if centroids.len() < max_vehicles {
            centroids.push(location);
            members.push(vec![point]);
            limits.push(capacity);
        } else {
            let smallest = (0..members.len())
                .min_by_key(|&c| members[c].len())
                .unwrap_or(over);
            warn!(
                point = %points[point].id,
                cluster = smallest,
                "no vehicle has a free seat, exceeding capacity"
            );
            members[smallest].push(point);
            limits[smallest] = limits[smallest].max(members[smallest].len());
        }
    }
}

/// Index of the closest centroid accepted by `eligible`; the first wins ties.
fn nearest_centroid<F>(
    centroids: &[Coordinate],
    location: &Coordinate,
    eligible: F,
) -> Option<usize>
where
    F: Fn(usize) -> bool,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, centroid) in centroids.iter().enumerate() {
        if !eligible(index) {
            continue;
        }
        let distance = centroid.planar_distance(location);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Estimates how many vehicles the point spread calls for.
///
/// Tight groups (median pairwise distance under 2 km) fill every seat,
/// widely spread points (over 10 km) get a vehicle per pair, anything in
/// between a vehicle per three riders. The result never drops below the
/// seats-required minimum and never exceeds `max_vehicles`.
pub fn recommended_vehicle_count(
    points: &[PickupPoint],
    max_vehicles: usize,
    max_per_vehicle: usize,
) -> usize {
    let n = points.len();
    if n == 0 {
        return 0;
    }

    let max_vehicles = max_vehicles.max(1);
    let minimum = n.div_ceil(max_per_vehicle.max(1));
    if n == 1 {
        return 1;
    }

    let mut distances = Vec::with_capacity(n * (n - 1) / 2);
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            distances.push(a.location.haversine_km(&b.location));
        }
    }
    distances.sort_by(f64::total_cmp);
    let median = distances[distances.len() / 2];

    let estimate = if median < TIGHT_SPREAD_KM {
        minimum
    } else if median > WIDE_SPREAD_KM {
        n.div_ceil(2)
    } else {
        n.div_ceil(3)
    };

    debug!(median_km = median, estimate, "recommended vehicle count");
    estimate.max(minimum).min(max_vehicles)
}
