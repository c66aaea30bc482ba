//! Clustering engine tests
//!
//! Coverage, capacity and determinism over real and synthetic pickups.

mod fixtures;

use std::collections::HashSet;

use ride_planner::cluster::{
    ClusterOptions, RandomSelector, SeededSelector, cluster, recommended_vehicle_count,
};
use ride_planner::geo::PickupPoint;
use ride_planner::traits::PointSelector;

use fixtures::las_vegas_locations::{self, pickups};

fn ids(points: &[PickupPoint]) -> HashSet<String> {
    points.iter().map(|p| p.id.clone()).collect()
}

/// Always seeds from the first `k` points.
struct FirstK;

impl PointSelector for FirstK {
    fn select(&mut self, _n: usize, k: usize) -> Vec<usize> {
        (0..k).collect()
    }
}

/// Returns whatever it was told to, ignoring `n` and `k`.
struct Scripted(Vec<usize>);

impl PointSelector for Scripted {
    fn select(&mut self, _n: usize, _k: usize) -> Vec<usize> {
        self.0.clone()
    }
}

#[test]
fn test_every_point_in_exactly_one_cluster() {
    let points = pickups(&las_vegas_locations::all_homes());
    let options = ClusterOptions::default();

    for seed in 0..10 {
        let clusters = cluster(&points, 8, &options, &mut SeededSelector::new(seed));
        let assigned: Vec<String> = clusters
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.id.clone()))
            .collect();

        assert_eq!(assigned.len(), points.len(), "seed {}: a point was lost or duplicated", seed);
        assert_eq!(assigned.iter().cloned().collect::<HashSet<_>>(), ids(&points));
        assert!(clusters.iter().all(|c| !c.is_empty()));
        assert!(clusters.len() <= 8);
    }
}

#[test]
fn test_capacity_respected_when_seats_suffice() {
    let points = pickups(&las_vegas_locations::spread_homes());
    let options = ClusterOptions::default();
    let max_vehicles = points.len().div_ceil(options.max_per_vehicle);

    for seed in 0..20 {
        let clusters = cluster(&points, max_vehicles, &options, &mut SeededSelector::new(seed));
        for (i, group) in clusters.iter().enumerate() {
            assert!(
                !group.is_over_capacity(options.max_per_vehicle),
                "seed {}: cluster {} has {} riders",
                seed,
                i,
                group.len()
            );
        }
    }
}

#[test]
fn test_five_points_two_vehicles() {
    let points = pickups(&las_vegas_locations::STRIP_HOMES[..5]);
    let options = ClusterOptions::default();

    let clusters = cluster(&points, 2, &options, &mut RandomSelector);

    let mut sizes: Vec<usize> = clusters.iter().map(|c| c.len()).collect();
    sizes.sort_unstable();
    assert!(sizes == vec![1, 4] || sizes == vec![2, 3], "unexpected split {:?}", sizes);
}

#[test]
fn test_fewer_points_than_vehicles_gives_singletons() {
    let points = pickups(&las_vegas_locations::HENDERSON_HOMES[..3]);
    let clusters = cluster(&points, 5, &ClusterOptions::default(), &mut RandomSelector);

    assert_eq!(clusters.len(), 3);
    for (group, point) in clusters.iter().zip(&points) {
        assert_eq!(group.points, vec![point.clone()]);
        assert_eq!(group.centroid, point.location);
    }
}

#[test]
fn test_empty_input() {
    let clusters = cluster(&[], 3, &ClusterOptions::default(), &mut RandomSelector);
    assert!(clusters.is_empty());
}

#[test]
fn test_same_seed_same_clusters() {
    let points = pickups(&las_vegas_locations::all_homes());
    let options = ClusterOptions::default();

    let first = cluster(&points, 6, &options, &mut SeededSelector::new(7));
    let second = cluster(&points, 6, &options, &mut SeededSelector::new(7));
    assert_eq!(first, second);
}

#[test]
fn test_separated_groups_stay_together() {
    // Henderson and North Las Vegas riders, seeded one per group.
    let mut homes = las_vegas_locations::HENDERSON_HOMES[..3].to_vec();
    homes.insert(1, las_vegas_locations::NORTH_EAST_HOMES[0].clone());
    homes.extend_from_slice(&las_vegas_locations::NORTH_EAST_HOMES[1..3]);
    let points = pickups(&homes);

    let options = ClusterOptions {
        desired_clusters: Some(2),
        ..ClusterOptions::default()
    };
    let clusters = cluster(&points, 2, &options, &mut FirstK);

    assert_eq!(clusters.len(), 2);
    let henderson: HashSet<String> =
        ["emp-0", "emp-2", "emp-3"].iter().map(|s| s.to_string()).collect();
    let north: HashSet<String> =
        ["emp-1", "emp-4", "emp-5"].iter().map(|s| s.to_string()).collect();
    let groups: Vec<HashSet<String>> = clusters.iter().map(|c| ids(&c.points)).collect();
    assert!(groups.contains(&henderson), "groups were {:?}", groups);
    assert!(groups.contains(&north), "groups were {:?}", groups);
}

#[test]
fn test_overflow_still_covers_every_point() {
    let points = pickups(&las_vegas_locations::STRIP_HOMES);
    let options = ClusterOptions::default();

    // 12 riders, 2 vehicles of 4 seats.
    let clusters = cluster(&points, 2, &options, &mut SeededSelector::new(3));

    let total: usize = clusters.iter().map(|c| c.len()).sum();
    assert_eq!(total, points.len());
    assert!(clusters.len() <= 2);
    assert!(clusters.iter().any(|c| c.is_over_capacity(options.max_per_vehicle)));
}

#[test]
fn test_recommended_count_follows_spread() {
    let strip = pickups(&las_vegas_locations::STRIP_HOMES[..8]);
    assert_eq!(recommended_vehicle_count(&strip, 10, 4), 2);

    let spread = pickups(&las_vegas_locations::spread_homes()[..8]);
    let count = recommended_vehicle_count(&spread, 10, 4);
    assert!((3..=4).contains(&count), "spread-out riders should get more vehicles, got {}", count);
    assert!(recommended_vehicle_count(&spread, 2, 4) == 2);
}

#[test]
fn test_misbehaving_selector_still_covers_every_point() {
    let points = pickups(&las_vegas_locations::spread_homes());
    let options = ClusterOptions::default();
    let max_vehicles = points.len().div_ceil(options.max_per_vehicle);

    let selections = [
        vec![points.len(), points.len() + 7, usize::MAX],
        vec![0, 0, 0, 0],
        Vec::new(),
        vec![1],
    ];
    for selection in selections {
        let label = format!("{:?}", selection);
        let clusters = cluster(&points, max_vehicles, &options, &mut Scripted(selection));

        let assigned: Vec<String> = clusters
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.id.clone()))
            .collect();
        assert_eq!(assigned.len(), points.len(), "selection {}", label);
        assert_eq!(assigned.into_iter().collect::<HashSet<_>>(), ids(&points));
        assert!(clusters.iter().all(|c| !c.is_empty()));
        assert!(clusters.len() <= max_vehicles);
    }
}
