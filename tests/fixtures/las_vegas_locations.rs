//! Real Las Vegas / Henderson addresses used as employee homes.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API, so they are
//! routable against the OSRM Nevada extract.

use ride_planner::geo::{Coordinate, PickupPoint};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Pickup for an employee living here.
    pub fn pickup(&self, id: impl Into<String>) -> PickupPoint {
        PickupPoint::new(id, self.lat, self.lng, self.name)
    }
}

/// Shared office every route ends at.
pub const OFFICE: Location = Location::new("Wynn Las Vegas", 36.1263781, -115.1658180);

// ============================================================================
// Strip (dense, all within a couple of kilometres)
// ============================================================================

pub const STRIP_HOMES: &[Location] = &[
    Location::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Location::new("Sinatra", 36.1300035, -115.1654850),
    Location::new("Public House", 36.1219193, -115.1689317),
    Location::new("The Crack Shack", 36.1050709, -115.1735287),
    Location::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Location::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Location::new("Spago by Wolfgang Puck", 36.1139368, -115.1741462),
    Location::new("Hash House A Go Go", 36.1181377, -115.1710989),
    Location::new("Otto Pizzeria", 36.1231219, -115.1684514),
    Location::new("Grand Lux Cafe", 36.1216416, -115.1685024),
    Location::new("Bacchanal Buffet", 36.1159581, -115.1762929),
    Location::new("Il Fornaio", 36.1024474, -115.1740110),
];

// ============================================================================
// Henderson
// ============================================================================

pub const HENDERSON_HOMES: &[Location] = &[
    Location::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Location::new("Islander's Grill", 36.0335058, -114.9856162),
    Location::new("Naga", 36.0137634, -114.9928676),
    Location::new("RibCage", 35.9949754, -115.0999810),
    Location::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Location::new("Sunset Station Area", 36.0614, -115.0631),
];

// ============================================================================
// North and East
// ============================================================================

pub const NORTH_EAST_HOMES: &[Location] = &[
    Location::new("Rivas Mexican Grill North", 36.1450055, -115.0482587),
    Location::new("Monarca Mexican Restaurant", 36.1440711, -115.0634197),
    Location::new("Beers and Bets", 36.1428945, -115.1573836),
    Location::new("Hello Tokyo", 36.1161627, -115.0902096),
    Location::new("Original Lindo Michoacan", 36.1294005, -115.1135106),
    Location::new("Sushi Twister", 36.1007300, -115.0526259),
];

// ============================================================================
// South Strip / Airport
// ============================================================================

pub const SOUTH_HOMES: &[Location] = &[
    Location::new("Bootlegger Bistro", 36.0492047, -115.1715744),
    Location::new("Denny's South", 36.0591086, -115.1717250),
    Location::new("Mikos Izakaya", 36.0429503, -115.1527627),
    Location::new("Budget Suites South", 36.0366259, -115.1713361),
    Location::new("Pei Wei Town Square", 36.0810469, -115.1472694),
];

/// Every home, grouped by area in declaration order.
pub fn all_homes() -> Vec<Location> {
    let mut all = Vec::new();
    all.extend_from_slice(STRIP_HOMES);
    all.extend_from_slice(HENDERSON_HOMES);
    all.extend_from_slice(NORTH_EAST_HOMES);
    all.extend_from_slice(SOUTH_HOMES);
    all
}

/// Pickups with ids `emp-0`, `emp-1`, ... for the given homes.
pub fn pickups(homes: &[Location]) -> Vec<PickupPoint> {
    homes
        .iter()
        .enumerate()
        .map(|(i, home)| home.pickup(format!("emp-{}", i)))
        .collect()
}

/// Homes spread across the metro area, interleaved so neighbours are far apart.
pub fn spread_homes() -> Vec<Location> {
    let areas = [STRIP_HOMES, HENDERSON_HOMES, NORTH_EAST_HOMES, SOUTH_HOMES];
    let longest = areas.iter().map(|area| area.len()).max().unwrap_or(0);
    (0..longest)
        .flat_map(|i| areas.iter().filter_map(move |area| area.get(i).cloned()))
        .collect()
}
