//! ride-planner core
//!
//! Groups pickup points into vehicle-sized clusters, orders each cluster's
//! stops, schedules pickups backwards from a shared arrival time, and binds
//! drivers to the resulting routes through a serialized assignment queue.
//!
//! Planning ([`planner::plan_routes`]) is synchronous and may block on HTTP
//! when backed by [`osrm::OsrmClient`]; call it from a blocking context.
//! Driver assignment ([`assignment::AssignmentScheduler`]) runs on tokio.

pub mod assignment;
pub mod cluster;
pub mod config;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod haversine;
pub mod osrm;
pub mod planner;
pub mod polyline;
pub mod retry;
pub mod schedule;
pub mod sequence;
pub mod traits;
