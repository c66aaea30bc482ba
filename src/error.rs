//! Error types, one enum per concern.
//!
//! "No driver available" and similar scheduling outcomes are not errors; they
//! are reported through [`crate::assignment::AssignmentResult`].

use thiserror::Error;

/// Failures of the external routing collaborator (distance matrix, geometry).
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing response was malformed: {0}")]
    MalformedResponse(String),
    #[error("matrix has {actual} rows, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("routing provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the external geocoding collaborator.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no result for address '{address}'")]
    NotFound { address: String },
    #[error("geocoding response was malformed: {0}")]
    Malformed(String),
}

/// Invalid input to the route sequencer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("duration matrix is empty; the destination row is required")]
    EmptyMatrix,
    #[error("duration matrix row {row} has {len} columns, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },
}

/// Invalid input to the schedule propagator.
#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("visiting order index {index} is outside the {len}x{len} duration matrix")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("visiting order position {position} is not a pickup point")]
    NotAPickup { position: usize },
    #[error("leg {from} -> {to} has unusable duration {seconds}")]
    InvalidDuration { from: usize, to: usize, seconds: f64 },
    #[error("ready buffer of {0} minutes is out of range")]
    InvalidBuffer(i64),
}

/// Request-level failures of the planning pipeline.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no pickup points supplied")]
    NoPickups,
    #[error("vehicle cap must be positive")]
    InvalidVehicleCap,
    #[error("coordinate for '{id}' is missing or out of range")]
    InvalidCoordinate { id: String },
    #[error("{points} pickups exceed the {seats} seats available")]
    InsufficientCapacity { points: usize, seats: usize },
    #[error("routing failed for cluster {cluster}: {source}")]
    Routing {
        cluster: usize,
        #[source]
        source: RoutingError,
    },
    #[error("sequencing failed for cluster {cluster}: {source}")]
    Sequence {
        cluster: usize,
        #[source]
        source: SequenceError,
    },
    #[error("scheduling failed for cluster {cluster}: {source}")]
    Schedule {
        cluster: usize,
        #[source]
        source: ScheduleError,
    },
}

/// Failures of the scheduler queue itself, as opposed to assignment outcomes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("assignment queue is closed")]
    QueueClosed,
    #[error("timed out waiting for the assignment queue")]
    TimedOut,
    #[error("route '{route_id}' ends before it starts")]
    InvalidWindow { route_id: String },
    #[error("route '{route_id}' has a negative rest time")]
    InvalidRestTime { route_id: String },
    #[error("internal error in assignment job: {0}")]
    Internal(String),
}

/// An environment override could not be parsed.
#[derive(Debug, Error)]
#[error("invalid value '{value}' for {key}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}
