//! Driver assignment.
//!
//! Driver availability and route bindings are the only shared mutable state
//! in the engine. All of it lives inside a single worker task that drains a
//! bounded FIFO queue, so exactly one job is in its critical section at any
//! time and no per-driver locking is needed:
//!
//! ```text
//! caller ──Job + oneshot──▶ mpsc (FIFO) ──▶ worker ──▶ AssignmentEngine ──▶ store
//!    ▲                                         │
//!    └──────────────── result ─────────────────┘
//! ```
//!
//! A job goes `Queued → Running → Succeeded | Failed`. Callers may bound how
//! long they wait; a job whose caller has gone away is skipped when it
//! reaches the front of the queue. A panic inside the critical section is
//! caught, reported as a failure, and the worker moves on to the next job.
//!
//! The serialization point is process-local. Running several scheduler
//! instances against one store would need a transactional store instead.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::traits::AssignmentStore;

pub const NO_DRIVERS_MESSAGE: &str = "no available drivers for this time slot";

/// A driver as the scheduler sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    pub id: String,
    pub is_available: bool,
    /// When a busy driver frees up again.
    pub available_from: Option<NaiveDateTime>,
    /// Assignments so far, used to balance load.
    pub drives_count: u32,
    /// Seats in the driver's vehicle.
    pub capacity: usize,
}

impl DriverRecord {
    /// An available driver with no assignments yet.
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            is_available: true,
            available_from: None,
            drives_count: 0,
            capacity,
        }
    }

    /// Available at `start` either by flag or because their last drive ended.
    pub fn is_free_at(&self, start: NaiveDateTime) -> bool {
        self.is_available || self.available_from.is_some_and(|from| from <= start)
    }
}

/// A planned route's time window and binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Idle padding after the route in minutes; the scheduler default applies when unset.
    #[serde(rename = "restTime")]
    pub rest_minutes: Option<i64>,
    pub assigned_driver_id: Option<String>,
    /// Riders on the route.
    pub required_capacity: usize,
}

impl RouteRecord {
    /// True when this window, padded by `rest`, overlaps `existing`.
    pub fn conflicts_with(&self, existing: &RouteRecord, rest: TimeDelta) -> bool {
        windows_conflict(self.start_time, self.end_time, existing, rest)
    }
}

/// `start < existing.end + rest && end + rest > existing.start`
fn windows_conflict(
    start: NaiveDateTime,
    end: NaiveDateTime,
    existing: &RouteRecord,
    rest: TimeDelta,
) -> bool {
    start < existing.end_time + rest && end + rest > existing.start_time
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Succeeded,
    Failed,
}

/// Outcome of one assignment attempt. Failure here is an answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub status: AssignmentStatus,
    pub message: String,
    pub driver_id: Option<String>,
}

impl AssignmentResult {
    pub fn succeeded(driver_id: impl Into<String>) -> Self {
        let driver_id = driver_id.into();
        Self {
            status: AssignmentStatus::Succeeded,
            message: format!("assigned to driver {}", driver_id),
            driver_id: Some(driver_id),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AssignmentStatus::Failed,
            message: message.into(),
            driver_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AssignmentStatus::Succeeded
    }
}

/// Plain in-memory store keeping insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    drivers: Vec<DriverRecord>,
    routes: Vec<RouteRecord>,
}

impl InMemoryStore {
    pub fn new(drivers: Vec<DriverRecord>, routes: Vec<RouteRecord>) -> Self {
        Self { drivers, routes }
    }
}

impl AssignmentStore for InMemoryStore {
    fn drivers(&self) -> Vec<DriverRecord> {
        self.drivers.clone()
    }

    fn driver(&self, id: &str) -> Option<DriverRecord> {
        self.drivers.iter().find(|driver| driver.id == id).cloned()
    }

    fn upsert_driver(&mut self, driver: DriverRecord) {
        match self.drivers.iter_mut().find(|existing| existing.id == driver.id) {
            Some(existing) => *existing = driver,
            None => self.drivers.push(driver),
        }
    }

    fn routes(&self) -> Vec<RouteRecord> {
        self.routes.clone()
    }

    fn route(&self, id: &str) -> Option<RouteRecord> {
        self.routes.iter().find(|route| route.id == id).cloned()
    }

    fn upsert_route(&mut self, route: RouteRecord) {
        match self.routes.iter_mut().find(|existing| existing.id == route.id) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }
}

/// Point-in-time copy of the scheduler's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSnapshot {
    pub drivers: Vec<DriverRecord>,
    pub routes: Vec<RouteRecord>,
}

/// The assignment rules, run synchronously against a store.
///
/// Only the scheduler's worker calls this in production; it is public so the
/// rules can be exercised without a runtime.
#[derive(Debug)]
pub struct AssignmentEngine<S> {
    store: S,
    default_rest: TimeDelta,
}

impl<S: AssignmentStore> AssignmentEngine<S> {
    pub fn new(store: S, default_rest_minutes: i64) -> Self {
        Self {
            store,
            default_rest: TimeDelta::minutes(default_rest_minutes.max(0)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Negative rest times seeded straight into a store count as zero.
    fn rest_for(&self, route: &RouteRecord) -> TimeDelta {
        route
            .rest_minutes
            .map_or(self.default_rest, |minutes| TimeDelta::minutes(minutes.max(0)))
    }

    /// No padded overlap with the driver's routes, and free by `start`.
    fn is_free(
        &self,
        driver: &DriverRecord,
        start: NaiveDateTime,
        end: NaiveDateTime,
        rest: TimeDelta,
    ) -> bool {
        let conflicted = self
            .store
            .routes_for_driver(&driver.id)
            .iter()
            .any(|existing| windows_conflict(start, end, existing, rest));
        !conflicted && driver.is_free_at(start)
    }

    /// Binds the least-loaded eligible driver to the route.
    pub fn assign(&mut self, route_id: &str) -> AssignmentResult {
        let Some(mut route) = self.store.route(route_id) else {
            return AssignmentResult::failed("route not found");
        };
        if let Some(driver_id) = &route.assigned_driver_id {
            return AssignmentResult::failed(format!(
                "route already assigned to driver {}",
                driver_id
            ));
        }

        let rest = self.rest_for(&route);
        let chosen = self
            .store
            .drivers()
            .into_iter()
            .filter(|driver| driver.capacity >= route.required_capacity)
            .filter(|driver| self.is_free(driver, route.start_time, route.end_time, rest))
            .min_by_key(|driver| driver.drives_count);

        let Some(mut driver) = chosen else {
            warn!(route_id, "no driver available for route window");
            return AssignmentResult::failed(NO_DRIVERS_MESSAGE);
        };

        route.assigned_driver_id = Some(driver.id.clone());
        driver.is_available = false;
        driver.available_from = Some(route.end_time + rest);
        driver.drives_count += 1;

        info!(
            route_id,
            driver_id = %driver.id,
            drives = driver.drives_count,
            "driver assigned"
        );
        let result = AssignmentResult::succeeded(driver.id.clone());
        self.store.upsert_route(route);
        self.store.upsert_driver(driver);
        result
    }

    /// Whether the driver could take a route in this window. Read-only.
    pub fn check_availability(
        &self,
        driver_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> bool {
        match self.store.driver(driver_id) {
            Some(driver) => self.is_free(&driver, start, end, self.default_rest),
            None => {
                debug!(driver_id, "availability check for unknown driver");
                false
            }
        }
    }

    pub fn register_driver(&mut self, driver: DriverRecord) {
        self.store.upsert_driver(driver);
    }

    /// Adds or replaces a route. The window must not end before it starts
    /// and the rest time, when set, must not be negative.
    pub fn register_route(&mut self, route: RouteRecord) -> Result<(), SchedulerError> {
        if route.end_time < route.start_time {
            return Err(SchedulerError::InvalidWindow { route_id: route.id });
        }
        if route.rest_minutes.is_some_and(|minutes| minutes < 0) {
            return Err(SchedulerError::InvalidRestTime { route_id: route.id });
        }
        self.store.upsert_route(route);
        Ok(())
    }

    /// Marks a driver available again. False for unknown drivers.
    pub fn release_driver(&mut self, driver_id: &str) -> bool {
        let Some(mut driver) = self.store.driver(driver_id) else {
            return false;
        };
        driver.is_available = true;
        driver.available_from = None;
        self.store.upsert_driver(driver);
        true
    }

    /// Removes a route's binding and recomputes the driver's availability
    /// from their remaining routes. False when the route had no driver.
    pub fn unassign(&mut self, route_id: &str) -> bool {
        let Some(mut route) = self.store.route(route_id) else {
            return false;
        };
        let Some(driver_id) = route.assigned_driver_id.take() else {
            return false;
        };
        self.store.upsert_route(route);

        if let Some(mut driver) = self.store.driver(&driver_id) {
            driver.drives_count = driver.drives_count.saturating_sub(1);
            driver.available_from = self
                .store
                .routes_for_driver(&driver_id)
                .iter()
                .map(|remaining| remaining.end_time + self.rest_for(remaining))
                .max();
            driver.is_available = driver.available_from.is_none();
            self.store.upsert_driver(driver);
        }
        info!(route_id, driver_id = %driver_id, "driver unassigned");
        true
    }

    pub fn snapshot(&self) -> AssignmentSnapshot {
        AssignmentSnapshot {
            drivers: self.store.drivers(),
            routes: self.store.routes(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SchedulerError>>;

/// Work items on the assignment queue.
enum Job {
    Assign {
        route_id: String,
        respond_to: Reply<AssignmentResult>,
    },
    CheckAvailability {
        driver_id: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        respond_to: Reply<bool>,
    },
    RegisterDriver {
        driver: DriverRecord,
        respond_to: Reply<()>,
    },
    RegisterRoute {
        route: RouteRecord,
        respond_to: Reply<()>,
    },
    ReleaseDriver {
        driver_id: String,
        respond_to: Reply<bool>,
    },
    Unassign {
        route_id: String,
        respond_to: Reply<bool>,
    },
    Snapshot {
        respond_to: Reply<AssignmentSnapshot>,
    },
}

/// Owns the engine and works through the queue one job at a time.
struct AssignmentWorker<S> {
    engine: AssignmentEngine<S>,
    receiver: mpsc::Receiver<Job>,
}

impl<S: AssignmentStore> AssignmentWorker<S> {
    async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            self.handle(job);
        }
        debug!("assignment queue closed, worker exiting");
    }

    fn handle(&mut self, job: Job) {
        match job {
            Job::Assign { route_id, respond_to } => {
                self.guarded("assign", respond_to, |engine| Ok(engine.assign(&route_id)))
            }
            Job::CheckAvailability {
                driver_id,
                start,
                end,
                respond_to,
            } => self.guarded("check_availability", respond_to, |engine| {
                Ok(engine.check_availability(&driver_id, start, end))
            }),
            Job::RegisterDriver { driver, respond_to } => {
                self.guarded("register_driver", respond_to, |engine| {
                    engine.register_driver(driver);
                    Ok(())
                })
            }
            Job::RegisterRoute { route, respond_to } => {
                self.guarded("register_route", respond_to, |engine| engine.register_route(route))
            }
            Job::ReleaseDriver { driver_id, respond_to } => {
                self.guarded("release_driver", respond_to, |engine| {
                    Ok(engine.release_driver(&driver_id))
                })
            }
            Job::Unassign { route_id, respond_to } => {
                self.guarded("unassign", respond_to, |engine| Ok(engine.unassign(&route_id)))
            }
            Job::Snapshot { respond_to } => {
                self.guarded("snapshot", respond_to, |engine| Ok(engine.snapshot()))
            }
        }
    }

    /// Runs one critical section. The worker survives whatever happens inside.
    fn guarded<T, F>(&mut self, operation: &'static str, respond_to: Reply<T>, run: F)
    where
        F: FnOnce(&mut AssignmentEngine<S>) -> Result<T, SchedulerError>,
    {
        if respond_to.is_closed() {
            debug!(operation, "caller stopped waiting, skipping job");
            return;
        }

        debug!(operation, "job running");
        let outcome =
            catch_unwind(AssertUnwindSafe(|| run(&mut self.engine))).unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(operation, %message, "job panicked");
                Err(SchedulerError::Internal(message))
            });

        if respond_to.send(outcome).is_err() {
            debug!(operation, "caller stopped waiting before the result was ready");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Handle to the serialized assignment queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AssignmentScheduler {
    sender: mpsc::Sender<Job>,
    queue_wait: Option<Duration>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Job::Assign { .. } => "Assign",
            Job::CheckAvailability { .. } => "CheckAvailability",
            Job::RegisterDriver { .. } => "RegisterDriver",
            Job::RegisterRoute { .. } => "RegisterRoute",
            Job::ReleaseDriver { .. } => "ReleaseDriver",
            Job::Unassign { .. } => "Unassign",
            Job::Snapshot { .. } => "Snapshot",
        };
        f.write_str(name)
    }
}

impl AssignmentScheduler {
    /// Starts the worker on the current tokio runtime.
    ///
    /// The worker stops once every handle has been dropped and the queue is drained.
    pub fn spawn<S: AssignmentStore>(store: S, config: SchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = AssignmentWorker {
            engine: AssignmentEngine::new(store, config.default_rest_minutes),
            receiver,
        };
        tokio::spawn(worker.run());

        Self {
            sender,
            queue_wait: config.queue_wait,
        }
    }

    async fn request<T>(&self, job: impl FnOnce(Reply<T>) -> Job) -> Result<T, SchedulerError> {
        let (respond_to, response) = oneshot::channel();
        let job = job(respond_to);
        debug!(?job, "job queued");

        let round_trip = async {
            self.sender.send(job).await.map_err(|_| SchedulerError::QueueClosed)?;
            response.await.map_err(|_| SchedulerError::QueueClosed)?
        };

        match self.queue_wait {
            Some(wait) => tokio::time::timeout(wait, round_trip)
                .await
                .map_err(|_| SchedulerError::TimedOut)?,
            None => round_trip.await,
        }
    }

    /// Finds, reserves and binds a driver for a registered route.
    ///
    /// Queue problems are folded into a failed result so callers always get
    /// an answer.
    pub async fn assign(&self, route_id: &str) -> AssignmentResult {
        let route_id = route_id.to_string();
        match self
            .request(|respond_to| Job::Assign {
                route_id: route_id.clone(),
                respond_to,
            })
            .await
        {
            Ok(result) => result,
            Err(err) => {
                warn!(route_id = %route_id, error = %err, "assignment did not complete");
                AssignmentResult::failed(err.to_string())
            }
        }
    }

    /// Runs the assignment conflict rules for one driver without changing anything.
    pub async fn check_availability(
        &self,
        driver_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<bool, SchedulerError> {
        self.request(|respond_to| Job::CheckAvailability {
            driver_id: driver_id.to_string(),
            start,
            end,
            respond_to,
        })
        .await
    }

    pub async fn register_driver(&self, driver: DriverRecord) -> Result<(), SchedulerError> {
        self.request(|respond_to| Job::RegisterDriver { driver, respond_to }).await
    }

    pub async fn register_route(&self, route: RouteRecord) -> Result<(), SchedulerError> {
        self.request(|respond_to| Job::RegisterRoute { route, respond_to }).await
    }

    pub async fn release_driver(&self, driver_id: &str) -> Result<bool, SchedulerError> {
        self.request(|respond_to| Job::ReleaseDriver {
            driver_id: driver_id.to_string(),
            respond_to,
        })
        .await
    }

    pub async fn unassign(&self, route_id: &str) -> Result<bool, SchedulerError> {
        self.request(|respond_to| Job::Unassign {
            route_id: route_id.to_string(),
            respond_to,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<AssignmentSnapshot, SchedulerError> {
        self.request(|respond_to| Job::Snapshot { respond_to }).await
    }
}
