//! Pickup times derived backwards from a fixed arrival time.
//!
//! Durations come from the same matrix the sequencer used, in seconds.
//! Times are wall-clock times of day and wrap around midnight.

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::geo::PickupPoint;

/// Shortest lead any pickup has over the arrival time, in seconds.
const MIN_LEAD_SECONDS: i64 = 1;

/// A pickup on a sequenced route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub point: PickupPoint,
    /// 1-based position in the visiting order.
    pub visit_order: usize,
    pub pickup_time: NaiveTime,
    /// When the rider must be ready, a fixed buffer before pickup.
    pub ready_time: NaiveTime,
    /// Driving time from this pickup to the destination, in seconds.
    ///
    /// Unlike the wall-clock times this never wraps, so it orders stops
    /// even for routes that cross midnight.
    pub seconds_before_arrival: i64,
}

/// Stamps pickup and ready times on every stop of a sequenced route.
///
/// `order` holds indices into `points` in visiting order and ends with the
/// destination index (`points.len()`); `durations` is indexed the same way.
/// Walking backwards from the destination, each leg's duration is added to a
/// running total and the stop's pickup time is `arrival - total`. Negative
/// leg durations count as zero, so pickup times never decrease along the
/// route. Every pickup leads the arrival by at least one second, even when
/// the last leg takes no time.
///
/// Fails on indices outside the matrix, non-pickup stops before the
/// destination, non-finite or unrepresentable durations, and a ready buffer
/// too large for a time delta.
pub fn propagate(
    points: &[PickupPoint],
    order: &[usize],
    durations: &[Vec<f64>],
    arrival: NaiveTime,
    ready_buffer_minutes: i64,
) -> Result<Vec<RouteStop>, ScheduleError> {
    let buffer = TimeDelta::try_minutes(ready_buffer_minutes)
        .ok_or(ScheduleError::InvalidBuffer(ready_buffer_minutes))?;
    let len = durations.len();
    if let Some(&index) = order.iter().find(|&&index| index >= len) {
        return Err(ScheduleError::IndexOutOfRange { index, len });
    }

    let mut cumulative = 0.0;
    let mut stops = Vec::with_capacity(order.len().saturating_sub(1));

    for position in (0..order.len().saturating_sub(1)).rev() {
        let (from, to) = (order[position], order[position + 1]);
        let seconds = durations[from]
            .get(to)
            .copied()
            .ok_or(ScheduleError::IndexOutOfRange { index: to, len: durations[from].len() })?;
        if !seconds.is_finite() {
            return Err(ScheduleError::InvalidDuration { from, to, seconds });
        }
        cumulative += seconds.max(0.0);

        let point = points
            .get(from)
            .ok_or(ScheduleError::NotAPickup { position })?;
        let seconds_before_arrival = (cumulative.round() as i64).max(MIN_LEAD_SECONDS);
        let lead = TimeDelta::try_seconds(seconds_before_arrival)
            .ok_or(ScheduleError::InvalidDuration { from, to, seconds })?;
        let pickup_time = wrapping_sub(arrival, lead);
        stops.push(RouteStop {
            point: point.clone(),
            visit_order: position + 1,
            pickup_time,
            ready_time: wrapping_sub(pickup_time, buffer),
            seconds_before_arrival,
        });
    }

    stops.reverse();
    Ok(stops)
}

/// Subtracts on a 24-hour clock face.
fn wrapping_sub(time: NaiveTime, delta: TimeDelta) -> NaiveTime {
    time.overflowing_sub_signed(delta).0
}
