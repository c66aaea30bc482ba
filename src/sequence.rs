//! Visiting-order search for a single vehicle.
//!
//! The matrix passed in covers the route's stops followed by the destination,
//! so for `n` stops it is `(n + 1) x (n + 1)` and the destination is index `n`.
//! Paths are open: they start at any stop and always end at the destination.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SequenceError;

/// Largest stop count solved exactly (8! = 40320 permutations).
pub const DEFAULT_EXACT_LIMIT: usize = 8;

/// Improvements smaller than this are treated as ties.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// A visiting order and its cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Matrix indices in visiting order, always ending with the destination.
    pub order: Vec<usize>,
    /// Sum of leg durations along `order`.
    pub total_cost: f64,
}

/// Finds a low-cost visiting order using the default exact-search limit.
pub fn sequence(durations: &[Vec<f64>]) -> Result<Sequence, SequenceError> {
    sequence_with_limit(durations, DEFAULT_EXACT_LIMIT)
}

/// Like [`sequence`], solving exactly up to `exact_limit` stops and
/// heuristically above it.
pub fn sequence_with_limit(
    durations: &[Vec<f64>],
    exact_limit: usize,
) -> Result<Sequence, SequenceError> {
    validate(durations)?;
    let stops = durations.len() - 1;
    let destination = stops;

    let order = match stops {
        0 => vec![destination],
        1 => vec![0, destination],
        _ if stops <= exact_limit => exhaustive(durations),
        _ => {
            let mut order = nearest_neighbor(durations);
            two_opt(&mut order, durations);
            order
        }
    };

    let total_cost = path_cost(&order, durations);
    debug!(stops, total_cost, "route sequenced");
    Ok(Sequence { order, total_cost })
}

fn validate(durations: &[Vec<f64>]) -> Result<(), SequenceError> {
    if durations.is_empty() {
        return Err(SequenceError::EmptyMatrix);
    }
    let expected = durations.len();
    match durations.iter().position(|row| row.len() != expected) {
        Some(row) => Err(SequenceError::NotSquare {
            row,
            len: durations[row].len(),
            expected,
        }),
        None => Ok(()),
    }
}

/// Sum of consecutive leg durations along `order`.
pub fn path_cost(order: &[usize], durations: &[Vec<f64>]) -> f64 {
    order
        .windows(2)
        .map(|leg| durations[leg[0]][leg[1]])
        .sum()
}

/// Tries every permutation of the stops in lexicographic order; the first
/// strictly cheapest one wins.
fn exhaustive(durations: &[Vec<f64>]) -> Vec<usize> {
    let destination = durations.len() - 1;
    let mut permutation: Vec<usize> = (0..destination).collect();
    let mut best = permutation.clone();
    let mut best_cost = f64::INFINITY;

    loop {
        let cost = open_cost(&permutation, durations, destination);
        if cost < best_cost {
            best_cost = cost;
            best.copy_from_slice(&permutation);
        }
        if !next_permutation(&mut permutation) {
            break;
        }
    }

    best.push(destination);
    best
}

/// Cost of visiting `stops` in order and then driving to `destination`.
fn open_cost(stops: &[usize], durations: &[Vec<f64>], destination: usize) -> f64 {
    let legs: f64 = stops.windows(2).map(|leg| durations[leg[0]][leg[1]]).sum();
    let last = stops.last().map_or(0.0, |&last| durations[last][destination]);
    legs + last
}

/// Rearranges into the next lexicographic permutation; false after the last one.
fn next_permutation(values: &mut [usize]) -> bool {
    let Some(pivot) = values.windows(2).rposition(|pair| pair[0] < pair[1]) else {
        return false;
    };
    let Some(successor) = values.iter().rposition(|&value| value > values[pivot]) else {
        return false;
    };
    values.swap(pivot, successor);
    values[pivot + 1..].reverse();
    true
}

/// Greedy tour starting at stop 0, with the destination appended.
pub fn nearest_neighbor(durations: &[Vec<f64>]) -> Vec<usize> {
    let destination = durations.len().saturating_sub(1);
    if destination == 0 {
        return vec![destination];
    }

    let mut visited = vec![false; destination];
    let mut order = Vec::with_capacity(destination + 1);
    let mut current = 0;
    visited[0] = true;
    order.push(0);

    while order.len() < destination {
        let mut next: Option<(usize, f64)> = None;
        for (candidate, &seen) in visited.iter().enumerate() {
            if seen {
                continue;
            }
            let cost = durations[current][candidate];
            if next.is_none_or(|(_, best)| cost < best) {
                next = Some((candidate, cost));
            }
        }
        let Some((candidate, _)) = next else {
            break;
        };
        visited[candidate] = true;
        order.push(candidate);
        current = candidate;
    }

    order.push(destination);
    order
}

/// 2-opt: reverse segments of stops while any reversal lowers the path cost.
///
/// The final element (the destination) never moves. The first improving
/// reversal found in a pass is applied and the pass restarts.
pub fn two_opt(order: &mut [usize], durations: &[Vec<f64>]) {
    if order.len() < 3 {
        return;
    }
    let stops = order.len() - 1;
    let mut current_cost = path_cost(order, durations);
    let mut passes = 0usize;

    'search: loop {
        passes += 1;
        for i in 0..stops - 1 {
            for j in i + 1..stops {
                order[i..=j].reverse();
                let cost = path_cost(order, durations);
                if cost + IMPROVEMENT_EPSILON < current_cost {
                    current_cost = cost;
                    continue 'search;
                }
                order[i..=j].reverse();
            }
        }
        break;
    }

    debug!(passes, cost = current_cost, "2-opt converged");
}
