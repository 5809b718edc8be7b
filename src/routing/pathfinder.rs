//! Turn-penalized grid search
//!
//! The search aims for few corners rather than short distance. It walks from
//! the start cell towards the goal, preferring to continue straight as long as
//! that keeps it on the current distance threshold, and falls back to the
//! cheapest unexpanded frontier cell otherwise. Every cell remembers the
//! cheapest turn count seen so far and the neighbour that produced it; the
//! final route follows those links back from the goal.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use super::error::RoutingError;
use super::grid::{Grid, GridCell};
use super::types::Direction;

/// One cell of a route together with the direction it was entered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub cell: GridCell,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy)]
struct Cost {
    turns: u32,
    parent: Option<(i64, i64)>,
    direction: Direction,
}

/// Frontier cells bucketed by Manhattan distance to the goal
///
/// A cell present in any bucket has been seen and is never re-queued; the
/// flag records whether the search already moved onto it.
type Frontier = BTreeMap<i64, BTreeMap<(i64, i64), bool>>;

/// Find a route and compress it to its breakpoints
pub fn find_path(
    grid: &Grid,
    start: GridCell,
    goal: GridCell,
    start_direction: Direction,
    max_iterations: usize,
) -> Result<Vec<GridCell>, RoutingError> {
    let steps = search(grid, start, goal, start_direction, max_iterations)?;
    Ok(compress_path(&steps))
}

/// Find a route and return every cell along it
pub fn search(
    grid: &Grid,
    start: GridCell,
    goal: GridCell,
    start_direction: Direction,
    max_iterations: usize,
) -> Result<Vec<Step>, RoutingError> {
    if start.key() == goal.key() {
        return Ok(vec![Step {
            cell: start,
            direction: start_direction,
        }]);
    }

    let mut costs: HashMap<(i64, i64), Cost> = HashMap::new();
    costs.insert(
        start.key(),
        Cost {
            turns: 0,
            parent: None,
            direction: start_direction,
        },
    );

    let mut frontier: Frontier = BTreeMap::new();
    frontier
        .entry(start.manhattan(&goal))
        .or_default()
        .insert(start.key(), true);

    let mut threshold = start.manhattan(&goal);
    let mut current = start;
    let mut direction = start_direction;
    let mut iterations = 0;

    loop {
        if iterations >= max_iterations {
            return Err(RoutingError::exhausted(iterations, start.key(), goal.key()));
        }
        iterations += 1;

        let turns_here = costs.get(&current.key()).map_or(0, |c| c.turns);
        let mut next = None;

        for (step_direction, neighbor) in grid.neighbors(&current) {
            let turns = turns_here + u32::from(step_direction != direction);
            relax(&mut costs, neighbor.key(), turns, current.key(), step_direction);

            if neighbor.key() == goal.key() {
                debug!(
                    "route {:?} -> {:?} found after {} iterations",
                    start.key(),
                    goal.key(),
                    iterations
                );
                return trace_back(grid, &costs, start, goal, start_direction, iterations);
            }

            let distance = neighbor.manhattan(&goal);
            let bucket = frontier.entry(distance).or_default();
            if bucket.contains_key(&neighbor.key()) {
                continue;
            }
            bucket.insert(neighbor.key(), false);

            if distance < threshold {
                threshold = distance;
            }
            if next.is_none() && distance == threshold && step_direction == direction {
                next = Some(neighbor.key());
            }
        }

        let key = match next {
            Some(key) => key,
            None => match cheapest_unexpanded(&frontier, &costs, threshold) {
                Some((class, key)) => {
                    threshold = class;
                    key
                }
                None => {
                    return Err(RoutingError::exhausted(iterations, start.key(), goal.key()));
                }
            },
        };

        if let Some(flag) = frontier
            .get_mut(&key_distance(key, &goal))
            .and_then(|bucket| bucket.get_mut(&key))
        {
            *flag = true;
        }
        current = *grid.cell(key.0, key.1)?;
        direction = costs
            .get(&key)
            .map_or(direction, |cost| cost.direction);
        trace!("move to {:?} heading {} at threshold {}", key, direction, threshold);
    }
}

fn key_distance(key: (i64, i64), goal: &GridCell) -> i64 {
    (key.0 - goal.row).abs() + (key.1 - goal.col).abs()
}

fn relax(
    costs: &mut HashMap<(i64, i64), Cost>,
    key: (i64, i64),
    turns: u32,
    parent: (i64, i64),
    direction: Direction,
) {
    let better = costs.get(&key).map_or(true, |existing| turns < existing.turns);
    if better {
        costs.insert(
            key,
            Cost {
                turns,
                parent: Some(parent),
                direction,
            },
        );
    }
}

/// Lowest-turn unexpanded cell in the first non-exhausted bucket at or above `threshold`
fn cheapest_unexpanded(
    frontier: &Frontier,
    costs: &HashMap<(i64, i64), Cost>,
    threshold: i64,
) -> Option<(i64, (i64, i64))> {
    frontier.range(threshold..).find_map(|(&class, bucket)| {
        bucket
            .iter()
            .filter(|(_, expanded)| !**expanded)
            .map(|(&key, _)| (costs.get(&key).map_or(u32::MAX, |c| c.turns), key))
            .min()
            .map(|(_, key)| (class, key))
    })
}

fn trace_back(
    grid: &Grid,
    costs: &HashMap<(i64, i64), Cost>,
    start: GridCell,
    goal: GridCell,
    start_direction: Direction,
    iterations: usize,
) -> Result<Vec<Step>, RoutingError> {
    let mut steps = Vec::new();
    let mut key = goal.key();
    loop {
        if steps.len() > costs.len() {
            return Err(RoutingError::exhausted(iterations, start.key(), goal.key()));
        }
        let cost = costs
            .get(&key)
            .ok_or(RoutingError::grid_index(key.0, key.1))?;
        let direction = if key == start.key() {
            start_direction
        } else {
            cost.direction
        };
        steps.push(Step {
            cell: *grid.cell(key.0, key.1)?,
            direction,
        });
        match cost.parent {
            Some(parent) if key != start.key() => key = parent,
            _ => break,
        }
    }
    steps.reverse();
    Ok(steps)
}

/// Keep the start, the goal and every cell where the route turns
pub fn compress_path(steps: &[Step]) -> Vec<GridCell> {
    let Some(first) = steps.first() else {
        return Vec::new();
    };
    let mut breakpoints = vec![first.cell];
    for window in steps.windows(2).skip(1) {
        if window[1].direction != window[0].direction {
            breakpoints.push(window[0].cell);
        }
    }
    if let Some(last) = steps.last().filter(|_| steps.len() > 1) {
        breakpoints.push(last.cell);
    }
    breakpoints
}

/// Number of direction changes along a route, not counting the start
pub fn count_turns(steps: &[Step]) -> usize {
    steps
        .windows(2)
        .skip(1)
        .filter(|w| w[0].direction != w[1].direction)
        .count()
}
