//! Replay-derived grid state.
//!
//! A view is a pure fold over the event log prefix ending at a focus index.
//! Nothing is cached between calls, so a view can never disagree with the
//! log it was derived from.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::event::{Diagnostics, Event, LocalizationCandidate};
use crate::log::EventLog;
use crate::position::Position;

/// What the grid looked like at one point of the timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    /// Focus the view was derived at; `None` for an empty log.
    pub index: Option<usize>,
    /// Events `0..=index`.
    pub visited: Vec<Event>,
    /// One cell per column.
    pub current_locations: Vec<Position>,
    /// Columns whose current location came from their seed start because
    /// the focused event did not carry one.
    pub fallback_columns: Vec<usize>,
    /// Per column, the cells that column occupied across `visited`.
    pub trails: Vec<Vec<Position>>,
    pub best_candidate: Option<LocalizationCandidate>,
}

impl StateView {
    pub fn step(&self) -> Option<u64> {
        self.visited.last().map(|e| e.step)
    }

    pub fn is_fallback(&self) -> bool {
        self.index.is_none()
    }
}

/// Fold `log` up to and including `index`.
///
/// `seed_positions` supplies one start cell per column. Column `i` reads its
/// current location from the focused event's `locations[i]`; when the event
/// carries fewer locations, column `i` falls back to `seed_positions[i]`.
/// Returns `IndexOutOfRange` when `index` is past the end of the log.
pub fn replay(
    log: &EventLog,
    index: usize,
    seed_positions: &[Position],
    diagnostics: &Diagnostics,
) -> Result<StateView> {
    let visited = log.prefix(index).ok_or(GridError::IndexOutOfRange {
        index,
        len: log.len(),
    })?;
    Ok(fold(Some(index), visited, seed_positions, diagnostics))
}

/// Fold at the log's focus; for an empty log, the seed-fallback view.
pub fn replay_focus(
    log: &EventLog,
    seed_positions: &[Position],
    diagnostics: &Diagnostics,
) -> StateView {
    match log.focus().and_then(|i| log.prefix(i).map(|p| (i, p))) {
        Some((i, visited)) => fold(Some(i), visited, seed_positions, diagnostics),
        None => fold(None, &[], seed_positions, diagnostics),
    }
}

fn fold(
    index: Option<usize>,
    visited: &[Event],
    seed_positions: &[Position],
    diagnostics: &Diagnostics,
) -> StateView {
    let columns = seed_positions.len();
    let focused = visited.last();

    let mut current_locations = Vec::with_capacity(columns);
    let mut fallback_columns = Vec::new();
    for (column, seed) in seed_positions.iter().enumerate() {
        match focused.and_then(|e| e.location_of(column)) {
            Some(p) => current_locations.push(p),
            None => {
                current_locations.push(*seed);
                fallback_columns.push(column);
            }
        }
    }

    let trails = (0..columns)
        .map(|column| {
            visited
                .iter()
                .filter_map(|e| e.location_of(column))
                .collect()
        })
        .collect();

    StateView {
        index,
        visited: visited.to_vec(),
        current_locations,
        fallback_columns,
        trails,
        best_candidate: diagnostics.best_candidate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    fn seeds() -> Vec<Position> {
        vec![p(15, 14), p(40, 40)]
    }

    fn sample_log() -> EventLog {
        let mut log = EventLog::new();
        log.append(Event::new(1, "first", vec![p(1, 1), p(2, 2)])).unwrap();
        log.append(Event::new(2, "second", vec![p(3, 3)])).unwrap();
        log.append(Event::new(5, "third", vec![])).unwrap();
        log.append(Event::new(6, "fourth", vec![p(4, 4), p(5, 5)])).unwrap();
        log
    }

    #[test]
    fn test_visited_prefix_inclusive() {
        let view = replay(&sample_log(), 1, &seeds(), &Diagnostics::default()).unwrap();
        assert_eq!(view.index, Some(1));
        assert_eq!(view.visited.len(), 2);
        assert_eq!(view.step(), Some(2));
    }

    #[test]
    fn test_locations_from_event() {
        let view = replay(&sample_log(), 0, &seeds(), &Diagnostics::default()).unwrap();
        assert_eq!(view.current_locations, vec![p(1, 1), p(2, 2)]);
        assert!(view.fallback_columns.is_empty());
    }

    #[test]
    fn test_partial_locations_fall_back_per_column() {
        let view = replay(&sample_log(), 1, &seeds(), &Diagnostics::default()).unwrap();
        assert_eq!(view.current_locations, vec![p(3, 3), p(40, 40)]);
        assert_eq!(view.fallback_columns, vec![1]);
    }

    #[test]
    fn test_no_locations_falls_back_to_seeds() {
        let view = replay(&sample_log(), 2, &seeds(), &Diagnostics::default()).unwrap();
        assert_eq!(view.current_locations, seeds());
        assert_eq!(view.fallback_columns, vec![0, 1]);
    }

    #[test]
    fn test_trails_skip_missing_locations() {
        let view = replay(&sample_log(), 3, &seeds(), &Diagnostics::default()).unwrap();
        assert_eq!(view.trails[0], vec![p(1, 1), p(3, 3), p(4, 4)]);
        assert_eq!(view.trails[1], vec![p(2, 2), p(5, 5)]);
    }

    #[test]
    fn test_out_of_range() {
        let err = replay(&sample_log(), 4, &seeds(), &Diagnostics::default()).unwrap_err();
        assert_eq!(err, GridError::IndexOutOfRange { index: 4, len: 4 });
    }

    #[test]
    fn test_empty_log_uses_seed_fallback() {
        let view = replay_focus(&EventLog::new(), &seeds(), &Diagnostics::default());
        assert!(view.is_fallback());
        assert!(view.visited.is_empty());
        assert_eq!(view.current_locations, seeds());
        assert_eq!(view.fallback_columns, vec![0, 1]);
        assert!(view.trails.iter().all(|t| t.is_empty()));
        assert!(view.best_candidate.is_none());
    }

    #[test]
    fn test_idempotent_across_other_views() {
        let log = sample_log();
        let diag = Diagnostics::with_candidates(vec![LocalizationCandidate {
            location: p(9, 9),
            score: 0.75,
        }]);
        let before = replay(&log, 3, &seeds(), &diag).unwrap();
        let _ = replay(&log, 1, &seeds(), &diag).unwrap();
        let after = replay(&log, 3, &seeds(), &diag).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_best_candidate_selected() {
        let diag = Diagnostics::with_candidates(vec![
            LocalizationCandidate {
                location: p(1, 1),
                score: 0.1,
            },
            LocalizationCandidate {
                location: p(2, 2),
                score: 0.9,
            },
        ]);
        let view = replay_focus(&sample_log(), &seeds(), &diag);
        assert_eq!(view.best_candidate.map(|c| c.location), Some(p(2, 2)));
    }

    #[test]
    fn test_replay_focus_follows_pin() {
        let mut log = sample_log();
        log.set_focus(0).unwrap();
        log.append(Event::new(7, "fifth", vec![])).unwrap();
        let view = replay_focus(&log, &seeds(), &Diagnostics::default());
        assert_eq!(view.index, Some(0));
        assert_eq!(view.visited.len(), 1);
    }
}
