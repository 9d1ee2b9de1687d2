use serde::{Deserialize, Serialize};

use crate::position::Position;

/// An externally supplied timeline record. `locations` holds one cell per
/// column, possibly fewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub step: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub locations: Vec<Position>,
}

impl Event {
    pub fn new(step: u64, text: impl Into<String>, locations: Vec<Position>) -> Self {
        Self {
            step,
            text: text.into(),
            locations,
        }
    }

    pub fn location_of(&self, column: usize) -> Option<Position> {
        self.locations.get(column).copied()
    }
}

/// A scored guess at the current grid location. Scores are comparable but
/// unbounded; they are produced elsewhere and never recomputed here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalizationCandidate {
    pub location: Position,
    pub score: f64,
}

/// State diagnostics attached by the backend: candidate locations plus
/// the positions it reports for each column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default)]
    pub candidates: Vec<LocalizationCandidate>,
    #[serde(default)]
    pub column_positions: Vec<Position>,
}

impl Diagnostics {
    pub fn with_candidates(candidates: Vec<LocalizationCandidate>) -> Self {
        Self {
            candidates,
            column_positions: Vec::new(),
        }
    }

    /// Highest-scoring candidate. Ties keep the earliest; NaN never wins.
    pub fn best_candidate(&self) -> Option<LocalizationCandidate> {
        best_candidate(&self.candidates)
    }

    /// Candidates ordered by descending score, stable for ties.
    pub fn ranked(&self) -> Vec<LocalizationCandidate> {
        let mut ranked: Vec<_> = self
            .candidates
            .iter()
            .copied()
            .filter(|c| !c.score.is_nan())
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

pub fn best_candidate(candidates: &[LocalizationCandidate]) -> Option<LocalizationCandidate> {
    let mut best: Option<LocalizationCandidate> = None;
    for c in candidates {
        if c.score.is_nan() {
            continue;
        }
        match best {
            Some(b) if c.score <= b.score => {}
            _ => best = Some(*c),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x: u32, score: f64) -> LocalizationCandidate {
        LocalizationCandidate {
            location: Position::new(x, 0),
            score,
        }
    }

    #[test]
    fn test_best_is_max() {
        let d = Diagnostics::with_candidates(vec![cand(1, 0.2), cand(2, 3.5), cand(3, -1.0)]);
        assert_eq!(d.best_candidate(), Some(cand(2, 3.5)));
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let d = Diagnostics::with_candidates(vec![cand(1, 2.0), cand(2, 2.0), cand(3, 1.0)]);
        assert_eq!(d.best_candidate().map(|c| c.location.x), Some(1));
    }

    #[test]
    fn test_nan_never_wins() {
        let d = Diagnostics::with_candidates(vec![cand(1, f64::NAN), cand(2, -5.0)]);
        assert_eq!(d.best_candidate().map(|c| c.location.x), Some(2));

        let only_nan = Diagnostics::with_candidates(vec![cand(1, f64::NAN)]);
        assert!(only_nan.best_candidate().is_none());
    }

    #[test]
    fn test_empty_has_no_best() {
        assert!(Diagnostics::default().best_candidate().is_none());
    }

    #[test]
    fn test_ranked_descending_stable() {
        let d = Diagnostics::with_candidates(vec![
            cand(1, 1.0),
            cand(2, 5.0),
            cand(3, 1.0),
            cand(4, f64::NAN),
        ]);
        let xs: Vec<_> = d.ranked().iter().map(|c| c.location.x).collect();
        assert_eq!(xs, vec![2, 1, 3]);
        assert_eq!(d.ranked().first().copied(), d.best_candidate());
    }

    #[test]
    fn test_event_location_of() {
        let e = Event::new(1, "a", vec![Position::new(1, 2)]);
        assert_eq!(e.location_of(0), Some(Position::new(1, 2)));
        assert_eq!(e.location_of(1), None);
    }

    #[test]
    fn test_event_serde_defaults() {
        let e: Event = serde_json::from_str(r#"{"step": 4}"#).unwrap();
        assert_eq!(e, Event::new(4, "", vec![]));
    }
}
