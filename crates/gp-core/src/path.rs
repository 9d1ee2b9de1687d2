use serde::{Deserialize, Serialize};

use crate::constants::CONTEXT_WINDOW;
use crate::hasher::{ContextHasher, Token};
use crate::position::{Displacement, Position};

/// One visited cell. The first step of a path has no displacement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub position: Position,
    pub token: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacement: Option<Displacement>,
}

/// Ordered steps traced by one column. Immutable once built; two paths
/// may cross the same cell without any relation between them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_at(&self, i: usize) -> Option<&Step> {
        self.steps.get(i)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.steps.iter().map(|s| s.position)
    }

    pub fn last_position(&self) -> Option<Position> {
        self.steps.last().map(|s| s.position)
    }

    /// The first `n` steps (all of them if `n` exceeds the length).
    pub fn prefix(&self, n: usize) -> &[Step] {
        &self.steps[..n.min(self.steps.len())]
    }
}

/// Walk `tokens` across a `grid_size` torus starting at `start`.
///
/// Step `i >= 1` moves by `hasher.displacement(tokens[i-1], tokens[i], seed)`
/// from the previous cell. Depends on nothing but its arguments.
pub fn trace(
    hasher: &ContextHasher,
    grid_size: u32,
    start: Position,
    tokens: &[Token],
    seed: u32,
) -> Path {
    let mut steps = Vec::with_capacity(tokens.len());
    let Some(&first) = tokens.first() else {
        return Path { steps };
    };

    let mut current = start.normalized(grid_size);
    steps.push(Step {
        position: current,
        token: first,
        displacement: None,
    });

    for window in tokens.windows(CONTEXT_WINDOW) {
        let Some(d) = hasher.hash_window(window, seed) else {
            continue;
        };
        current = current.offset(d, grid_size);
        steps.push(Step {
            position: current,
            token: window[CONTEXT_WINDOW - 1],
            displacement: Some(d),
        });
    }

    Path { steps }
}
