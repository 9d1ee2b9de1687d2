use serde::{Deserialize, Serialize};

/// A cell on the toroidal grid. Both coordinates lie in `[0, grid_size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Build a position from arbitrary signed coordinates, wrapping each
    /// axis onto `[0, grid_size)`. `(-1, y)` and `(grid_size - 1, y)` map
    /// to the same cell.
    pub fn wrapped(x: i64, y: i64, grid_size: u32) -> Self {
        Self {
            x: wrap_coord(x, grid_size),
            y: wrap_coord(y, grid_size),
        }
    }

    /// Re-wrap a position that may have been supplied for a larger grid.
    pub fn normalized(self, grid_size: u32) -> Self {
        Self::wrapped(self.x as i64, self.y as i64, grid_size)
    }

    /// Move by `d`, wrapping at the edges.
    pub fn offset(self, d: Displacement, grid_size: u32) -> Self {
        Self::wrapped(
            self.x as i64 + d.dx as i64,
            self.y as i64 + d.dy as i64,
            grid_size,
        )
    }

    pub fn is_within(self, grid_size: u32) -> bool {
        self.x < grid_size && self.y < grid_size
    }

}

impl From<(u32, u32)> for Position {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Bounded per-step offset. Each axis lies in `[-max_step, max_step]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
}

impl Displacement {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn is_bounded(self, max_step: u32) -> bool {
        let m = max_step as i64;
        (self.dx as i64).abs() <= m && (self.dy as i64).abs() <= m
    }
}

impl std::fmt::Display for Displacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:+}, {:+})", self.dx, self.dy)
    }
}

/// Non-negative modulo: always lands in `[0, m)` regardless of the sign of `v`.
pub fn wrap_coord(v: i64, m: u32) -> u32 {
    debug_assert!(m > 0, "grid size must be positive");
    v.rem_euclid(m as i64) as u32
}
