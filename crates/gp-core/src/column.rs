use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ColumnSpec, GridConfig};
use crate::error::Result;
use crate::hasher::Token;
use crate::path::{Path, trace};
use crate::position::Position;

/// One independent path-tracing instance. Identity is `index`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub index: usize,
    pub spec: ColumnSpec,
    pub path: Path,
}

/// Parallel paths over the same token sequence, one per column spec.
///
/// Columns share nothing mutable: each path is keyed only by its own
/// `(start, tokens, seed)`, so build order never changes a path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn build(config: &GridConfig, tokens: &[Token]) -> Result<Self> {
        config.validate()?;
        let hasher = config.hasher();
        let columns = config
            .columns
            .iter()
            .enumerate()
            .map(|(index, spec)| Column {
                index,
                spec: *spec,
                path: trace(&hasher, config.grid_size, spec.start, tokens, spec.seed),
            })
            .collect();
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.columns.iter().map(|c| &c.path)
    }
}

/// Generators for column start/seed layouts.
pub struct ColumnLayout;

impl ColumnLayout {
    /// `n` columns spread along the main diagonal, seeds `0..n`.
    pub fn evenly_spaced(n: usize, grid_size: u32) -> Vec<ColumnSpec> {
        if n == 0 || grid_size == 0 {
            return Vec::new();
        }
        let stride = (grid_size as u64 / n as u64).max(1);
        (0..n)
            .map(|i| {
                let c = ((i as u64 * stride + stride / 2) % grid_size as u64) as u32;
                ColumnSpec::new(Position::new(c, c), i as u32)
            })
            .collect()
    }

    /// `n` columns with random starts and seeds. Deterministic for a seeded rng.
    pub fn scattered(n: usize, grid_size: u32, rng: &mut impl Rng) -> Vec<ColumnSpec> {
        if grid_size == 0 {
            return Vec::new();
        }
        (0..n)
            .map(|_| {
                let start = Position::new(
                    rng.random_range(0..grid_size),
                    rng.random_range(0..grid_size),
                );
                ColumnSpec::new(start, rng.random())
            })
            .collect()
    }

    /// One column per `(dx, dy)` offset from `base`, seeds `0..n`.
    pub fn offsets(base: Position, offsets: &[(i64, i64)], grid_size: u32) -> Vec<ColumnSpec> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &(dx, dy))| {
                let start =
                    Position::wrapped(base.x as i64 + dx, base.y as i64 + dy, grid_size);
                ColumnSpec::new(start, i as u32)
            })
            .collect()
    }
}
