use serde::Serialize;
use uuid::Uuid;

use crate::column::ColumnSet;
use crate::config::GridConfig;
use crate::error::Result;
use crate::event::{Diagnostics, Event};
use crate::hasher::Token;
use crate::log::EventLog;
use crate::position::Position;
use crate::view::{StateView, replay, replay_focus};

/// All state for one viewing session, passed explicitly to every
/// operation: the fixed geometry, the paths built from it, the event
/// timeline and the latest diagnostics.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    config: GridConfig,
    tokens: Vec<Token>,
    columns: ColumnSet,
    seed_positions: Vec<Position>,
    log: EventLog,
    diagnostics: Diagnostics,
}

/// Counters for status output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub columns: usize,
    pub tokens: usize,
    pub events: usize,
    pub focus: Option<usize>,
    pub pinned: bool,
    pub last_step: Option<u64>,
}

impl Session {
    pub fn new(config: GridConfig, tokens: Vec<Token>) -> Result<Self> {
        Self::with_id(Uuid::new_v4(), config, tokens)
    }

    pub fn with_id(id: Uuid, config: GridConfig, tokens: Vec<Token>) -> Result<Self> {
        let columns = ColumnSet::build(&config, &tokens)?;
        let seed_positions = config.seed_positions();
        Ok(Self {
            id,
            config,
            tokens,
            columns,
            seed_positions,
            log: EventLog::new(),
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn seed_positions(&self) -> &[Position] {
        &self.seed_positions
    }

    /// `event` exactly as [`Session::append`] would commit it, with its
    /// locations wrapped onto this grid. Fails on an out-of-order step;
    /// never mutates, so callers can journal the result before appending.
    pub fn prepare(&self, mut event: Event) -> Result<Event> {
        self.log.check_next(event.step)?;
        let grid_size = self.config.grid_size;
        for loc in &mut event.locations {
            *loc = loc.normalized(grid_size);
        }
        Ok(event)
    }

    /// Append an event, wrapping its locations onto this grid.
    pub fn append(&mut self, event: Event) -> Result<()> {
        let event = self.prepare(event)?;
        self.log.append(event)
    }

    pub fn set_focus(&mut self, index: usize) -> Result<()> {
        self.log.set_focus(index)
    }

    pub fn follow_latest(&mut self) {
        self.log.follow_latest();
    }

    /// Clear the timeline and diagnostics. Paths are kept.
    pub fn reset(&mut self) {
        self.log.reset();
        self.diagnostics = Diagnostics::default();
    }

    /// Replace the backend-supplied diagnostics wholesale.
    pub fn set_diagnostics(&mut self, mut diagnostics: Diagnostics) {
        let grid_size = self.config.grid_size;
        for c in &mut diagnostics.candidates {
            c.location = c.location.normalized(grid_size);
        }
        for p in &mut diagnostics.column_positions {
            *p = p.normalized(grid_size);
        }
        self.diagnostics = diagnostics;
    }

    /// The view at the current focus (seed fallback when the log is empty).
    pub fn view(&self) -> StateView {
        replay_focus(&self.log, &self.seed_positions, &self.diagnostics)
    }

    pub fn view_at(&self, index: usize) -> Result<StateView> {
        replay(&self.log, index, &self.seed_positions, &self.diagnostics)
    }

    /// Swap in new geometry. Every path is rebuilt from scratch and the
    /// timeline is cleared; on error nothing changes.
    pub fn reconfigure(&mut self, config: GridConfig) -> Result<()> {
        let columns = ColumnSet::build(&config, &self.tokens)?;
        tracing::info!(
            grid_size = config.grid_size,
            columns = config.columns.len(),
            "session reconfigured"
        );
        self.seed_positions = config.seed_positions();
        self.columns = columns;
        self.config = config;
        self.reset();
        Ok(())
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            columns: self.columns.len(),
            tokens: self.tokens.len(),
            events: self.log.len(),
            focus: self.log.focus(),
            pinned: self.log.is_pinned(),
            last_step: self.log.last_step(),
        }
    }
}
