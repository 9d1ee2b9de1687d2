//! Deterministic column paths on a toroidal grid, plus a replayable event
//! timeline.
//!
//! Each column walks a fixed-size wrap-around grid, moving by a bounded
//! displacement hashed from the previous and current token and a per-column
//! seed. Externally supplied events form an append-only log; a single focus
//! cursor selects which prefix is "current", and views are re-derived by
//! folding that prefix rather than stored per step.
//!
//! Zero I/O: pure logic with no opinions about transport or persistence.

pub mod column;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod hasher;
pub mod log;
pub mod path;
pub mod position;
pub mod session;
pub mod shared;
pub mod tokenizer;
pub mod view;
pub mod wire;

pub use column::{Column, ColumnLayout, ColumnSet};
pub use config::{ColumnSpec, GridConfig};
pub use constants::{GRID_SIZE, MAX_STEP};
pub use error::{GridError, Result};
pub use event::{Diagnostics, Event, LocalizationCandidate, best_candidate};
pub use hasher::{ContextHasher, Token, seed_from_i64};
pub use log::EventLog;
pub use path::{Path, Step, trace};
pub use position::{Displacement, Position, wrap_coord};
pub use session::{Session, SessionStats};
pub use shared::SharedSession;
pub use tokenizer::{Vocabulary, parse_token_list, tokenize};
pub use view::{StateView, replay, replay_focus};
pub use wire::{CURRENT_VERSION, export_json, import_json};
