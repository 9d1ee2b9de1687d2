//! JSON wire format for exporting and importing a whole session.
//!
//! Field names are camelCase and positions are `[x, y]` arrays. Import
//! replays every event through the normal append path, so a file with
//! out-of-order steps is rejected rather than loaded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ColumnSpec, GridConfig};
use crate::error::{GridError, Result};
use crate::event::{Diagnostics, Event, LocalizationCandidate};
use crate::hasher::Token;
use crate::position::Position;
use crate::session::Session;

pub const CURRENT_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize, Debug)]
pub struct WireSession {
    pub version: String,
    pub id: String,
    pub config: WireConfig,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub events: Vec<WireEvent>,
    #[serde(default)]
    pub focus: Option<usize>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub diagnostics: WireDiagnostics,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireConfig {
    #[serde(rename = "gridSize")]
    pub grid_size: u32,
    #[serde(rename = "maxStep")]
    pub max_step: u32,
    pub columns: Vec<WireColumn>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireColumn {
    pub start: [u32; 2],
    #[serde(default)]
    pub seed: u32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireEvent {
    pub step: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub locations: Vec<[u32; 2]>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct WireDiagnostics {
    #[serde(default)]
    pub candidates: Vec<WireCandidate>,
    #[serde(rename = "columnPositions", default)]
    pub column_positions: Vec<[u32; 2]>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireCandidate {
    pub location: [u32; 2],
    pub score: f64,
}

fn pos(p: [u32; 2]) -> Position {
    Position::new(p[0], p[1])
}

fn arr(p: Position) -> [u32; 2] {
    [p.x, p.y]
}

impl WireSession {
    pub fn from_session(session: &Session) -> Self {
        let config = session.config();
        let log = session.log();
        let diagnostics = session.diagnostics();

        WireSession {
            version: CURRENT_VERSION.to_string(),
            id: session.id.to_string(),
            config: WireConfig {
                grid_size: config.grid_size,
                max_step: config.max_step,
                columns: config
                    .columns
                    .iter()
                    .map(|c| WireColumn {
                        start: arr(c.start),
                        seed: c.seed,
                    })
                    .collect(),
            },
            tokens: session.tokens().to_vec(),
            events: log
                .events()
                .iter()
                .map(|e| WireEvent {
                    step: e.step,
                    text: e.text.clone(),
                    locations: e.locations.iter().copied().map(arr).collect(),
                })
                .collect(),
            focus: log.focus(),
            pinned: log.is_pinned(),
            diagnostics: WireDiagnostics {
                candidates: diagnostics
                    .candidates
                    .iter()
                    .map(|c| WireCandidate {
                        location: arr(c.location),
                        score: c.score,
                    })
                    .collect(),
                column_positions: diagnostics
                    .column_positions
                    .iter()
                    .copied()
                    .map(arr)
                    .collect(),
            },
        }
    }

    /// Rebuild a live session: validate config, trace paths, replay events.
    pub fn into_session(self) -> Result<Session> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| GridError::Wire(format!("invalid session id '{}': {e}", self.id)))?;
        let config = GridConfig {
            grid_size: self.config.grid_size,
            max_step: self.config.max_step,
            columns: self
                .config
                .columns
                .into_iter()
                .map(|c| ColumnSpec::new(pos(c.start), c.seed))
                .collect(),
        };

        let mut session = Session::with_id(id, config, self.tokens)?;
        for e in self.events {
            session.append(Event {
                step: e.step,
                text: e.text,
                locations: e.locations.into_iter().map(pos).collect(),
            })?;
        }

        session.set_diagnostics(Diagnostics {
            candidates: self
                .diagnostics
                .candidates
                .into_iter()
                .map(|c| LocalizationCandidate {
                    location: pos(c.location),
                    score: c.score,
                })
                .collect(),
            column_positions: self
                .diagnostics
                .column_positions
                .into_iter()
                .map(pos)
                .collect(),
        });

        match (self.pinned, self.focus) {
            (true, Some(i)) => session.set_focus(i)?,
            _ => session.follow_latest(),
        }
        Ok(session)
    }
}

pub fn export_json(session: &Session) -> Result<String> {
    Ok(serde_json::to_string_pretty(&WireSession::from_session(
        session,
    ))?)
}

pub fn import_json(json: &str) -> Result<Session> {
    let wire: WireSession = serde_json::from_str(json)?;
    if wire.version.split('.').next() != CURRENT_VERSION.split('.').next() {
        return Err(GridError::Wire(format!(
            "unsupported version {} (expected {CURRENT_VERSION})",
            wire.version
        )));
    }
    wire.into_session()
}
