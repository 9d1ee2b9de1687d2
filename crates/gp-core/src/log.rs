use crate::error::{GridError, Result};
use crate::event::Event;

/// Append-only event timeline with a single focus cursor.
///
/// The cursor follows the newest event until a viewer pins it with
/// [`EventLog::set_focus`]; after that, appends leave it alone until
/// [`EventLog::follow_latest`] is called. Past entries are never mutated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<Event>,
    focus: Option<usize>,
    pinned: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event at `step` would be accepted by [`EventLog::append`].
    pub fn check_next(&self, step: u64) -> Result<()> {
        match self.last_step() {
            Some(last) if step <= last => {
                tracing::debug!(last, attempted = step, "rejected out-of-order event");
                Err(GridError::OrderingViolation {
                    last,
                    attempted: step,
                })
            }
            _ => Ok(()),
        }
    }

    /// Commit `event` or reject it with no side effect.
    pub fn append(&mut self, event: Event) -> Result<()> {
        self.check_next(event.step)?;

        self.events.push(event);
        let last_index = self.events.len() - 1;
        if !self.pinned || self.focus.is_none() {
            self.focus = Some(last_index);
        }
        tracing::debug!(len = self.events.len(), focus = ?self.focus, "appended event");
        Ok(())
    }

    /// Move the cursor to `index` and pin it there.
    pub fn set_focus(&mut self, index: usize) -> Result<()> {
        if index >= self.events.len() {
            return Err(GridError::IndexOutOfRange {
                index,
                len: self.events.len(),
            });
        }
        self.focus = Some(index);
        self.pinned = true;
        tracing::debug!(index, "focus pinned");
        Ok(())
    }

    /// Unpin the cursor and jump to the newest event.
    pub fn follow_latest(&mut self) {
        self.pinned = false;
        self.focus = self.events.len().checked_sub(1);
    }

    /// Drop every event and unpin. The next append lands at index 0.
    pub fn reset(&mut self) {
        tracing::debug!(dropped = self.events.len(), "event log reset");
        self.events.clear();
        self.focus = None;
        self.pinned = false;
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_step(&self) -> Option<u64> {
        self.events.last().map(|e| e.step)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Index of the event carrying `step`. Steps are strictly increasing,
    /// so this is a binary search.
    pub fn index_of_step(&self, step: u64) -> Option<usize> {
        self.events.binary_search_by_key(&step, |e| e.step).ok()
    }

    /// Events `0..=index`, or `None` when `index` is past the end.
    pub fn prefix(&self, index: usize) -> Option<&[Event]> {
        self.events.get(..=index)
    }
}
