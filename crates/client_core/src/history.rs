use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use shared::domain::{AdvancedSettings, AppState, SystemId, SystemMap};

pub const HISTORY_LIMIT: usize = 50;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    systems: &'a SystemMap,
    current: Option<&'a SystemId>,
    adv: &'a AdvancedSettings,
}

/// The undoable part of the state. Mode flags are deliberately absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    pub systems: SystemMap,
    pub current: Option<SystemId>,
    pub adv: AdvancedSettings,
}

impl Snapshot {
    pub fn capture(state: &AppState) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SnapshotRef {
            systems: &state.systems,
            current: state.current.as_ref(),
            adv: &state.adv,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn apply_to(self, state: &mut AppState) {
        state.systems = self.systems;
        state.current = self.current;
        state.adv = self.adv;
        state.ensure_current();
    }
}

/// Undo/redo stacks of serialized snapshots.
///
/// The manager keeps the snapshot of the last committed state; recording a
/// new one pushes the previous commit onto the undo stack.
#[derive(Debug)]
pub struct History {
    past: VecDeque<String>,
    future: Vec<String>,
    committed: Option<String>,
    suppressed: bool,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            committed: None,
            suppressed: false,
            limit: limit.max(1),
        }
    }

    /// Records a freshly committed snapshot. Returns whether the undo stack
    /// changed.
    pub fn record(&mut self, snapshot: String) -> bool {
        if self.suppressed {
            self.committed = Some(snapshot);
            return false;
        }
        if self.committed.as_deref() == Some(snapshot.as_str()) {
            return false;
        }
        let Some(previous) = self.committed.replace(snapshot) else {
            return false;
        };
        self.past.push_back(previous);
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
        self.future.clear();
        true
    }

    /// Trades the live snapshot for the most recent undo entry.
    pub fn step_back(&mut self, current: String) -> Option<String> {
        let previous = self.past.pop_back()?;
        self.future.push(current);
        Some(previous)
    }

    pub fn step_forward(&mut self) -> Option<String> {
        self.future.pop()
    }

    pub fn suppress(&mut self) {
        self.suppressed = true;
    }

    pub fn resume(&mut self) {
        self.suppressed = false;
    }

    /// Moves the baseline to `snapshot` without touching either stack. Used
    /// when the live state is replaced wholesale, whether or not it was
    /// written out.
    pub fn rebase(&mut self, snapshot: String) {
        self.committed = Some(snapshot);
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    pub fn committed(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    /// Undo entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.past.iter().map(String::as_str)
    }
}
