//! Undo/redo history as an ordered action log with a cursor.
//!
//! `entries[..cursor]` is the applied prefix and `entries[cursor..]` is the
//! redo tail. The state is never patched backwards: undo and redo move the
//! cursor and rebuild the state by folding the applied prefix over `origin`.
//! Replaying costs O(history) but cannot drift the way apply/reverse pairs
//! can.
//!
//! Actions committed by collaborators are logged too, at the position they
//! arrived, so a replay puts them after the local edits that preceded them.
//! They are never undone: undoing a local entry moves it behind the remote
//! entries that followed it, which keeps the applied set a prefix.

use crate::actions::Action;
use crate::document::MapState;

/// Identifies a history entry across truncation and rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a logged action came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// Dispatched in this session, undoable
    Local,
    /// Committed by another client, replayed but never undone
    Remote,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: EntryId,
    pub action: Action,
    pub source: EntrySource,
    /// Forward server call not settled yet
    pending: bool,
}

impl HistoryEntry {
    pub fn is_local(&self) -> bool {
        self.source == EntrySource::Local
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Ordered action log with a cursor
#[derive(Debug, Clone)]
pub struct HistoryStack {
    /// State the applied prefix is folded over
    origin: MapState,
    entries: Vec<HistoryEntry>,
    cursor: usize,
    /// Maximum number of local entries kept
    max_history: usize,
    next_id: u64,
}

impl HistoryStack {
    /// Create an empty history over `origin`
    pub fn new(origin: MapState, max_history: usize) -> Self {
        Self {
            origin,
            entries: Vec::new(),
            cursor: 0,
            max_history: max_history.max(1),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Drop the redo tail and append a local entry whose server call is
    /// still outstanding
    pub fn push(&mut self, action: Action) -> EntryId {
        let id = self.next_id();
        self.entries.truncate(self.cursor);
        self.entries.push(HistoryEntry {
            id,
            action,
            source: EntrySource::Local,
            pending: true,
        });
        self.cursor += 1;
        self.compact();
        id
    }

    /// Log a remote action at the end of the applied prefix. The redo tail
    /// survives and replays on top of it.
    pub fn push_remote(&mut self, action: Action) -> EntryId {
        let id = self.next_id();
        self.entries.insert(
            self.cursor,
            HistoryEntry {
                id,
                action,
                source: EntrySource::Remote,
                pending: false,
            },
        );
        self.cursor += 1;
        self.compact();
        id
    }

    /// Mark the forward call of an entry as settled
    pub fn confirm(&mut self, id: EntryId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.pending = false;
            self.compact();
        }
    }

    /// Fold settled entries off the front once there are more local entries
    /// than `max_history`. Remote entries at the front have nothing local
    /// before them and fold right away. An entry whose server call is
    /// outstanding stops folding so a failure can still roll it back.
    fn compact(&mut self) {
        while self.cursor > 0 {
            let front = &self.entries[0];
            let fold = match front.source {
                EntrySource::Remote => true,
                EntrySource::Local => !front.pending && self.local_len() > self.max_history,
            };
            if !fold {
                break;
            }
            let front = self.entries.remove(0);
            self.origin = front.action.apply(&self.origin);
            self.cursor -= 1;
        }
    }

    fn undo_index(&self) -> Option<usize> {
        self.entries[..self.cursor].iter().rposition(HistoryEntry::is_local)
    }

    /// Latest applied local entry and the state without it
    pub fn preview_undo(&self) -> Option<(&HistoryEntry, MapState)> {
        let idx = self.undo_index()?;
        let state = self.entries[..self.cursor]
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .fold(self.origin.clone(), |state, (_, entry)| entry.action.apply(&state));
        Some((&self.entries[idx], state))
    }

    /// Unapply the latest local entry. It moves behind any remote entries
    /// that followed it and becomes the first redo entry.
    pub fn step_back(&mut self) -> Option<&HistoryEntry> {
        let idx = self.undo_index()?;
        self.entries[idx..self.cursor].rotate_left(1);
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Move the cursor forward one entry
    pub fn step_forward(&mut self) -> Option<&HistoryEntry> {
        if self.cursor == self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor - 1)
    }

    /// Fold the applied prefix over the origin
    pub fn replay(&self) -> MapState {
        self.entries[..self.cursor]
            .iter()
            .fold(self.origin.clone(), |state, entry| entry.action.apply(&state))
    }

    /// Remove an entry wherever it sits. Returns whether it was part of the
    /// applied prefix (the state then needs a replay).
    pub fn remove(&mut self, id: EntryId) -> Option<bool> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(idx);
        let was_applied = idx < self.cursor;
        if was_applied {
            self.cursor -= 1;
        }
        self.compact();
        Some(was_applied)
    }

    pub fn origin(&self) -> &MapState {
        &self.origin
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Number of applied entries, remote ones included
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of applied local entries
    pub fn undo_depth(&self) -> usize {
        self.entries[..self.cursor].iter().filter(|e| e.is_local()).count()
    }

    pub fn local_len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_local()).count()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_index().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(MapState::new(), 100)
    }
}
