use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::model::{Edge, Flowchart, Node};

/// Maximum entries kept per stack; pushing beyond evicts the oldest.
pub const HISTORY_LIMIT: usize = 50;

/// Quiet period before a pending snapshot is committed. Rapid edits within
/// the window collapse into a single undo step.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// A deep, independent copy of the live graph taken at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn of(chart: &Flowchart) -> Self {
        Self {
            nodes: chart.nodes.clone(),
            edges: chart.edges.clone(),
        }
    }

    /// Replaces the live graph with this snapshot.
    pub fn install(self, chart: &mut Flowchart) {
        chart.nodes = self.nodes;
        chart.edges = self.edges;
    }

    fn fingerprint(&self) -> String {
        // Serialization failure is unreachable for these plain data types.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Whether the session is accepting user edits or replaying a snapshot.
/// Change notifications arriving while `Replaying` are echoes of the swap
/// itself and must not be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Idle,
    Replaying,
}

/// Bounded undo/redo over full graph snapshots with debounced coalescing.
///
/// Callers report the pre-mutation state through [`History::note_change`]
/// before applying an edit; the first report of a burst wins and is committed
/// by [`History::flush_due`] once the quiet period elapses. Time is passed in
/// explicitly so tests drive the debounce with a virtual clock.
#[derive(Debug)]
pub struct History {
    past: VecDeque<Snapshot>,
    future: VecDeque<Snapshot>,
    last_fingerprint: Option<String>,
    pending: Option<(Snapshot, Instant)>,
    mode: HistoryMode,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            last_fingerprint: None,
            pending: None,
            mode: HistoryMode::Idle,
        }
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Drops both stacks and any pending snapshot. Used when a different
    /// flowchart is opened; history is per editing session, not persisted.
    pub fn reset(&mut self) {
        self.past.clear();
        self.future.clear();
        self.last_fingerprint = None;
        self.pending = None;
        self.mode = HistoryMode::Idle;
    }

    /// Schedules a snapshot of the pre-edit graph. The snapshot from the
    /// first change of a burst is kept; later calls only push the deadline.
    pub fn note_change(&mut self, chart: &Flowchart, now: Instant) {
        if self.mode == HistoryMode::Replaying {
            return;
        }
        let deadline = now + DEBOUNCE;
        match &mut self.pending {
            Some((_, pending_deadline)) => *pending_deadline = deadline,
            None => self.pending = Some((Snapshot::of(chart), deadline)),
        }
    }

    /// Commits the pending snapshot if its quiet period has elapsed.
    pub fn flush_due(&mut self, now: Instant) -> bool {
        let due = matches!(&self.pending, Some((_, deadline)) if now >= *deadline);
        if !due {
            return false;
        }
        self.flush_now()
    }

    /// Commits the pending snapshot regardless of its deadline. Undo, redo,
    /// and immediate records commit through here so an in-flight burst stays
    /// reachable as its own step instead of folding into the next jump.
    pub fn flush_now(&mut self) -> bool {
        match self.pending.take() {
            Some((snapshot, _)) => self.push(snapshot),
            None => false,
        }
    }

    /// Records immediately, bypassing the debounce. Used for deliberate,
    /// high-impact edits such as clearing the canvas.
    pub fn record_now(&mut self, chart: &Flowchart) -> bool {
        self.flush_now();
        self.push(Snapshot::of(chart))
    }

    /// Commits any in-flight burst, then steps the live graph back to the
    /// most recently recorded state. Total: a no-op at the stack boundary.
    pub fn undo(&mut self, chart: &mut Flowchart) -> bool {
        self.flush_now();
        let Some(snapshot) = self.past.pop_back() else {
            return false;
        };
        push_bounded(&mut self.future, Snapshot::of(chart));
        snapshot.install(chart);
        self.last_fingerprint = self.past.back().map(Snapshot::fingerprint);
        self.mode = HistoryMode::Replaying;
        true
    }

    /// Steps the live graph forward to the most recently undone state.
    /// A pending edit supersedes the redo branch: committing it clears
    /// `future`, and the redo is then a no-op.
    pub fn redo(&mut self, chart: &mut Flowchart) -> bool {
        self.flush_now();
        let Some(snapshot) = self.future.pop_back() else {
            return false;
        };
        let current = Snapshot::of(chart);
        self.last_fingerprint = Some(current.fingerprint());
        push_bounded(&mut self.past, current);
        snapshot.install(chart);
        self.mode = HistoryMode::Replaying;
        true
    }

    /// Clears the replaying mode once the snapshot swap has propagated.
    pub fn finish_replay(&mut self) {
        self.mode = HistoryMode::Idle;
    }

    fn push(&mut self, snapshot: Snapshot) -> bool {
        let fingerprint = snapshot.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return false;
        }
        push_bounded(&mut self.past, snapshot);
        self.last_fingerprint = Some(fingerprint);
        // Any prior redo branch is discarded; history is linear, not a tree.
        self.future.clear();
        true
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot) {
    stack.push_back(snapshot);
    while stack.len() > HISTORY_LIMIT {
        stack.pop_front();
    }
}
