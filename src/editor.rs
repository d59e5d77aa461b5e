use std::time::Instant;

use crate::history::{History, HistoryMode};
use crate::model::{
    Edge, EdgeOverrides, Flowchart, Node, NodeKind, Position, Viewport,
};
use crate::registry::{self, SizePreset};
use crate::store::{validate_name, FlowchartStore, StoreError};

/// Name given to a flowchart created implicitly by dropping the first node.
pub const UNTITLED_NAME: &str = "Untitled Flowchart";

pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 2.5;
const ZOOM_STEP: f32 = 1.2;
const FIT_MARGIN: f32 = 40.0;

/// How an inline label edit was ended by the host control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    Enter,
    Blur,
}

/// Platform-conventional keyboard shortcuts understood by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Undo,
    Redo,
}

impl Shortcut {
    /// Maps a key event to a shortcut: Ctrl/Cmd+Z undoes, Ctrl/Cmd+Shift+Z
    /// or Ctrl/Cmd+Y redoes.
    pub fn from_key(key: &str, primary: bool, shift: bool) -> Option<Self> {
        if !primary {
            return None;
        }
        match (key.to_ascii_lowercase().as_str(), shift) {
            ("z", false) => Some(Shortcut::Undo),
            ("z", true) | ("y", _) => Some(Shortcut::Redo),
            _ => None,
        }
    }
}

/// In-progress inline edit of a node label. The original text is kept so
/// Escape can revert without touching the graph.
#[derive(Debug, Clone)]
struct LabelEdit {
    node_id: String,
    original: String,
    draft: String,
}

/// Owns the open flowchart, its undo history, and the dirty flag, and turns
/// canvas gestures and toolbar commands into graph mutations. All operations
/// run on a single logical thread; the only deferred work is the history
/// debounce and the post-replay mode reset, both driven by [`EditorSession::tick`].
#[derive(Debug)]
pub struct EditorSession {
    feature_id: String,
    chart: Option<Flowchart>,
    history: History,
    dirty: bool,
    label_edit: Option<LabelEdit>,
    viewport: Viewport,
}

impl EditorSession {
    pub fn new(feature_id: &str) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            chart: None,
            history: History::new(),
            dirty: false,
            label_edit: None,
            viewport: Viewport::default(),
        }
    }

    pub fn feature_id(&self) -> &str {
        &self.feature_id
    }

    pub fn chart(&self) -> Option<&Flowchart> {
        self.chart.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Drives deferred work: commits a due history snapshot and clears the
    /// replaying mode once the swap from an undo/redo has settled.
    pub fn tick(&mut self, now: Instant) {
        self.history.flush_due(now);
        if self.history.mode() == HistoryMode::Replaying {
            self.history.finish_replay();
        }
    }

    /// Starts a new document, replacing whatever was open.
    pub fn new_document(&mut self, name: &str) -> Result<&Flowchart, StoreError> {
        let name = validate_name(name)?;
        self.install(Flowchart::new(&self.feature_id, name), true);
        Ok(self.chart.as_ref().expect("document just installed"))
    }

    /// Creates a node of `kind` at a canvas-space position (the host surface
    /// converts from screen coordinates). Opens an untitled document when
    /// none is open yet. Returns the new node's id.
    pub fn drop_node(&mut self, kind: NodeKind, position: Position, now: Instant) -> String {
        self.ensure_open();
        self.begin_user_edit(now);
        let node = Node::create(kind, position, None);
        let id = node.id.clone();
        let chart = self.chart.as_mut().expect("document open");
        chart.nodes.push(node);
        self.dirty = true;
        id
    }

    /// Connects two nodes. Any node may connect to any other, including
    /// itself; only references to nodes absent from the graph are refused so
    /// dangling edges stay unconstructible. Returns the new edge's id.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
        now: Instant,
    ) -> Option<String> {
        let chart = self.chart.as_ref()?;
        if chart.node(source).is_none() || chart.node(target).is_none() {
            return None;
        }
        self.begin_user_edit(now);
        let edge = Edge::create(
            source,
            target,
            EdgeOverrides {
                source_handle: source_handle.map(str::to_string),
                target_handle: target_handle.map(str::to_string),
                ..EdgeOverrides::default()
            },
        );
        let id = edge.id.clone();
        self.chart.as_mut().expect("document open").edges.push(edge);
        self.dirty = true;
        Some(id)
    }

    /// Position update reported by the canvas while a node is dragged.
    pub fn move_node(&mut self, node_id: &str, position: Position, now: Instant) -> bool {
        let Some(chart) = self.chart.as_ref() else {
            return false;
        };
        if chart.node(node_id).is_none() {
            return false;
        }
        // Drag streams arrive per pixel; note_change coalesces them and is
        // suppressed while an undo/redo swap is propagating.
        self.history.note_change(chart, now);
        let chart = self.chart.as_mut().expect("document open");
        let node = chart.node_mut(node_id).expect("node present");
        node.position = position;
        self.dirty = true;
        true
    }

    /// Enters inline edit mode for a node label.
    pub fn begin_label_edit(&mut self, node_id: &str) -> bool {
        let Some(node) = self.chart.as_ref().and_then(|c| c.node(node_id)) else {
            return false;
        };
        self.label_edit = Some(LabelEdit {
            node_id: node.id.clone(),
            original: node.data.label.clone(),
            draft: node.data.label.clone(),
        });
        true
    }

    /// Replaces the draft text while the inline editor has focus.
    pub fn set_label_draft(&mut self, text: &str) -> bool {
        match &mut self.label_edit {
            Some(edit) => {
                edit.draft = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Commits the draft label. Multi-line kinds commit on blur only, so
    /// Enter keeps inserting newlines there; for the rest either trigger
    /// commits. Returns whether the edit mode was left.
    pub fn commit_label_edit(&mut self, trigger: CommitTrigger, now: Instant) -> bool {
        let Some(edit) = self.label_edit.as_ref() else {
            return false;
        };
        let kind = self
            .chart
            .as_ref()
            .and_then(|c| c.node(&edit.node_id))
            .map(|node| node.kind);
        let Some(kind) = kind else {
            // Node vanished mid-edit (deleted elsewhere); drop the edit.
            self.label_edit = None;
            return true;
        };
        if kind.multiline() && trigger == CommitTrigger::Enter {
            return false;
        }

        let edit = self.label_edit.take().expect("edit in progress");
        if edit.draft != edit.original {
            self.begin_user_edit(now);
            let chart = self.chart.as_mut().expect("document open");
            if let Some(node) = chart.node_mut(&edit.node_id) {
                node.data.label = edit.draft;
            }
            self.dirty = true;
        }
        true
    }

    /// Leaves edit mode restoring the pre-edit label; the graph is untouched.
    pub fn cancel_label_edit(&mut self) -> bool {
        self.label_edit.take().is_some()
    }

    /// Applies one of the discrete size presets to a node.
    pub fn resize_node(&mut self, node_id: &str, preset: SizePreset, now: Instant) -> bool {
        let Some(chart) = self.chart.as_ref() else {
            return false;
        };
        let Some(node) = chart.node(node_id) else {
            return false;
        };
        let Some(template) = registry::template_for(node.kind) else {
            return false;
        };
        let size = template.size_at(preset.scale());
        self.begin_user_edit(now);
        let chart = self.chart.as_mut().expect("document open");
        let node = chart.node_mut(node_id).expect("node present");
        node.data.size = Some(size);
        self.dirty = true;
        true
    }

    /// Deletes a node together with every edge touching it.
    pub fn delete_node(&mut self, node_id: &str, now: Instant) -> bool {
        let Some(chart) = self.chart.as_ref() else {
            return false;
        };
        if chart.node(node_id).is_none() {
            return false;
        }
        self.begin_user_edit(now);
        let chart = self.chart.as_mut().expect("document open");
        chart.remove_node(node_id);
        self.dirty = true;
        true
    }

    /// Removes all nodes and edges. A deliberate, infrequent action: the
    /// snapshot is recorded immediately instead of waiting out the debounce.
    pub fn clear(&mut self, _now: Instant) -> bool {
        let Some(chart) = self.chart.as_ref() else {
            return false;
        };
        if chart.is_empty() {
            return false;
        }
        self.history.finish_replay();
        self.history.record_now(chart);
        let chart = self.chart.as_mut().expect("document open");
        chart.nodes.clear();
        chart.edges.clear();
        self.dirty = true;
        true
    }

    /// Steps back to the most recently recorded state. An in-flight debounce
    /// burst is committed first so it stays reachable as its own step.
    pub fn undo(&mut self, _now: Instant) -> bool {
        let Some(chart) = self.chart.as_mut() else {
            return false;
        };
        let undone = self.history.undo(chart);
        if undone {
            self.label_edit = None;
            self.dirty = true;
        }
        undone
    }

    /// Steps forward to the most recently undone state.
    pub fn redo(&mut self, _now: Instant) -> bool {
        let Some(chart) = self.chart.as_mut() else {
            return false;
        };
        let redone = self.history.redo(chart);
        if redone {
            self.label_edit = None;
            self.dirty = true;
        }
        redone
    }

    /// Dispatches a keyboard shortcut. Suppressed while focus sits in a text
    /// control so text-field undo semantics are left alone.
    pub fn shortcut(&mut self, shortcut: Shortcut, in_text_field: bool, now: Instant) -> bool {
        if in_text_field {
            return false;
        }
        match shortcut {
            Shortcut::Undo => self.undo(now),
            Shortcut::Redo => self.redo(now),
        }
    }

    /// Renames the open flowchart after validating the new name.
    pub fn rename(&mut self, name: &str) -> Result<(), StoreError> {
        let name = validate_name(name)?.to_string();
        let chart = self.chart.as_mut().ok_or(StoreError::NoDocument)?;
        if chart.name != name {
            chart.name = name;
            self.dirty = true;
        }
        Ok(())
    }

    /// Persists the open flowchart, capturing the current viewport so
    /// reopening restores the exact view. A storage failure leaves the dirty
    /// flag set and the in-memory document untouched.
    pub fn save(&mut self, store: &mut FlowchartStore) -> Result<(), StoreError> {
        let viewport = self.viewport;
        let chart = self.chart.as_mut().ok_or(StoreError::NoDocument)?;
        chart.viewport = Some(viewport);
        let saved_at = store.save(chart)?;
        chart.updated_at = saved_at;
        self.dirty = false;
        Ok(())
    }

    /// Loads a saved flowchart into the session, discarding the previous
    /// document's history.
    pub fn open(&mut self, store: &FlowchartStore, id: &str) -> Result<(), StoreError> {
        let chart = store.load(&self.feature_id, id)?;
        self.viewport = chart.viewport.unwrap_or_default();
        self.install(chart, false);
        Ok(())
    }

    /// Deletes a saved flowchart; if it is the open one, the session returns
    /// to the empty state.
    pub fn delete(&mut self, store: &mut FlowchartStore, id: &str) -> Result<(), StoreError> {
        store.delete(&self.feature_id, id)?;
        if self.chart.as_ref().is_some_and(|c| c.id == id) {
            self.close();
        }
        Ok(())
    }

    /// Closes the open document without saving.
    pub fn close(&mut self) {
        self.chart = None;
        self.history.reset();
        self.dirty = false;
        self.label_edit = None;
        self.viewport = Viewport::default();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Viewport {
            zoom: viewport.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ..viewport
        };
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.viewport.zoom = (self.viewport.zoom * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        self.viewport.zoom
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.viewport.zoom = (self.viewport.zoom / ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        self.viewport.zoom
    }

    /// Computes a viewport that fits the whole graph inside a surface of the
    /// given size, with a margin. No-op on an empty graph.
    pub fn fit_view(&mut self, surface_width: f32, surface_height: f32) -> Option<Viewport> {
        let chart = self.chart.as_ref()?;
        let bounds = content_bounds(chart)?;
        let content_w = (bounds.2 - bounds.0) + FIT_MARGIN * 2.0;
        let content_h = (bounds.3 - bounds.1) + FIT_MARGIN * 2.0;
        let zoom = (surface_width / content_w)
            .min(surface_height / content_h)
            .clamp(MIN_ZOOM, MAX_ZOOM);
        let viewport = Viewport {
            x: surface_width / 2.0 - (bounds.0 + bounds.2) / 2.0 * zoom,
            y: surface_height / 2.0 - (bounds.1 + bounds.3) / 2.0 * zoom,
            zoom,
        };
        self.viewport = viewport;
        Some(viewport)
    }

    fn ensure_open(&mut self) {
        if self.chart.is_none() {
            self.install(Flowchart::new(&self.feature_id, UNTITLED_NAME), true);
        }
    }

    fn install(&mut self, chart: Flowchart, dirty: bool) {
        self.chart = Some(chart);
        self.history.reset();
        self.dirty = dirty;
        self.label_edit = None;
    }

    /// A deliberate user edit ends any replay suppression and schedules a
    /// snapshot of the pre-edit state.
    fn begin_user_edit(&mut self, now: Instant) {
        self.history.finish_replay();
        let chart = self.chart.as_ref().expect("document open");
        self.history.note_change(chart, now);
    }
}

/// Axis-aligned bounds (min_x, min_y, max_x, max_y) of all node rectangles.
fn content_bounds(chart: &Flowchart) -> Option<(f32, f32, f32, f32)> {
    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    for node in &chart.nodes {
        let size = node.size();
        let (min_x, min_y) = (node.position.x, node.position.y);
        let (max_x, max_y) = (min_x + size.width, min_y + size.height);
        bounds = Some(match bounds {
            Some((bx0, by0, bx1, by1)) => (
                bx0.min(min_x),
                by0.min(min_y),
                bx1.max(max_x),
                by1.max(max_y),
            ),
            None => (min_x, min_y, max_x, max_y),
        });
    }
    bounds
}
