//! Flowboard: the model and control logic behind a feature flowchart editor.
//!
//! The crate covers everything around the interactive canvas, which stays an
//! external collaborator: the typed graph model ([`model`]), the node palette
//! ([`registry`]), bounded undo/redo with debounced coalescing ([`history`]),
//! the editing session that turns gestures and toolbar commands into graph
//! mutations ([`editor`]), per-feature persistence over a pluggable backend
//! ([`store`]), and JSON/SVG/PNG export ([`export`]).

pub mod cli;
pub mod editor;
pub mod export;
pub mod history;
pub mod model;
pub mod registry;
pub mod render;
pub mod store;

pub use editor::{CommitTrigger, EditorSession, Shortcut};
pub use export::ExportFormat;
pub use history::{History, HistoryMode, Snapshot};
pub use model::{
    Edge, EdgeOverrides, EdgeStyleHint, Flowchart, FlowchartListItem, Node, NodeData, NodeKind,
    NodeSize, Position, Viewport,
};
pub use registry::{NodeTemplate, SizePreset};
pub use store::{FlowchartStore, StorageBackend, StoreError};
