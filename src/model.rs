use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::registry;

/// Maximum length of a flowchart name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Allowed range for a node's size multiplier.
pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;

/// The closed set of node categories available in the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Process,
    Decision,
    Io,
    Action,
    Connector,
    Comment,
}

impl NodeKind {
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::Process,
        NodeKind::Decision,
        NodeKind::Io,
        NodeKind::Action,
        NodeKind::Connector,
        NodeKind::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Process => "process",
            NodeKind::Decision => "decision",
            NodeKind::Io => "io",
            NodeKind::Action => "action",
            NodeKind::Connector => "connector",
            NodeKind::Comment => "comment",
        }
    }

    /// Kinds whose labels span multiple lines. Inline edits on these commit
    /// on blur so Enter can insert newlines.
    pub fn multiline(&self) -> bool {
        matches!(self, NodeKind::Comment | NodeKind::Io)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Concrete node dimensions, derived from the kind's base size times `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<NodeSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

impl Node {
    /// Creates a node of the given kind at a canvas position. The template
    /// registry supplies the label, icon, color, and base size; freshly
    /// created nodes start shrunk so they can be grown through the presets.
    pub fn create(kind: NodeKind, position: Position, label: Option<&str>) -> Self {
        let template = registry::template_for(kind);
        let (template_label, icon, color, size) = match template {
            Some(t) => (
                t.label,
                Some(t.icon.to_string()),
                Some(t.color.to_string()),
                Some(t.size_at(registry::INITIAL_SCALE)),
            ),
            None => (registry::FALLBACK_LABEL, None, None, None),
        };

        Self {
            id: fresh_id("node"),
            kind,
            position,
            data: NodeData {
                label: label.unwrap_or(template_label).to_string(),
                icon,
                color,
                size,
            },
        }
    }

    /// Effective size for rendering and fit computations.
    pub fn size(&self) -> NodeSize {
        if let Some(size) = self.data.size {
            return size;
        }
        match registry::template_for(self.kind) {
            Some(t) => t.size_at(1.0),
            None => NodeSize {
                width: 140.0,
                height: 56.0,
                scale: 1.0,
            },
        }
    }
}

/// Visual treatment of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyleHint {
    #[default]
    Default,
    Success,
    Error,
}

/// Optional fields supplied when constructing an edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeOverrides {
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub style_hint: EdgeStyleHint,
    pub animated: bool,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub style_hint: EdgeStyleHint,
    #[serde(default)]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Edge {
    pub fn create(source: &str, target: &str, overrides: EdgeOverrides) -> Self {
        Self {
            id: fresh_id("edge"),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: overrides.source_handle,
            target_handle: overrides.target_handle,
            style_hint: overrides.style_hint,
            animated: overrides.animated,
            label: overrides.label,
        }
    }
}

/// A named, persisted graph owned by a feature. Serialized with camelCase
/// keys; exported files and stored blobs share the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flowchart {
    pub id: String,
    pub name: String,
    pub feature_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl Flowchart {
    pub fn new(feature_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: fresh_id("flow"),
            name: name.to_string(),
            feature_id: feature_id.to_string(),
            created_at: now,
            updated_at: now,
            nodes: Vec::new(),
            edges: Vec::new(),
            viewport: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Removes a node and every edge that references it as source or target.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let existed = self.nodes.iter().any(|node| node.id == node_id);
        if existed {
            self.nodes.retain(|node| node.id != node_id);
            self.edges
                .retain(|edge| edge.source != node_id && edge.target != node_id);
        }
        existed
    }

    /// Drops edges whose endpoints are missing from the node set. Returns the
    /// number of edges removed. Such edges cannot be produced through the
    /// editor; they only appear in blobs corrupted outside the application.
    pub fn sanitize(&mut self) -> usize {
        let ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        let before = self.edges.len();
        self.edges
            .retain(|edge| ids.contains(edge.source.as_str()) && ids.contains(edge.target.as_str()));
        before - self.edges.len()
    }
}

/// Summary row used for listing without loading full graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartListItem {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub node_count: usize,
}

impl FlowchartListItem {
    pub fn of(chart: &Flowchart) -> Self {
        Self {
            id: chart.id.clone(),
            name: chart.name.clone(),
            updated_at: chart.updated_at,
            node_count: chart.nodes.len(),
        }
    }
}

/// Generates a collision-resistant identifier that is never reused within a
/// process lifetime: millisecond timestamp plus a random suffix.
pub fn fresh_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
