use crate::model::{NodeKind, NodeSize, MAX_SCALE, MIN_SCALE};

/// Scale applied to freshly dropped nodes so they start small and can be
/// grown through the presets.
pub const INITIAL_SCALE: f32 = 0.6;

/// Label used when a node cannot be matched to a template.
pub const FALLBACK_LABEL: &str = "Node";

/// Static palette entry describing one node kind.
#[derive(Debug, Clone, Copy)]
pub struct NodeTemplate {
    pub kind: NodeKind,
    pub label: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    pub base_width: f32,
    pub base_height: f32,
}

impl NodeTemplate {
    pub fn size_at(&self, scale: f32) -> NodeSize {
        let scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        NodeSize {
            width: self.base_width * scale,
            height: self.base_height * scale,
            scale,
        }
    }
}

const TEMPLATES: [NodeTemplate; 8] = [
    NodeTemplate {
        kind: NodeKind::Start,
        label: "Start",
        icon: "play",
        color: "#22c55e",
        description: "Entry point of the flow",
        base_width: 120.0,
        base_height: 48.0,
    },
    NodeTemplate {
        kind: NodeKind::End,
        label: "End",
        icon: "square",
        color: "#ef4444",
        description: "Terminal state of the flow",
        base_width: 120.0,
        base_height: 48.0,
    },
    NodeTemplate {
        kind: NodeKind::Process,
        label: "Process",
        icon: "settings",
        color: "#3b82f6",
        description: "A processing step",
        base_width: 150.0,
        base_height: 56.0,
    },
    NodeTemplate {
        kind: NodeKind::Decision,
        label: "Decision",
        icon: "git-branch",
        color: "#f59e0b",
        description: "Branch on a condition",
        base_width: 150.0,
        base_height: 90.0,
    },
    NodeTemplate {
        kind: NodeKind::Io,
        label: "Input / Output",
        icon: "database",
        color: "#8b5cf6",
        description: "Data entering or leaving the flow",
        base_width: 160.0,
        base_height: 60.0,
    },
    NodeTemplate {
        kind: NodeKind::Action,
        label: "Action",
        icon: "zap",
        color: "#06b6d4",
        description: "A user or system action",
        base_width: 150.0,
        base_height: 56.0,
    },
    NodeTemplate {
        kind: NodeKind::Connector,
        label: "Connector",
        icon: "circle",
        color: "#64748b",
        description: "Joins distant parts of the flow",
        base_width: 56.0,
        base_height: 56.0,
    },
    NodeTemplate {
        kind: NodeKind::Comment,
        label: "Comment",
        icon: "message-square",
        color: "#eab308",
        description: "Free-form annotation",
        base_width: 180.0,
        base_height: 96.0,
    },
];

/// The full palette, in display order.
pub fn templates() -> &'static [NodeTemplate] {
    &TEMPLATES
}

/// Looks up the template for a kind. The palette is registry-driven, so a
/// miss should not occur in practice; callers fall back to a generic node.
pub fn template_for(kind: NodeKind) -> Option<&'static NodeTemplate> {
    TEMPLATES.iter().find(|template| template.kind == kind)
}

/// Discrete size presets offered while a node is selected. Freeform resizing
/// is not supported; the presets keep sizing consistent across a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePreset {
    Xs,
    S,
    M,
    L,
    Xl,
}

impl SizePreset {
    pub const ALL: [SizePreset; 5] = [
        SizePreset::Xs,
        SizePreset::S,
        SizePreset::M,
        SizePreset::L,
        SizePreset::Xl,
    ];

    pub fn scale(&self) -> f32 {
        match self {
            SizePreset::Xs => 0.6,
            SizePreset::S => 0.8,
            SizePreset::M => 1.0,
            SizePreset::L => 1.3,
            SizePreset::Xl => 1.6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizePreset::Xs => "XS",
            SizePreset::S => "S",
            SizePreset::M => "M",
            SizePreset::L => "L",
            SizePreset::Xl => "XL",
        }
    }
}
