use anyhow::{bail, Result};
use std::fmt::Write as FmtWrite;

use crate::model::{Edge, EdgeStyleHint, Flowchart, Node, NodeKind};

const LAYOUT_MARGIN: f32 = 40.0;
const EDGE_STROKE_WIDTH: f32 = 2.0;
const LABEL_LINE_HEIGHT: f32 = 16.0;
const EDGE_LABEL_CHAR_WIDTH: f32 = 7.2;
const EDGE_LABEL_PADDING: f32 = 10.0;

const NODE_STROKE: &str = "#1e293b";
const NODE_TEXT: &str = "#f8fafc";

/// Renders a flowchart to standalone SVG. Node positions are canvas-space
/// top-left corners; sizes come from the node's kind and scale. Fails when
/// there is nothing to paint, so exports never produce an empty image.
pub fn render_svg(chart: &Flowchart, background: &str) -> Result<String> {
    if chart.nodes.is_empty() {
        bail!("flowchart '{}' has no nodes to render", chart.name);
    }

    let (min_x, min_y, max_x, max_y) = bounds(chart);
    let width = (max_x - min_x) + LAYOUT_MARGIN * 2.0;
    let height = (max_y - min_y) + LAYOUT_MARGIN * 2.0;
    let shift_x = LAYOUT_MARGIN - min_x;
    let shift_y = LAYOUT_MARGIN - min_y;

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="Inter, system-ui, sans-serif">
  <defs>
    <marker id="arrow-end" markerWidth="8" markerHeight="8" refX="6" refY="4" orient="auto" markerUnits="strokeWidth">
      <path d="M1,1 L6,4 L1,7 z" fill="context-stroke" />
    </marker>
  </defs>
  <rect width="100%" height="100%" fill="{}" />
"##,
        escape_xml(background)
    )?;

    for edge in &chart.edges {
        let (Some(source), Some(target)) = (chart.node(&edge.source), chart.node(&edge.target))
        else {
            // Orphaned edges are dropped on load; skip defensively here.
            continue;
        };
        write_edge(&mut svg, edge, source, target, shift_x, shift_y)?;
    }

    for node in &chart.nodes {
        write_node(&mut svg, node, shift_x, shift_y)?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn bounds(chart: &Flowchart) -> (f32, f32, f32, f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for node in &chart.nodes {
        let size = node.size();
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x + size.width);
        max_y = max_y.max(node.position.y + size.height);
    }
    (min_x, min_y, max_x, max_y)
}

fn edge_stroke(edge: &Edge) -> &'static str {
    match edge.style_hint {
        EdgeStyleHint::Default => "#94a3b8",
        EdgeStyleHint::Success => "#22c55e",
        EdgeStyleHint::Error => "#ef4444",
    }
}

fn write_edge(
    svg: &mut String,
    edge: &Edge,
    source: &Node,
    target: &Node,
    shift_x: f32,
    shift_y: f32,
) -> Result<()> {
    let (sx, sy) = node_center(source, shift_x, shift_y);
    let (tx, ty) = node_center(target, shift_x, shift_y);
    let stroke = edge_stroke(edge);
    let dash_attr = if edge.animated {
        " stroke-dasharray=\"8 6\""
    } else {
        ""
    };

    if edge.source == edge.target {
        // Self-loop: arc out to the right of the node.
        let size = source.size();
        let r = size.width.max(size.height) * 0.5;
        write!(
            svg,
            "  <path d=\"M {:.1} {:.1} C {:.1} {:.1}, {:.1} {:.1}, {:.1} {:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{EDGE_STROKE_WIDTH}\"{} marker-end=\"url(#arrow-end)\" />\n",
            sx + size.width / 2.0,
            sy - 4.0,
            sx + size.width / 2.0 + r,
            sy - r,
            sx + size.width / 2.0 + r,
            sy + r,
            sx + size.width / 2.0,
            sy + 4.0,
            stroke,
            dash_attr
        )?;
        return Ok(());
    }

    // Smooth curve: a cubic with control points pulled toward the midpoint.
    let mid_x = (sx + tx) / 2.0;
    write!(
        svg,
        "  <path d=\"M {sx:.1} {sy:.1} C {mid_x:.1} {sy:.1}, {mid_x:.1} {ty:.1}, {tx:.1} {ty:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{EDGE_STROKE_WIDTH}\"{} marker-end=\"url(#arrow-end)\" />\n",
        stroke, dash_attr
    )?;

    if let Some(label) = &edge.label {
        if !label.is_empty() {
            let cx = (sx + tx) / 2.0;
            let cy = (sy + ty) / 2.0;
            let box_w =
                EDGE_LABEL_CHAR_WIDTH * label.chars().count() as f32 + EDGE_LABEL_PADDING;
            write!(
                svg,
                "  <g pointer-events=\"none\">\n    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"4\" ry=\"4\" fill=\"#1e293b\" stroke=\"{}\" stroke-width=\"1\" />\n    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{NODE_TEXT}\" font-size=\"12\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n  </g>\n",
                cx - box_w / 2.0,
                cy - LABEL_LINE_HEIGHT / 2.0 - 2.0,
                box_w,
                LABEL_LINE_HEIGHT + 4.0,
                stroke,
                cx,
                cy,
                escape_xml(label)
            )?;
        }
    }
    Ok(())
}

fn node_center(node: &Node, shift_x: f32, shift_y: f32) -> (f32, f32) {
    let size = node.size();
    (
        node.position.x + shift_x + size.width / 2.0,
        node.position.y + shift_y + size.height / 2.0,
    )
}

fn write_node(svg: &mut String, node: &Node, shift_x: f32, shift_y: f32) -> Result<()> {
    let size = node.size();
    let x = node.position.x + shift_x;
    let y = node.position.y + shift_y;
    let w = size.width;
    let h = size.height;
    let fill = node.data.color.as_deref().unwrap_or("#3b82f6");

    match node.kind {
        NodeKind::Start | NodeKind::End => write!(
            svg,
            "  <rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" fill=\"{fill}\" stroke=\"{NODE_STROKE}\" stroke-width=\"2\" />\n",
            h / 2.0,
            h / 2.0
        )?,
        NodeKind::Process | NodeKind::Action => write!(
            svg,
            "  <rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" rx=\"8\" ry=\"8\" fill=\"{fill}\" stroke=\"{NODE_STROKE}\" stroke-width=\"2\" />\n"
        )?,
        NodeKind::Decision => write!(
            svg,
            "  <polygon points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" fill=\"{fill}\" stroke=\"{NODE_STROKE}\" stroke-width=\"2\" />\n",
            x + w / 2.0,
            y,
            x + w,
            y + h / 2.0,
            x + w / 2.0,
            y + h,
            x,
            y + h / 2.0
        )?,
        NodeKind::Io => {
            let skew = w * 0.15;
            write!(
                svg,
                "  <polygon points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" fill=\"{fill}\" stroke=\"{NODE_STROKE}\" stroke-width=\"2\" />\n",
                x + skew,
                y,
                x + w,
                y,
                x + w - skew,
                y + h,
                x,
                y + h
            )?;
        }
        NodeKind::Connector => write!(
            svg,
            "  <ellipse cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" fill=\"{fill}\" stroke=\"{NODE_STROKE}\" stroke-width=\"2\" />\n",
            x + w / 2.0,
            y + h / 2.0,
            w / 2.0,
            h / 2.0
        )?,
        NodeKind::Comment => write!(
            svg,
            "  <rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" rx=\"4\" ry=\"4\" fill=\"{fill}\" fill-opacity=\"0.25\" stroke=\"{fill}\" stroke-width=\"1.5\" stroke-dasharray=\"6 4\" />\n"
        )?,
    }

    let lines: Vec<&str> = node.data.label.split('\n').collect();
    let cx = x + w / 2.0;
    let cy = y + h / 2.0;
    if lines.len() <= 1 {
        write!(
            svg,
            "  <text x=\"{cx:.1}\" y=\"{cy:.1}\" fill=\"{NODE_TEXT}\" font-size=\"13\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
            escape_xml(&node.data.label)
        )?;
    } else {
        let start_y = cy - LABEL_LINE_HEIGHT * (lines.len() as f32 - 1.0) / 2.0;
        write!(
            svg,
            "  <text x=\"{cx:.1}\" fill=\"{NODE_TEXT}\" font-size=\"13\" text-anchor=\"middle\" xml:space=\"preserve\">\n"
        )?;
        for (idx, line) in lines.iter().enumerate() {
            let line_y = start_y + LABEL_LINE_HEIGHT * idx as f32;
            write!(
                svg,
                "    <tspan x=\"{cx:.1}\" y=\"{line_y:.1}\" dominant-baseline=\"middle\">{}</tspan>\n",
                escape_xml(line)
            )?;
        }
        svg.push_str("  </text>\n");
    }
    Ok(())
}

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::new();
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
