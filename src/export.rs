use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use tiny_skia::{Pixmap, Transform};

use crate::model::Flowchart;
use crate::render::render_svg;

/// Background fill used for raster and vector exports.
pub const EXPORT_BACKGROUND: &str = "#0f172a";

/// Default pixel density multiplier for PNG exports.
pub const PNG_SCALE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Svg,
    Png,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
        }
    }
}

/// Serializes the flowchart verbatim: a lossless, re-importable form.
pub fn export_json(chart: &Flowchart) -> Result<String> {
    let mut json =
        serde_json::to_string_pretty(chart).context("failed to serialize flowchart to JSON")?;
    json.push('\n');
    Ok(json)
}

/// Parses a previously exported flowchart, dropping any orphaned edges.
pub fn import_json(json: &str) -> Result<Flowchart> {
    let mut chart: Flowchart =
        serde_json::from_str(json).context("failed to parse flowchart JSON")?;
    chart.sanitize();
    Ok(chart)
}

/// Vector export of the rendered canvas. One-way and presentation-only.
pub fn export_svg(chart: &Flowchart) -> Result<String> {
    render_svg(chart, EXPORT_BACKGROUND)
}

/// Raster export: renders the SVG surface and rasterizes it at the given
/// pixel density. Errors are surfaced rather than producing an empty file.
pub fn export_png(chart: &Flowchart, scale: f32) -> Result<Vec<u8>> {
    if scale <= 0.0 {
        bail!("scale must be greater than zero when rendering PNG output");
    }

    let svg = export_svg(chart)?;

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|err| anyhow!("failed to parse generated SVG for PNG export: {err}"))?;

    let size = tree.size().to_int_size();
    let scaled_width = ((size.width() as f32) * scale).ceil();
    let scaled_height = ((size.height() as f32) * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        bail!("scaled dimensions are not finite; try a smaller scale factor");
    }
    if scaled_width < 1.0 || scaled_height < 1.0 {
        bail!("scaled dimensions collapsed below 1px; try a larger scale factor");
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        bail!("scaled dimensions exceed supported limits; try a smaller scale factor");
    }

    let scaled_width = scaled_width as u32;
    let scaled_height = scaled_height as u32;

    let mut pixmap = Pixmap::new(scaled_width, scaled_height).ok_or_else(|| {
        anyhow!("failed to allocate {scaled_width}x{scaled_height} surface for PNG export")
    })?;

    let transform = Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let png_data = pixmap
        .encode_png()
        .map_err(|err| anyhow!("failed to encode PNG output: {err}"))?;

    Ok(png_data)
}

/// `<flowchart-name>.<ext>`, with path separators stripped from the name.
pub fn export_filename(name: &str, format: ExportFormat) -> String {
    let safe: String = name
        .chars()
        .map(|ch| if matches!(ch, '/' | '\\') { '-' } else { ch })
        .collect();
    let safe = safe.trim();
    let base = if safe.is_empty() { "flowchart" } else { safe };
    format!("{base}.{}", format.extension())
}
