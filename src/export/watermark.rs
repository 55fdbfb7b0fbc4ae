//! The export watermark: a DOM overlay inserted around the capture window,
//! re-created inside the snapshot when cloning lost it, and drawn straight
//! onto the canvas afterwards. Appearing twice is fine; appearing zero times
//! is not.

use log::debug;
use serde::{Deserialize, Serialize};
use tiny_skia::{FillRule, Paint, Transform};

use crate::css::color::parse_legacy_color;
use crate::dom::{Document, NodeId};
use crate::rendering::font;
use crate::rendering::layout::Rect;
use crate::rendering::vector::rounded_rect_path;
use crate::rendering::Canvas;
use crate::{Error, Result};

/// Element id of the DOM watermark.
pub const WATERMARK_ID: &str = "export-watermark";

pub const MIN_FONT_SIZE: f32 = 24.0;
pub const MAX_FONT_SIZE: f32 = 48.0;
/// Font size is the shorter surface edge over this (4%).
pub const FONT_DIVISOR: f32 = 25.0;
pub const MIN_PADDING: f32 = 12.0;

/// Anchor of the watermark inside the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// What to stamp and where. Built fresh for every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub text: String,
    pub position: WatermarkPosition,
    pub background_color: String,
    pub text_color: String,
    /// Fixed font size in px; derived from the surface size when unset.
    pub font_size: Option<f32>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "stage".to_string(),
            position: WatermarkPosition::BottomRight,
            background_color: "transparent".to_string(),
            text_color: "rgba(255, 255, 255, 0.7)".to_string(),
            font_size: None,
        }
    }
}

impl WatermarkConfig {
    fn font_size_for(&self, width: f32, height: f32) -> f32 {
        self.font_size.unwrap_or_else(|| font_size_for(width, height))
    }
}

/// `clamp(min(w, h) * 0.04, 24, 48)`.
pub fn font_size_for(width: f32, height: f32) -> f32 {
    (width.min(height) / FONT_DIVISOR).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// Distance from the anchored edges, `max(12, font_size * 0.6)`.
pub fn padding_for(font_size: f32) -> f32 {
    MIN_PADDING.max(font_size * 3.0 / 5.0)
}

/// Detaches the pre-inserted watermark. Must be consumed whatever the
/// capture's outcome.
#[must_use = "the watermark stays in the live document until removed"]
#[derive(Debug)]
pub struct WatermarkHandle {
    node: NodeId,
}

impl WatermarkHandle {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn remove(self, doc: &mut Document) {
        doc.remove(self.node);
        debug!("removed DOM watermark");
    }
}

/// Build a detached watermark element for a `surface`-sized target.
pub fn create_watermark_element(doc: &mut Document, config: &WatermarkConfig, surface: (f32, f32)) -> NodeId {
    let font_size = config.font_size_for(surface.0, surface.1);
    let padding = padding_for(font_size);
    let node = doc.create_element("div");
    let text = doc.create_text_node(&config.text);
    doc.append_child(node, text);

    if let Some(el) = doc.element_mut(node) {
        el.set_attr("id", WATERMARK_ID);
        el.set_attr("aria-hidden", "true");
        let style = el.style_mut();
        style.set("position", "absolute", false);
        match config.position {
            WatermarkPosition::TopLeft => {
                style.set("top", &format!("{padding}px"), false);
                style.set("left", &format!("{padding}px"), false);
            }
            WatermarkPosition::TopRight => {
                style.set("top", &format!("{padding}px"), false);
                style.set("right", &format!("{padding}px"), false);
            }
            WatermarkPosition::BottomLeft => {
                style.set("bottom", &format!("{padding}px"), false);
                style.set("left", &format!("{padding}px"), false);
            }
            WatermarkPosition::BottomRight => {
                style.set("bottom", &format!("{padding}px"), false);
                style.set("right", &format!("{padding}px"), false);
            }
            WatermarkPosition::Center => {
                style.set("top", "50%", false);
                style.set("left", "50%", false);
                style.set("transform", "translate(-50%, -50%)", false);
            }
        }
        style.set("font-size", &format!("{font_size}px"), false);
        style.set("font-weight", "600", false);
        style.set("line-height", "1.2", false);
        style.set("white-space", "nowrap", false);
        style.set("color", &config.text_color, false);
        style.set("background-color", &config.background_color, false);
        style.set("pointer-events", "none", false);
        style.set("z-index", "9999", false);
    }
    node
}

/// Attach the watermark to the live `target` for the capture window.
pub fn add_watermark_to_element(
    doc: &mut Document,
    target: NodeId,
    config: &WatermarkConfig,
    surface: (f32, f32),
) -> WatermarkHandle {
    let node = create_watermark_element(doc, config, surface);
    doc.append_child(target, node);
    debug!("inserted DOM watermark '{}'", config.text);
    WatermarkHandle { node }
}

/// Inside a snapshot: re-create the watermark when the clone has none.
/// Returns whether one was added.
pub fn ensure_watermark_in_clone(
    doc: &mut Document,
    target: NodeId,
    config: &WatermarkConfig,
    surface: (f32, f32),
) -> bool {
    if doc.get_element_by_id(WATERMARK_ID).is_some() {
        return false;
    }
    let position = doc.computed_style(target).position();
    if position.trim().eq_ignore_ascii_case("static") {
        if let Some(el) = doc.element_mut(target) {
            el.style_mut().set("position", "relative", false);
        }
    }
    let node = create_watermark_element(doc, config, surface);
    doc.append_child(target, node);
    debug!("re-created watermark in snapshot");
    true
}

/// Where the watermark text's line box lands on a `width`x`height` surface.
fn anchor_origin(position: WatermarkPosition, size: (f32, f32), text: (f32, f32), padding: f32) -> (f32, f32) {
    let (w, h) = size;
    let (tw, th) = text;
    match position {
        WatermarkPosition::TopLeft => (padding, padding),
        WatermarkPosition::TopRight => (w - padding - tw, padding),
        WatermarkPosition::BottomLeft => (padding, h - padding - th),
        WatermarkPosition::BottomRight => (w - padding - tw, h - padding - th),
        WatermarkPosition::Center => ((w - tw) / 2.0, (h - th) / 2.0),
    }
}

/// Draw the watermark directly onto `canvas`, sized from its pixel dimensions.
pub fn add_watermark_to_canvas(canvas: &mut Canvas, config: &WatermarkConfig) -> Result<()> {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    if w <= 0.0 || h <= 0.0 {
        return Err(Error::RenderError("cannot watermark an empty canvas".into()));
    }
    let color = parse_legacy_color(&config.text_color)
        .ok_or_else(|| Error::ConfigError(format!("unparseable watermark color '{}'", config.text_color)))?;
    if config.text.trim().is_empty() {
        return Ok(());
    }

    let font_size = config.font_size_for(w, h);
    let padding = padding_for(font_size);
    let text_size = (font::measure_width(&config.text, font_size), font::line_height(font_size));
    let (x, y) = anchor_origin(config.position, (w, h), text_size, padding);
    let pixmap = canvas.pixmap_mut();

    if let Some(background) = parse_legacy_color(&config.background_color).filter(|c| !c.is_transparent()) {
        let inset = font_size * 0.25;
        let plate = Rect::new(x - inset, y - inset, text_size.0 + inset * 2.0, text_size.1 + inset * 2.0);
        if let Some(path) = rounded_rect_path(plate, inset) {
            let mut paint = Paint::default();
            paint.set_color(background.to_skia());
            paint.anti_alias = true;
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    let path = font::text_path(&config.text, x, y, font_size)
        .ok_or_else(|| Error::RenderError("watermark text produced no glyphs".into()))?;
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    debug!("drew canvas watermark at ({x:.0}, {y:.0}), {font_size}px");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_doc() -> (Document, NodeId) {
        let doc = Document::parse_html(
            r#"<div id="image-render-card" style="width: 400px; height: 300px"></div>"#,
            None,
        )
        .unwrap();
        let card = doc.get_element_by_id("image-render-card").unwrap();
        (doc, card)
    }

    #[test]
    fn font_size_is_clamped() {
        assert_eq!(font_size_for(100.0, 100.0), 24.0);
        assert_eq!(font_size_for(1000.0, 800.0), 32.0);
        assert_eq!(font_size_for(4000.0, 3000.0), 48.0);
        assert_eq!(padding_for(24.0), 14.4);
        assert_eq!(padding_for(10.0), 12.0);
    }

    #[test]
    fn handle_removes_inserted_node() {
        let (mut doc, card) = card_doc();
        let handle = add_watermark_to_element(&mut doc, card, &WatermarkConfig::default(), (400.0, 300.0));
        let node = handle.node();
        assert_eq!(doc.get_element_by_id(WATERMARK_ID), Some(node));
        assert_eq!(doc.text_content(node), "stage");
        assert_eq!(doc.computed_style(node).get_property_value("right"), "14.4px");
        handle.remove(&mut doc);
        assert!(doc.get_element_by_id(WATERMARK_ID).is_none());
        assert!(doc.children(card).is_empty());
    }

    #[test]
    fn clone_recreation_positions_target() {
        let (mut doc, card) = card_doc();
        assert!(ensure_watermark_in_clone(&mut doc, card, &WatermarkConfig::default(), (400.0, 300.0)));
        assert_eq!(doc.computed_style(card).position(), "relative");
        assert!(!ensure_watermark_in_clone(&mut doc, card, &WatermarkConfig::default(), (400.0, 300.0)));
        assert_eq!(doc.children(card).len(), 1);
    }

    #[test]
    fn canvas_fallback_marks_the_anchor() {
        let mut canvas = Canvas::new(400, 300).unwrap();
        add_watermark_to_canvas(&mut canvas, &WatermarkConfig::default()).unwrap();
        let lit = |x0: u32, y0: u32, x1: u32, y1: u32| {
            (y0..y1).any(|y| (x0..x1).any(|x| canvas.pixel(x, y).is_some_and(|p| p[3] > 0)))
        };
        assert!(lit(200, 150, 400, 300));
        assert!(!lit(0, 0, 200, 150));
    }

    #[test]
    fn canvas_fallback_rejects_bad_colors() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        let config = WatermarkConfig {
            text_color: "oklch(0.5 0.1 20)".into(),
            ..Default::default()
        };
        assert!(add_watermark_to_canvas(&mut canvas, &config).is_err());
    }

    #[test]
    fn positions_deserialize_kebab_case() {
        let config: WatermarkConfig = serde_json::from_str(r#"{"position": "top-left", "text": "x"}"#).unwrap();
        assert_eq!(config.position, WatermarkPosition::TopLeft);
        assert_eq!(config.text_color, "rgba(255, 255, 255, 0.7)");
    }
}
