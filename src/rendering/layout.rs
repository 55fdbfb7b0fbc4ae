//! Box layout for scene subtrees.
//!
//! Boxes are laid out with their margin box at the origin and then
//! translated into place by their parent, so every finished [`LayoutBox`]
//! carries canvas coordinates in CSS px. Absolutely positioned elements are
//! deferred to the nearest positioned ancestor and placed once its size is
//! final.

use crate::css::{
    expand_box_shorthand, parse_length, split_whitespace_top_level, LengthContext,
};
use crate::dom::{Document, NodeData, NodeId};

use super::font;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn inset(&self, edges: &Edges) -> Rect {
        Rect {
            x: self.x + edges.left,
            y: self.y + edges.top,
            width: (self.width - edges.horizontal()).max(0.0),
            height: (self.height - edges.vertical()).max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn to_skia(&self) -> Option<tiny_skia::Rect> {
        tiny_skia::Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxModel {
    pub margin: Edges,
    pub border: Edges,
    pub padding: Edges,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxKind {
    Block,
    Flex,
    Inline,
    Text { text: String, font_size: f32 },
    Image,
    Svg,
}

/// A laid-out box. `rect` is the border box.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub node: NodeId,
    pub kind: BoxKind,
    pub rect: Rect,
    pub box_model: BoxModel,
    pub children: Vec<LayoutBox>,
}

impl LayoutBox {
    pub fn padding_box(&self) -> Rect {
        self.rect.inset(&self.box_model.border)
    }

    pub fn content_box(&self) -> Rect {
        self.padding_box().inset(&self.box_model.padding)
    }

    pub fn outer_width(&self) -> f32 {
        self.rect.width + self.box_model.margin.horizontal()
    }

    pub fn outer_height(&self) -> f32 {
        self.rect.height + self.box_model.margin.vertical()
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.rect.x += dx;
        self.rect.y += dy;
        for child in &mut self.children {
            child.translate(dx, dy);
        }
    }

    pub fn find(&self, node: NodeId) -> Option<&LayoutBox> {
        if self.node == node {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(node))
    }

    pub fn find_mut(&mut self, node: NodeId) -> Option<&mut LayoutBox> {
        if self.node == node {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(node))
    }
}

/// Layout inputs: the window the subtree is laid out in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub viewport: (f32, f32),
}

/// Cascaded value with `var()` substituted; unresolvable values read as unset.
pub(crate) fn specified(doc: &Document, node: NodeId, prop: &str) -> Option<String> {
    doc.specified_value(node, prop).ok().flatten()
}

/// One resolved border side.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub style: String,
    pub color: Option<String>,
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];
const BORDER_STYLES: [&str; 10] = [
    "none", "hidden", "solid", "dashed", "dotted", "double", "groove", "ridge", "inset", "outset",
];

fn border_width_keyword(token: &str, ctx: LengthContext) -> Option<f32> {
    match token {
        "thin" => Some(1.0),
        "medium" => Some(3.0),
        "thick" => Some(5.0),
        _ => parse_length(token, ctx),
    }
}

fn apply_border_shorthand(side: &mut BorderSide, value: &str, ctx: LengthContext) {
    *side = BorderSide {
        width: 3.0,
        style: "none".to_string(),
        color: None,
    };
    for token in split_whitespace_top_level(value) {
        let lower = token.to_ascii_lowercase();
        if let Some(width) = border_width_keyword(&lower, ctx) {
            side.width = width;
        } else if BORDER_STYLES.contains(&lower.as_str()) {
            side.style = lower;
        } else {
            side.color = Some(token.to_string());
        }
    }
}

/// Resolve `border-<side>` from the shorthand family. More specific names
/// win over less specific ones.
pub(crate) fn border_side(doc: &Document, node: NodeId, side_idx: usize, ctx: LengthContext) -> BorderSide {
    let side_name = SIDES[side_idx];
    let mut side = BorderSide {
        width: 3.0,
        style: "none".to_string(),
        color: None,
    };
    if let Some(v) = specified(doc, node, "border") {
        apply_border_shorthand(&mut side, &v, ctx);
    }
    if let Some(v) = specified(doc, node, "border-width") {
        if let Some(w) = expand_box_shorthand(&v).and_then(|s| border_width_keyword(s[side_idx], ctx)) {
            side.width = w;
        }
    }
    if let Some(v) = specified(doc, node, "border-style") {
        if let Some(s) = expand_box_shorthand(&v) {
            side.style = s[side_idx].to_ascii_lowercase();
        }
    }
    if let Some(v) = specified(doc, node, "border-color") {
        if let Some(c) = expand_box_shorthand(&v) {
            side.color = Some(c[side_idx].to_string());
        }
    }
    if let Some(v) = specified(doc, node, &format!("border-{side_name}")) {
        apply_border_shorthand(&mut side, &v, ctx);
    }
    if let Some(w) = specified(doc, node, &format!("border-{side_name}-width"))
        .and_then(|v| border_width_keyword(v.trim(), ctx))
    {
        side.width = w;
    }
    if let Some(s) = specified(doc, node, &format!("border-{side_name}-style")) {
        side.style = s.trim().to_ascii_lowercase();
    }
    if let Some(c) = specified(doc, node, &format!("border-{side_name}-color")) {
        side.color = Some(c);
    }
    if side.style == "none" || side.style == "hidden" {
        side.width = 0.0;
    }
    side
}

/// Lay out the subtree rooted at `root`. The root's border box lands at the
/// canvas origin.
pub fn layout_subtree(doc: &Document, root: NodeId, options: &LayoutOptions) -> Option<LayoutBox> {
    doc.element(root)?;
    let mut engine = LayoutEngine {
        doc,
        viewport: options.viewport,
        pending: vec![Vec::new()],
    };
    if engine.display(root) == "none" {
        return None;
    }
    let cb = Containing {
        width: options.viewport.0,
        height: Some(options.viewport.1),
    };
    let mut tree = engine.layout_element(root, cb, Sizing::Fill(options.viewport.0), None);
    let deferred = engine.pending.pop().unwrap_or_default();
    engine.place_absolutes(&mut tree, deferred);
    let (dx, dy) = (-tree.rect.x, -tree.rect.y);
    tree.translate(dx, dy);
    Some(tree)
}

#[derive(Debug, Clone, Copy)]
struct Containing {
    width: f32,
    height: Option<f32>,
}

/// How the used border-box width of an element is found.
#[derive(Debug, Clone, Copy)]
enum Sizing {
    /// Block-level: fill the available width (margin box)
    Fill(f32),
    /// Inline-level, floats, flex items: shrink to content, capped at available
    Shrink(f32),
    /// Fixed border-box width
    Exact(f32),
}

struct LayoutEngine<'a> {
    doc: &'a Document,
    viewport: (f32, f32),
    /// Absolutely positioned nodes waiting for their containing block.
    pending: Vec<Vec<NodeId>>,
}

impl<'a> LayoutEngine<'a> {
    fn ctx(&self, node: NodeId, base: f32) -> LengthContext {
        LengthContext {
            percent_base: base,
            font_size: self.doc.font_size_px(node),
            viewport: self.viewport,
        }
    }

    fn length(&self, node: NodeId, prop: &str, base: f32) -> Option<f32> {
        parse_length(&specified(self.doc, node, prop)?, self.ctx(node, base))
    }

    fn keyword(&self, node: NodeId, prop: &str) -> Option<String> {
        specified(self.doc, node, prop).map(|v| v.trim().to_ascii_lowercase())
    }

    fn display(&self, node: NodeId) -> String {
        let display = self.doc.computed_style(node).display();
        if display.is_empty() {
            "block".to_string()
        } else {
            display.trim().to_ascii_lowercase()
        }
    }

    fn position(&self, node: NodeId) -> String {
        self.keyword(node, "position").unwrap_or_else(|| "static".to_string())
    }

    fn tag(&self, node: NodeId) -> &str {
        self.doc.element(node).map(|e| e.tag()).unwrap_or("")
    }

    fn is_replaced(&self, node: NodeId) -> bool {
        matches!(self.tag(node), "img" | "svg")
    }

    fn is_block_level(&self, node: NodeId, display: &str) -> bool {
        !self.is_replaced(node)
            && matches!(display, "block" | "flex" | "grid" | "list-item" | "table")
    }

    fn edges(&self, node: NodeId, prefix: &str, base: f32) -> Edges {
        let ctx = self.ctx(node, base);
        let mut values = [0.0f32; 4];
        if let Some(short) = specified(self.doc, node, prefix) {
            if let Some(parts) = expand_box_shorthand(&short) {
                for (slot, part) in values.iter_mut().zip(parts) {
                    *slot = parse_length(part, ctx).unwrap_or(0.0);
                }
            }
        }
        for (slot, side) in values.iter_mut().zip(SIDES) {
            if let Some(v) = specified(self.doc, node, &format!("{prefix}-{side}")) {
                *slot = parse_length(&v, ctx).unwrap_or(0.0);
            }
        }
        Edges {
            top: values[0],
            right: values[1],
            bottom: values[2],
            left: values[3],
        }
    }

    fn border_edges(&self, node: NodeId, base: f32) -> Edges {
        let ctx = self.ctx(node, base);
        let w = |i| border_side(self.doc, node, i, ctx).width;
        Edges {
            top: w(0),
            right: w(1),
            bottom: w(2),
            left: w(3),
        }
    }

    fn box_model(&self, node: NodeId, base: f32) -> BoxModel {
        BoxModel {
            margin: self.edges(node, "margin", base),
            border: self.border_edges(node, base),
            padding: self.edges(node, "padding", base),
        }
    }

    fn is_border_box(&self, node: NodeId) -> bool {
        self.keyword(node, "box-sizing").as_deref() == Some("border-box")
    }

    /// A specified `width`-like property as a border-box size.
    fn border_size(&self, node: NodeId, prop: &str, base: Option<f32>, chrome: f32) -> Option<f32> {
        let raw = specified(self.doc, node, prop)?;
        if raw.contains('%') && base.is_none() {
            return None;
        }
        let size = parse_length(&raw, self.ctx(node, base.unwrap_or(0.0)))?;
        Some(if self.is_border_box(node) {
            size.max(chrome)
        } else {
            size + chrome
        })
    }

    fn clamp_size(&self, node: NodeId, axis: &str, size: f32, base: Option<f32>, chrome: f32) -> f32 {
        let mut size = size;
        if let Some(max) = self.border_size(node, &format!("max-{axis}"), base, chrome) {
            size = size.min(max);
        }
        if let Some(min) = self.border_size(node, &format!("min-{axis}"), base, chrome) {
            size = size.max(min);
        }
        size
    }

    fn line_height(&self, node: NodeId, font_size: f32) -> f32 {
        let Some(value) = self.keyword(node, "line-height") else {
            return font::line_height(font_size);
        };
        if value == "normal" {
            return font::line_height(font_size);
        }
        if let Ok(factor) = value.parse::<f32>() {
            return factor * font_size;
        }
        let ctx = LengthContext {
            percent_base: font_size,
            font_size,
            viewport: self.viewport,
        };
        parse_length(&value, ctx).unwrap_or_else(|| font::line_height(font_size))
    }

    fn layout_element(
        &mut self,
        node: NodeId,
        cb: Containing,
        sizing: Sizing,
        force_height: Option<f32>,
    ) -> LayoutBox {
        let model = self.box_model(node, cb.width);
        if self.is_replaced(node) {
            return self.layout_replaced(node, cb, model, sizing, force_height);
        }

        let display = self.display(node);
        let chrome_w = model.border.horizontal() + model.padding.horizontal();
        let chrome_h = model.border.vertical() + model.padding.vertical();

        let border_w = match sizing {
            Sizing::Exact(w) => w,
            Sizing::Fill(avail) | Sizing::Shrink(avail) => {
                let avail = (avail - model.margin.horizontal()).max(0.0);
                let used = match (self.border_size(node, "width", Some(cb.width), chrome_w), sizing) {
                    (Some(w), _) => w,
                    (None, Sizing::Shrink(_)) => self.max_content_width(node).min(avail),
                    (None, _) => avail,
                };
                self.clamp_size(node, "width", used, Some(cb.width), chrome_w)
            }
        };
        let content_w = (border_w - chrome_w).max(0.0);

        let specified_h = force_height.or_else(|| self.border_size(node, "height", cb.height, chrome_h));
        let inner = Containing {
            width: content_w,
            height: specified_h.map(|h| (h - chrome_h).max(0.0)),
        };
        let origin = (
            model.margin.left + model.border.left + model.padding.left,
            model.margin.top + model.border.top + model.padding.top,
        );

        let positioned = self.position(node) != "static";
        if positioned {
            self.pending.push(Vec::new());
        }
        let is_flex = display.ends_with("flex");
        let (children, content_h) = if is_flex {
            self.layout_flex(node, origin, inner)
        } else {
            self.layout_flow(node, origin, inner)
        };

        let border_h = match specified_h {
            Some(h) if force_height.is_some() => h,
            Some(h) => self.clamp_size(node, "height", h, cb.height, chrome_h),
            None => self.clamp_size(node, "height", content_h + chrome_h, cb.height, chrome_h),
        };

        let kind = if is_flex {
            BoxKind::Flex
        } else if display.starts_with("inline") {
            BoxKind::Inline
        } else {
            BoxKind::Block
        };
        let mut lb = LayoutBox {
            node,
            kind,
            rect: Rect::new(model.margin.left, model.margin.top, border_w, border_h),
            box_model: model,
            children,
        };
        if positioned {
            let deferred = self.pending.pop().unwrap_or_default();
            self.place_absolutes(&mut lb, deferred);
        }
        lb
    }

    /// Content size of an `img` or `svg` before min/max constraints.
    fn replaced_size(&self, node: NodeId, cb: Containing, model: &BoxModel) -> (f32, f32) {
        let chrome_w = model.border.horizontal() + model.padding.horizontal();
        let chrome_h = model.border.vertical() + model.padding.vertical();
        let natural = match self.tag(node) {
            "img" => self
                .doc
                .image_source(node)
                .and_then(|src| self.doc.images().slot(&src))
                .and_then(|slot| slot.pixmap())
                .map(|p| (p.width() as f32, p.height() as f32)),
            _ => None,
        };
        let ratio = match natural {
            Some((w, h)) if w > 0.0 && h > 0.0 => Some(w / h),
            _ => self.view_box_ratio(node),
        };
        let attr = |name: &str| {
            self.doc
                .element(node)
                .and_then(|e| e.attr(name))
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
        };
        let width = self
            .border_size(node, "width", Some(cb.width), chrome_w)
            .map(|w| w - chrome_w)
            .or_else(|| attr("width"));
        let height = self
            .border_size(node, "height", cb.height, chrome_h)
            .map(|h| h - chrome_h)
            .or_else(|| attr("height"));
        let fallback = match (natural, self.tag(node)) {
            (Some(size), _) => size,
            (None, "svg") => (300.0, 150.0),
            _ => (0.0, 0.0),
        };
        match (width, height, ratio) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some(r)) => (w, w / r),
            (Some(w), None, None) => (w, fallback.1),
            (None, Some(h), Some(r)) => (h * r, h),
            (None, Some(h), None) => (fallback.0, h),
            (None, None, _) => fallback,
        }
    }

    fn view_box_ratio(&self, node: NodeId) -> Option<f32> {
        let vb = self.doc.element(node)?.attr("viewBox")?;
        let parts: Vec<f32> = vb
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        match parts.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some(w / h),
            _ => None,
        }
    }

    fn layout_replaced(
        &mut self,
        node: NodeId,
        cb: Containing,
        model: BoxModel,
        sizing: Sizing,
        force_height: Option<f32>,
    ) -> LayoutBox {
        let chrome_w = model.border.horizontal() + model.padding.horizontal();
        let chrome_h = model.border.vertical() + model.padding.vertical();
        let (mut w, mut h) = self.replaced_size(node, cb, &model);
        let ratio = (w > 0.0 && h > 0.0).then(|| w / h);
        let height_is_auto = specified(self.doc, node, "height").is_none()
            && self.doc.element(node).and_then(|e| e.attr("height")).is_none();

        let clamped = self.clamp_size(node, "width", w + chrome_w, Some(cb.width), chrome_w) - chrome_w;
        if (clamped - w).abs() > f32::EPSILON {
            if let (Some(r), true) = (ratio, height_is_auto) {
                h = clamped / r;
            }
            w = clamped;
        }
        if let Sizing::Exact(bw) = sizing {
            w = (bw - chrome_w).max(0.0);
        }
        if let Some(fh) = force_height {
            h = (fh - chrome_h).max(0.0);
        } else {
            h = self.clamp_size(node, "height", h + chrome_h, cb.height, chrome_h) - chrome_h;
        }

        LayoutBox {
            node,
            kind: if self.tag(node) == "img" {
                BoxKind::Image
            } else {
                BoxKind::Svg
            },
            rect: Rect::new(model.margin.left, model.margin.top, w + chrome_w, h + chrome_h),
            box_model: model,
            children: Vec::new(),
        }
    }

    fn text_box(&self, node: NodeId, parent: NodeId, text: &str) -> Option<LayoutBox> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return None;
        }
        let font_size = self.doc.font_size_px(parent);
        let width = font::measure_width(&text, font_size);
        let height = self.line_height(parent, font_size);
        Some(LayoutBox {
            node,
            kind: BoxKind::Text { text, font_size },
            rect: Rect::new(0.0, 0.0, width, height),
            box_model: BoxModel::default(),
            children: Vec::new(),
        })
    }

    /// Widest the element gets without wrapping, as a border-box width.
    fn max_content_width(&self, node: NodeId) -> f32 {
        let Some(data) = self.doc.node(node).map(|n| n.data()) else {
            return 0.0;
        };
        if let NodeData::Text(text) = data {
            let parent = self.doc.parent(node).unwrap_or(node);
            return self.text_box(node, parent, text).map(|b| b.rect.width).unwrap_or(0.0);
        }
        let display = self.display(node);
        if display == "none" {
            return 0.0;
        }
        let model = self.box_model(node, 0.0);
        let chrome = model.border.horizontal() + model.padding.horizontal();
        if self.is_replaced(node) {
            let cb = Containing {
                width: 0.0,
                height: None,
            };
            return self.replaced_size(node, cb, &model).0 + chrome;
        }
        if let Some(raw) = specified(self.doc, node, "width") {
            if !raw.contains('%') {
                if let Some(w) = self.border_size(node, "width", None, chrome) {
                    return w;
                }
            }
        }

        let row = display.ends_with("flex")
            && !self
                .keyword(node, "flex-direction")
                .is_some_and(|d| d.starts_with("column"));
        let gap = if row { self.gaps(node).1 } else { 0.0 };

        let mut widest = 0.0f32;
        let mut line = 0.0f32;
        let mut count = 0usize;
        for &child in self.doc.children(node) {
            let outer = match self.doc.element(child) {
                Some(_) => {
                    let child_display = self.display(child);
                    if child_display == "none"
                        || matches!(self.position(child).as_str(), "absolute" | "fixed")
                    {
                        continue;
                    }
                    let margin = self.edges(child, "margin", 0.0).horizontal();
                    let w = self.max_content_width(child) + margin;
                    if !row && self.is_block_level(child, &child_display) {
                        widest = widest.max(line).max(w);
                        line = 0.0;
                        continue;
                    }
                    w
                }
                None => self.max_content_width(child),
            };
            if outer <= 0.0 && self.doc.element(child).is_none() {
                continue;
            }
            if count > 0 && row {
                line += gap;
            }
            line += outer;
            count += 1;
        }
        widest.max(line) + chrome
    }

    /// Row and column gaps of a flex container.
    fn gaps(&self, node: NodeId) -> (f32, f32) {
        let base = 0.0;
        let (mut row, mut column) = (0.0, 0.0);
        if let Some(gap) = specified(self.doc, node, "gap") {
            let parts = split_whitespace_top_level(&gap);
            let ctx = self.ctx(node, base);
            row = parts.first().and_then(|p| parse_length(p, ctx)).unwrap_or(0.0);
            column = parts.get(1).and_then(|p| parse_length(p, ctx)).unwrap_or(row);
        }
        if let Some(v) = self.length(node, "row-gap", base) {
            row = v;
        }
        if let Some(v) = self.length(node, "column-gap", base) {
            column = v;
        }
        (row, column)
    }

    fn defer(&mut self, node: NodeId) {
        if let Some(list) = self.pending.last_mut() {
            list.push(node);
        }
    }

    fn apply_relative(&self, b: &mut LayoutBox, cb: Containing) {
        if self.doc.element(b.node).is_none() || self.position(b.node) != "relative" {
            return;
        }
        let height_base = cb.height.unwrap_or(0.0);
        let dx = match self.length(b.node, "left", cb.width) {
            Some(l) => l,
            None => -self.length(b.node, "right", cb.width).unwrap_or(0.0),
        };
        let dy = match self.length(b.node, "top", height_base) {
            Some(t) => t,
            None => -self.length(b.node, "bottom", height_base).unwrap_or(0.0),
        };
        b.translate(dx, dy);
    }

    fn layout_flow(&mut self, node: NodeId, origin: (f32, f32), cb: Containing) -> (Vec<LayoutBox>, f32) {
        let doc = self.doc;
        let align = self.keyword(node, "text-align").unwrap_or_default();
        let mut out = Vec::new();
        let mut line: Vec<LayoutBox> = Vec::new();
        let mut cursor = 0.0;

        for &child in doc.children(node) {
            match doc.node(child).map(|n| n.data()) {
                Some(NodeData::Text(text)) => {
                    if let Some(b) = self.text_box(child, node, text) {
                        line.push(b);
                    }
                }
                Some(NodeData::Element(_)) => {
                    let display = self.display(child);
                    if display == "none" {
                        continue;
                    }
                    if matches!(self.position(child).as_str(), "absolute" | "fixed") {
                        self.defer(child);
                        continue;
                    }
                    if self.is_block_level(child, &display) {
                        cursor += self.flush_line(&mut line, &mut out, (origin.0, origin.1 + cursor), cb, &align);
                        let mut b = self.layout_element(child, cb, Sizing::Fill(cb.width), None);
                        b.translate(origin.0, origin.1 + cursor);
                        cursor += b.outer_height();
                        self.apply_relative(&mut b, cb);
                        out.push(b);
                    } else {
                        line.push(self.layout_element(child, cb, Sizing::Shrink(cb.width), None));
                    }
                }
                None => {}
            }
        }
        cursor += self.flush_line(&mut line, &mut out, (origin.0, origin.1 + cursor), cb, &align);
        (out, cursor)
    }

    /// Place one line of inline-level boxes, bottom aligned. Returns its height.
    fn flush_line(
        &self,
        line: &mut Vec<LayoutBox>,
        out: &mut Vec<LayoutBox>,
        origin: (f32, f32),
        cb: Containing,
        align: &str,
    ) -> f32 {
        if line.is_empty() {
            return 0.0;
        }
        let total: f32 = line.iter().map(LayoutBox::outer_width).sum();
        let height = line.iter().map(LayoutBox::outer_height).fold(0.0, f32::max);
        let slack = (cb.width - total).max(0.0);
        let mut x = origin.0
            + match align {
                "center" => slack / 2.0,
                "right" | "end" => slack,
                _ => 0.0,
            };
        for mut b in line.drain(..) {
            let dy = origin.1 + height - b.outer_height();
            let w = b.outer_width();
            b.translate(x, dy);
            x += w;
            self.apply_relative(&mut b, cb);
            out.push(b);
        }
        height
    }

    fn layout_flex(&mut self, node: NodeId, origin: (f32, f32), cb: Containing) -> (Vec<LayoutBox>, f32) {
        let column = self
            .keyword(node, "flex-direction")
            .is_some_and(|d| d.starts_with("column"));
        let justify = self.keyword(node, "justify-content").unwrap_or_default();
        let align = self
            .keyword(node, "align-items")
            .unwrap_or_else(|| "stretch".to_string());
        let (row_gap, column_gap) = self.gaps(node);
        let gap = if column { row_gap } else { column_gap };

        let doc = self.doc;
        let mut items: Vec<LayoutBox> = Vec::new();
        for &child in doc.children(node) {
            match doc.node(child).map(|n| n.data()) {
                Some(NodeData::Text(text)) => {
                    if let Some(b) = self.text_box(child, node, text) {
                        items.push(b);
                    }
                }
                Some(NodeData::Element(_)) => {
                    if self.display(child) == "none" {
                        continue;
                    }
                    if matches!(self.position(child).as_str(), "absolute" | "fixed") {
                        self.defer(child);
                        continue;
                    }
                    let stretch_width = column
                        && align == "stretch"
                        && specified(self.doc, child, "width").is_none()
                        && !self.is_replaced(child);
                    let sizing = if stretch_width {
                        Sizing::Fill(cb.width)
                    } else {
                        Sizing::Shrink(cb.width)
                    };
                    items.push(self.layout_element(child, cb, sizing, None));
                }
                None => {}
            }
        }

        let gaps = gap * items.len().saturating_sub(1) as f32;
        let main_of = |b: &LayoutBox| if column { b.outer_height() } else { b.outer_width() };

        // flex-grow
        let main_avail = if column { cb.height } else { Some(cb.width) };
        if let Some(avail) = main_avail {
            let used: f32 = items.iter().map(main_of).sum::<f32>() + gaps;
            let grows: Vec<f32> = items
                .iter()
                .map(|b| match b.kind {
                    BoxKind::Text { .. } => 0.0,
                    _ => self
                        .keyword(b.node, "flex-grow")
                        .or_else(|| self.keyword(b.node, "flex").filter(|f| f.parse::<f32>().is_ok()))
                        .and_then(|g| g.parse::<f32>().ok())
                        .unwrap_or(0.0),
                })
                .collect();
            let total: f32 = grows.iter().sum();
            let free = avail - used;
            if free > 0.0 && total > 0.0 {
                for (item, grow) in items.iter_mut().zip(grows) {
                    if grow <= 0.0 {
                        continue;
                    }
                    let extra = free * grow / total;
                    *item = if column {
                        let h = item.rect.height + extra;
                        self.layout_element(item.node, cb, Sizing::Exact(item.rect.width), Some(h))
                    } else {
                        let w = item.rect.width + extra;
                        self.layout_element(item.node, cb, Sizing::Exact(w), None)
                    };
                }
            }
        }

        let cross = if column {
            cb.width
        } else {
            cb.height
                .unwrap_or_else(|| items.iter().map(LayoutBox::outer_height).fold(0.0, f32::max))
        };

        if !column && align == "stretch" {
            for item in items.iter_mut() {
                if matches!(item.kind, BoxKind::Text { .. } | BoxKind::Image | BoxKind::Svg)
                    || specified(self.doc, item.node, "height").is_some()
                {
                    continue;
                }
                let target = cross - item.box_model.margin.vertical();
                if target > item.rect.height {
                    *item = self.layout_element(item.node, cb, Sizing::Exact(item.rect.width), Some(target));
                }
            }
        }

        let used: f32 = items.iter().map(main_of).sum::<f32>() + gaps;
        let main_size = if column { cb.height.unwrap_or(used) } else { cb.width };
        let free = (main_size - used).max(0.0);
        let n = items.len() as f32;
        let (lead, between) = match justify.as_str() {
            "center" => (free / 2.0, 0.0),
            "flex-end" | "end" | "right" => (free, 0.0),
            "space-between" if n > 1.0 => (0.0, free / (n - 1.0)),
            "space-around" if n > 0.0 => (free / n / 2.0, free / n),
            "space-evenly" => (free / (n + 1.0), free / (n + 1.0)),
            _ => (0.0, 0.0),
        };

        let mut main = lead;
        let mut out = Vec::with_capacity(items.len());
        for mut item in items {
            let item_cross = if column { item.outer_width() } else { item.outer_height() };
            let offset = match align.as_str() {
                "center" => (cross - item_cross) / 2.0,
                "flex-end" | "end" => cross - item_cross,
                _ => 0.0,
            };
            let (dx, dy) = if column { (offset, main) } else { (main, offset) };
            main += main_of(&item) + gap + between;
            item.translate(origin.0 + dx, origin.1 + dy);
            self.apply_relative(&mut item, cb);
            out.push(item);
        }

        let content_h = if column { cb.height.unwrap_or(used) } else { cross };
        (out, content_h)
    }

    fn place_absolutes(&mut self, container: &mut LayoutBox, nodes: Vec<NodeId>) {
        let pb = container.padding_box();
        let cb = Containing {
            width: pb.width,
            height: Some(pb.height),
        };
        for node in nodes {
            let left = self.length(node, "left", pb.width);
            let right = self.length(node, "right", pb.width);
            let top = self.length(node, "top", pb.height);
            let bottom = self.length(node, "bottom", pb.height);
            let margin = self.edges(node, "margin", pb.width);

            let sizing = match (left, right, specified(self.doc, node, "width")) {
                (Some(l), Some(r), None) => Sizing::Fill(pb.width - l - r),
                _ => Sizing::Shrink(pb.width),
            };
            let force_height = match (top, bottom, specified(self.doc, node, "height")) {
                (Some(t), Some(b), None) if !self.is_replaced(node) => {
                    Some((pb.height - t - b - margin.vertical()).max(0.0))
                }
                _ => None,
            };
            let mut b = self.layout_element(node, cb, sizing, force_height);
            let x = match (left, right) {
                (Some(l), _) => pb.x + l,
                (None, Some(r)) => pb.right() - r - b.outer_width(),
                (None, None) => pb.x,
            };
            let y = match (top, bottom) {
                (Some(t), _) => pb.y + t,
                (None, Some(bt)) => pb.bottom() - bt - b.outer_height(),
                (None, None) => pb.y,
            };
            b.translate(x, y);

            let parent = self.doc.parent(node);
            let host = match parent {
                Some(p) if p != container.node => container.find_mut(p),
                _ => None,
            };
            match host {
                Some(host) => host.children.push(b),
                None => container.children.push(b),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(markup: &str, id: &str) -> (Document, LayoutBox) {
        let doc = Document::parse_html(markup, None).unwrap();
        let root = doc.get_element_by_id(id).unwrap();
        let options = LayoutOptions {
            viewport: (800.0, 600.0),
        };
        let tree = layout_subtree(&doc, root, &options).unwrap();
        (doc, tree)
    }

    #[test]
    fn stacks_blocks_inside_padding() {
        let (doc, tree) = layout(
            r#"<div id="card" style="width: 200px; padding: 10px; border: 2px solid red">
                 <div id="a" style="height: 30px"></div>
                 <div id="b" style="height: 20px; margin-top: 5px"></div>
               </div>"#,
            "card",
        );
        assert_eq!(tree.rect, Rect::new(0.0, 0.0, 224.0, 79.0));
        let a = tree.find(doc.get_element_by_id("a").unwrap()).unwrap();
        assert_eq!(a.rect, Rect::new(12.0, 12.0, 200.0, 30.0));
        let b = tree.find(doc.get_element_by_id("b").unwrap()).unwrap();
        assert_eq!(b.rect.y, 47.0);
    }

    #[test]
    fn border_box_sizing_and_viewport_units() {
        let (_, tree) = layout(
            r#"<div id="card" style="width: 50vw; height: 10vh; padding: 8px; box-sizing: border-box"></div>"#,
            "card",
        );
        assert_eq!((tree.rect.width, tree.rect.height), (400.0, 60.0));
        assert_eq!(tree.content_box().width, 384.0);
    }

    #[test]
    fn absolute_children_anchor_to_positioned_ancestor() {
        let (doc, tree) = layout(
            r#"<div id="card" style="position: relative; width: 300px; height: 200px">
                 <div><span id="mark" style="position: absolute; right: 10px; bottom: 10px; width: 40px; height: 20px"></span></div>
               </div>"#,
            "card",
        );
        let mark = tree.find(doc.get_element_by_id("mark").unwrap()).unwrap();
        assert_eq!(mark.rect, Rect::new(250.0, 170.0, 40.0, 20.0));
    }

    #[test]
    fn flex_row_centers_items() {
        let (doc, tree) = layout(
            r#"<div id="card" style="display: flex; justify-content: center; align-items: center; width: 200px; height: 100px">
                 <div id="a" style="width: 40px; height: 20px"></div>
                 <div id="b" style="width: 60px; height: 40px"></div>
               </div>"#,
            "card",
        );
        let a = tree.find(doc.get_element_by_id("a").unwrap()).unwrap();
        let b = tree.find(doc.get_element_by_id("b").unwrap()).unwrap();
        assert_eq!(a.rect, Rect::new(50.0, 40.0, 40.0, 20.0));
        assert_eq!(b.rect, Rect::new(90.0, 30.0, 60.0, 40.0));
    }

    #[test]
    fn flex_grow_fills_free_space() {
        let (doc, tree) = layout(
            r#"<div id="card" style="display: flex; width: 200px; gap: 10px">
                 <div style="width: 50px; height: 10px"></div>
                 <div id="grow" style="flex-grow: 1; height: 10px"></div>
               </div>"#,
            "card",
        );
        let grow = tree.find(doc.get_element_by_id("grow").unwrap()).unwrap();
        assert_eq!(grow.rect.x, 60.0);
        assert_eq!(grow.rect.width, 140.0);
    }

    #[test]
    fn images_use_natural_size_and_max_width() {
        let markup = r#"<div id="card" style="width: 100px"><img id="shot" src="shot.png" style="max-width: 100%"></div>"#;
        let doc = Document::parse_html(markup, None).unwrap();
        doc.images()
            .preload("shot.png", &crate::assets::solid_png(400, 200, [0, 0, 255, 255]))
            .unwrap();
        let root = doc.get_element_by_id("card").unwrap();
        let options = LayoutOptions {
            viewport: (800.0, 600.0),
        };
        let tree = layout_subtree(&doc, root, &options).unwrap();
        let img = tree.find(doc.get_element_by_id("shot").unwrap()).unwrap();
        assert_eq!(img.kind, BoxKind::Image);
        assert_eq!((img.rect.width, img.rect.height), (100.0, 50.0));
    }

    #[test]
    fn text_runs_align_in_lines() {
        let (_, tree) = layout(
            r#"<div id="card" style="width: 200px; font-size: 16px; text-align: right">stage</div>"#,
            "card",
        );
        let text = &tree.children[0];
        assert!(matches!(&text.kind, BoxKind::Text { text, .. } if text == "stage"));
        assert_eq!(text.rect.width, 58.0);
        assert_eq!(text.rect.x, 142.0);
        assert!((tree.rect.height - 19.2).abs() < 0.01);
    }

    #[test]
    fn border_shorthands_resolve_per_side() {
        let doc = Document::parse_html(
            r#"<div id="x" style="border: 2px solid red; border-left: 4px dashed blue; border-top-style: none"></div>"#,
            None,
        )
        .unwrap();
        let x = doc.get_element_by_id("x").unwrap();
        let ctx = LengthContext {
            percent_base: 0.0,
            font_size: 16.0,
            viewport: (0.0, 0.0),
        };
        assert_eq!(border_side(&doc, x, 0, ctx).width, 0.0);
        assert_eq!(border_side(&doc, x, 1, ctx).color.as_deref(), Some("red"));
        let left = border_side(&doc, x, 3, ctx);
        assert_eq!((left.width, left.style.as_str()), (4.0, "dashed"));
    }

    #[test]
    fn hidden_root_has_no_layout() {
        let doc = Document::parse_html(r#"<div id="x" style="display: none"></div>"#, None).unwrap();
        let x = doc.get_element_by_id("x").unwrap();
        let options = LayoutOptions {
            viewport: (10.0, 10.0),
        };
        assert!(layout_subtree(&doc, x, &options).is_none());
    }
}
