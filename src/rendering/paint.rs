//! Display list construction.
//!
//! The painter reads styles the way the rasterizer understands them: values
//! are taken as specified (custom properties substituted) and colors go
//! through [`parse_legacy_color`], so anything written with a modern color
//! function paints as transparent unless the normalizer rewrote it first.

use std::sync::Arc;

use log::debug;
use tiny_skia::{Path, Pixmap, Transform};

use crate::css::color::{parse_legacy_color, Rgba};
use crate::css::{matching_paren, parse_length, split_top_level, split_whitespace_top_level, LengthContext};
use crate::dom::{Document, NodeId};

use super::layout::{border_side, specified, BoxKind, Edges, LayoutBox, Rect};
use super::vector;

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Rgba),
    /// CSS angle in degrees (0 points up, 90 points right) and `(offset, color)` stops
    LinearGradient { angle: f32, stops: Vec<(f32, Rgba)> },
}

/// How an image is fitted into its destination box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFit {
    Fill,
    Contain,
    Cover,
    /// Natural size, anchored top-left
    None,
    ScaleDown,
}

impl ImageFit {
    fn from_keyword(value: &str) -> Self {
        match value.trim() {
            "contain" => ImageFit::Contain,
            "cover" => ImageFit::Cover,
            "none" => ImageFit::None,
            "scale-down" => ImageFit::ScaleDown,
            _ => ImageFit::Fill,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PaintCommand {
    Shadow {
        rect: Rect,
        radius: f32,
        color: Rgba,
        blur: f32,
    },
    Background {
        rect: Rect,
        radius: f32,
        fill: Fill,
    },
    Image {
        rect: Rect,
        radius: f32,
        image: Arc<Pixmap>,
        fit: ImageFit,
    },
    Border {
        rect: Rect,
        radius: f32,
        widths: Edges,
        colors: [Rgba; 4],
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        font_size: f32,
        color: Rgba,
    },
    Path {
        path: Path,
        fill: Option<Rgba>,
        stroke: Option<(Rgba, f32)>,
    },
}

/// Rounded clip applied to everything painted inside an `overflow: hidden` box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clip {
    pub rect: Rect,
    pub radius: f32,
    pub transform: Transform,
}

#[derive(Debug, Clone)]
pub struct DisplayItem {
    pub command: PaintCommand,
    pub transform: Transform,
    pub opacity: f32,
    pub clip: Option<Clip>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintOptions {
    /// Sample cross-origin images instead of skipping them.
    pub allow_cross_origin: bool,
    pub viewport: (f32, f32),
}

#[derive(Debug, Clone, Copy)]
struct Stacking {
    transform: Transform,
    opacity: f32,
    clip: Option<Clip>,
}

/// Walk a layout tree and produce the commands that paint it, back to front.
pub fn build_display_list(doc: &Document, root: &LayoutBox, options: &PaintOptions) -> Vec<DisplayItem> {
    let mut painter = Painter {
        doc,
        options: *options,
        items: Vec::new(),
    };
    let stacking = Stacking {
        transform: Transform::identity(),
        opacity: 1.0,
        clip: None,
    };
    painter.paint_box(root, stacking);
    painter.items
}

struct Painter<'a> {
    doc: &'a Document,
    options: PaintOptions,
    items: Vec<DisplayItem>,
}

impl<'a> Painter<'a> {
    fn push(&mut self, command: PaintCommand, stacking: &Stacking) {
        self.items.push(DisplayItem {
            command,
            transform: stacking.transform,
            opacity: stacking.opacity,
            clip: stacking.clip,
        });
    }

    fn ctx(&self, node: NodeId, base: f32) -> LengthContext {
        LengthContext {
            percent_base: base,
            font_size: self.doc.font_size_px(node),
            viewport: self.options.viewport,
        }
    }

    /// The element's `color`, black when undeclared, transparent when unparseable.
    fn current_color(&self, node: NodeId) -> Rgba {
        match specified(self.doc, node, "color") {
            Some(v) => parse_legacy_color(&v).unwrap_or(Rgba::TRANSPARENT),
            None => Rgba::new(0, 0, 0, 1.0),
        }
    }

    fn color_value(&self, node: NodeId, value: &str) -> Option<Rgba> {
        if value.trim().eq_ignore_ascii_case("currentcolor") {
            return Some(self.current_color(node));
        }
        parse_legacy_color(value)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        specified(self.doc, node, "visibility").map_or(true, |v| {
            let v = v.trim().to_ascii_lowercase();
            v != "hidden" && v != "collapse"
        })
    }

    fn paint_box(&mut self, b: &LayoutBox, parent: Stacking) {
        if let BoxKind::Text { text, font_size } = &b.kind {
            let owner = self.doc.parent(b.node).unwrap_or(b.node);
            if !self.is_visible(owner) {
                return;
            }
            let color = self.current_color(owner);
            if !color.is_transparent() {
                let command = PaintCommand::Text {
                    x: b.rect.x,
                    y: b.rect.y,
                    text: text.clone(),
                    font_size: *font_size,
                    color,
                };
                self.push(command, &parent);
            }
            return;
        }

        let node = b.node;
        let opacity = specified(self.doc, node, "opacity")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .map_or(1.0, |o| o.clamp(0.0, 1.0));
        let mut stacking = Stacking {
            transform: parent.transform.pre_concat(self.local_transform(b)),
            opacity: parent.opacity * opacity,
            clip: parent.clip,
        };
        if stacking.opacity <= 0.0 {
            return;
        }

        let radius = self.border_radius(b);
        if self.is_visible(node) {
            self.paint_shadows(b, radius, &stacking);
            self.paint_background(b, radius, &stacking);
            match b.kind {
                BoxKind::Image => self.paint_image(b, radius, &stacking),
                BoxKind::Svg => {
                    for shape in vector::svg_shapes(self.doc, node, b.content_box()) {
                        let command = PaintCommand::Path {
                            path: shape.path,
                            fill: shape.fill,
                            stroke: shape.stroke,
                        };
                        self.push(command, &stacking);
                    }
                }
                _ => {}
            }
            self.paint_border(b, radius, &stacking);
        }

        let overflow = specified(self.doc, node, "overflow")
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if overflow == "hidden" || overflow == "clip" {
            let inner = (radius - b.box_model.border.left.max(b.box_model.border.top)).max(0.0);
            stacking.clip = Some(Clip {
                rect: b.padding_box(),
                radius: inner,
                transform: stacking.transform,
            });
        }

        // In-flow children first, then positioned ones, each in tree order.
        let positioned = |c: &LayoutBox| {
            self.doc.element(c.node).is_some()
                && specified(self.doc, c.node, "position").is_some_and(|p| p.trim() != "static")
        };
        let (flow, layered): (Vec<&LayoutBox>, Vec<&LayoutBox>) =
            b.children.iter().partition(|c| !positioned(c));
        for child in flow.into_iter().chain(layered) {
            self.paint_box(child, stacking);
        }
    }

    fn local_transform(&self, b: &LayoutBox) -> Transform {
        let Some(value) = specified(self.doc, b.node, "transform") else {
            return Transform::identity();
        };
        let value = value.trim().to_ascii_lowercase();
        if value == "none" || value.is_empty() {
            return Transform::identity();
        }
        let (cx, cy) = (b.rect.x + b.rect.width / 2.0, b.rect.y + b.rect.height / 2.0);
        let mut ts = Transform::from_translate(cx, cy);
        let mut rest = value.as_str();
        while let Some(open) = rest.find('(') {
            let Some(close) = matching_paren(rest, open) else {
                break;
            };
            let name = rest[..open].trim();
            let args: Vec<&str> = rest[open + 1..close]
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            let len_x = |s: &str| parse_length(s, self.ctx(b.node, b.rect.width)).unwrap_or(0.0);
            let len_y = |s: &str| parse_length(s, self.ctx(b.node, b.rect.height)).unwrap_or(0.0);
            let number = |s: &str| s.parse::<f32>().ok();
            let step = match (name, args.as_slice()) {
                ("translate", [x]) => Transform::from_translate(len_x(x), 0.0),
                ("translate", [x, y]) => Transform::from_translate(len_x(x), len_y(y)),
                ("translatex", [x]) => Transform::from_translate(len_x(x), 0.0),
                ("translatey", [y]) => Transform::from_translate(0.0, len_y(y)),
                ("scale", [s]) => number(s).map_or(Transform::identity(), |s| Transform::from_scale(s, s)),
                ("scale", [sx, sy]) => match (number(sx), number(sy)) {
                    (Some(sx), Some(sy)) => Transform::from_scale(sx, sy),
                    _ => Transform::identity(),
                },
                ("scalex", [s]) => number(s).map_or(Transform::identity(), |s| Transform::from_scale(s, 1.0)),
                ("scaley", [s]) => number(s).map_or(Transform::identity(), |s| Transform::from_scale(1.0, s)),
                ("rotate", [a]) => angle_degrees(a).map_or(Transform::identity(), Transform::from_rotate),
                _ => {
                    debug!("ignoring unsupported transform function {name}()");
                    Transform::identity()
                }
            };
            ts = ts.pre_concat(step);
            rest = &rest[close + 1..];
        }
        ts.pre_concat(Transform::from_translate(-cx, -cy))
    }

    fn border_radius(&self, b: &LayoutBox) -> f32 {
        let Some(value) = specified(self.doc, b.node, "border-radius") else {
            return 0.0;
        };
        let short_side = b.rect.width.min(b.rect.height);
        split_whitespace_top_level(&value)
            .first()
            .and_then(|first| parse_length(first, self.ctx(b.node, short_side)))
            .map_or(0.0, |r| r.clamp(0.0, short_side / 2.0))
    }

    fn paint_shadows(&mut self, b: &LayoutBox, radius: f32, stacking: &Stacking) {
        let Some(value) = specified(self.doc, b.node, "box-shadow") else {
            return;
        };
        if value.trim().eq_ignore_ascii_case("none") {
            return;
        }
        let ctx = self.ctx(b.node, 0.0);
        // The first shadow in the list is on top.
        for shadow in split_top_level(&value, ',').into_iter().rev() {
            let mut lengths = Vec::new();
            let mut color = None;
            let mut inset = false;
            for token in split_whitespace_top_level(shadow) {
                if token.eq_ignore_ascii_case("inset") {
                    inset = true;
                } else if let Some(len) = parse_length(token, ctx) {
                    lengths.push(len);
                } else {
                    color = Some(token);
                }
            }
            if inset || lengths.len() < 2 {
                continue;
            }
            let color = match color {
                Some(c) => match self.color_value(b.node, c) {
                    Some(c) => c,
                    None => continue,
                },
                None => self.current_color(b.node),
            };
            if color.is_transparent() {
                continue;
            }
            let blur = lengths.get(2).copied().unwrap_or(0.0).max(0.0);
            let spread = lengths.get(3).copied().unwrap_or(0.0);
            let rect = Rect::new(
                b.rect.x + lengths[0] - spread,
                b.rect.y + lengths[1] - spread,
                b.rect.width + spread * 2.0,
                b.rect.height + spread * 2.0,
            );
            let command = PaintCommand::Shadow {
                rect,
                radius: (radius + spread).max(0.0),
                color,
                blur,
            };
            self.push(command, stacking);
        }
    }

    fn paint_background(&mut self, b: &LayoutBox, radius: f32, stacking: &Stacking) {
        let node = b.node;
        let mut color = None;
        let mut layers: Vec<String> = Vec::new();

        if let Some(short) = specified(self.doc, node, "background") {
            for token in split_whitespace_top_level(&short) {
                let lower = token.to_ascii_lowercase();
                if lower.starts_with("linear-gradient(") || lower.starts_with("url(") {
                    layers.push(token.to_string());
                } else if let Some(c) = self.color_value(node, token) {
                    color = Some(c);
                }
            }
        }
        if let Some(image) = specified(self.doc, node, "background-image") {
            layers = split_top_level(&image, ',')
                .into_iter()
                .filter(|l| !l.eq_ignore_ascii_case("none"))
                .map(str::to_string)
                .collect();
        }
        if let Some(c) = specified(self.doc, node, "background-color") {
            color = Some(self.color_value(node, &c).unwrap_or(Rgba::TRANSPARENT));
        }

        if let Some(color) = color.filter(|c| !c.is_transparent()) {
            let command = PaintCommand::Background {
                rect: b.rect,
                radius,
                fill: Fill::Solid(color),
            };
            self.push(command, stacking);
        }

        let size = specified(self.doc, node, "background-size")
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();
        // The first layer is on top.
        for layer in layers.iter().rev() {
            let lower = layer.to_ascii_lowercase();
            if lower.starts_with("linear-gradient(") {
                match parse_linear_gradient(layer) {
                    Some(fill) => {
                        let command = PaintCommand::Background {
                            rect: b.rect,
                            radius,
                            fill,
                        };
                        self.push(command, stacking);
                    }
                    None => debug!("unparseable gradient '{layer}' painted as transparent"),
                }
            } else if let Some(href) = url_argument(layer) {
                let src = self.doc.resolve_url(&href);
                let Some(image) = self.sample_image(&src) else {
                    continue;
                };
                let fit = match size.as_str() {
                    "cover" => ImageFit::Cover,
                    "contain" => ImageFit::Contain,
                    "100% 100%" => ImageFit::Fill,
                    _ => ImageFit::None,
                };
                let command = PaintCommand::Image {
                    rect: b.padding_box(),
                    radius,
                    image,
                    fit,
                };
                self.push(command, stacking);
            }
        }
    }

    fn sample_image(&self, src: &str) -> Option<Arc<Pixmap>> {
        if !self.options.allow_cross_origin && self.doc.images().is_cross_origin(src) {
            debug!("skipping cross-origin image {src}");
            return None;
        }
        self.doc.images().slot(src)?.pixmap()
    }

    fn paint_image(&mut self, b: &LayoutBox, radius: f32, stacking: &Stacking) {
        let Some(src) = self.doc.image_source(b.node) else {
            return;
        };
        let Some(image) = self.sample_image(&src) else {
            return;
        };
        let fit = specified(self.doc, b.node, "object-fit")
            .map(|v| ImageFit::from_keyword(&v.to_ascii_lowercase()))
            .unwrap_or(ImageFit::Fill);
        let inset = b.box_model.border.left.max(b.box_model.border.top);
        let command = PaintCommand::Image {
            rect: b.content_box(),
            radius: (radius - inset).max(0.0),
            image,
            fit,
        };
        self.push(command, stacking);
    }

    fn paint_border(&mut self, b: &LayoutBox, radius: f32, stacking: &Stacking) {
        let widths = b.box_model.border;
        if widths.horizontal() + widths.vertical() <= 0.0 {
            return;
        }
        let ctx = self.ctx(b.node, 0.0);
        let mut colors = [Rgba::TRANSPARENT; 4];
        for (idx, slot) in colors.iter_mut().enumerate() {
            let side = border_side(self.doc, b.node, idx, ctx);
            *slot = match side.color {
                Some(c) => self.color_value(b.node, &c).unwrap_or(Rgba::TRANSPARENT),
                None => self.current_color(b.node),
            };
        }
        if colors.iter().all(Rgba::is_transparent) {
            return;
        }
        let command = PaintCommand::Border {
            rect: b.rect,
            radius,
            widths,
            colors,
        };
        self.push(command, stacking);
    }
}

fn angle_degrees(token: &str) -> Option<f32> {
    let token = token.trim();
    let (number, factor) = if let Some(v) = token.strip_suffix("deg") {
        (v, 1.0)
    } else if let Some(v) = token.strip_suffix("grad") {
        (v, 0.9)
    } else if let Some(v) = token.strip_suffix("rad") {
        (v, 180.0 / std::f32::consts::PI)
    } else if let Some(v) = token.strip_suffix("turn") {
        (v, 360.0)
    } else if token == "0" {
        (token, 1.0)
    } else {
        return None;
    };
    number.parse::<f32>().ok().map(|v| v * factor)
}

/// Target of a `url(...)` value, quotes stripped.
pub(crate) fn url_argument(value: &str) -> Option<String> {
    let value = value.trim();
    if !value.to_ascii_lowercase().starts_with("url(") {
        return None;
    }
    let close = matching_paren(value, 3)?;
    let inner = value[4..close].trim().trim_matches(|c| c == '"' || c == '\'');
    (!inner.is_empty()).then(|| inner.to_string())
}

/// Parse `linear-gradient(...)` with the legacy color parser. Any stop the
/// parser rejects drops the whole gradient.
pub fn parse_linear_gradient(value: &str) -> Option<Fill> {
    let value = value.trim();
    let open = value.find('(')?;
    if !value[..open].eq_ignore_ascii_case("linear-gradient") {
        return None;
    }
    let close = matching_paren(value, open)?;
    let args = split_top_level(&value[open + 1..close], ',');
    let (angle, stop_args) = match args.first() {
        Some(first) if first.to_ascii_lowercase().starts_with("to ") => {
            (direction_angle(&first.to_ascii_lowercase())?, &args[1..])
        }
        Some(first) if angle_degrees(first).is_some() => (angle_degrees(first)?, &args[1..]),
        _ => (180.0, &args[..]),
    };

    let mut stops: Vec<(Option<f32>, Rgba)> = Vec::new();
    for stop in stop_args {
        let tokens = split_whitespace_top_level(stop);
        let color = parse_legacy_color(tokens.first()?)?;
        let offset = tokens
            .get(1)
            .and_then(|t| t.strip_suffix('%'))
            .and_then(|p| p.parse::<f32>().ok())
            .filter(|p| p.is_finite())
            .map(|p| p / 100.0);
        stops.push((offset, color));
    }
    match stops.len() {
        0 => None,
        1 => Some(Fill::Solid(stops[0].1)),
        _ => Some(Fill::LinearGradient {
            angle,
            stops: resolve_stop_offsets(&stops),
        }),
    }
}

/// Fill in missing stop offsets: ends default to 0 and 1, gaps interpolate.
fn resolve_stop_offsets(stops: &[(Option<f32>, Rgba)]) -> Vec<(f32, Rgba)> {
    let n = stops.len();
    let mut offsets: Vec<Option<f32>> = stops.iter().map(|s| s.0).collect();
    if offsets[0].is_none() {
        offsets[0] = Some(0.0);
    }
    if offsets[n - 1].is_none() {
        offsets[n - 1] = Some(1.0);
    }
    let mut i = 0;
    while i < n {
        if offsets[i].is_some() {
            i += 1;
            continue;
        }
        let start = i - 1;
        let mut end = i;
        while offsets[end].is_none() {
            end += 1;
        }
        let (a, b) = (offsets[start].unwrap_or(0.0), offsets[end].unwrap_or(1.0));
        for (k, slot) in offsets.iter_mut().enumerate().take(end).skip(i) {
            *slot = Some(a + (b - a) * (k - start) as f32 / (end - start) as f32);
        }
        i = end;
    }
    let mut last = 0.0f32;
    offsets
        .into_iter()
        .zip(stops)
        .map(|(o, (_, c))| {
            last = o.unwrap_or(last).clamp(last, 1.0);
            (last, *c)
        })
        .collect()
}

fn direction_angle(direction: &str) -> Option<f32> {
    let words: Vec<&str> = direction.split_whitespace().skip(1).collect();
    let has = |w: &str| words.contains(&w);
    let angle = match (has("top"), has("right"), has("bottom"), has("left")) {
        (true, false, false, false) => 0.0,
        (true, true, false, false) => 45.0,
        (false, true, false, false) => 90.0,
        (false, true, true, false) => 135.0,
        (false, false, true, false) => 180.0,
        (false, false, true, true) => 225.0,
        (false, false, false, true) => 270.0,
        (true, false, false, true) => 315.0,
        _ => return None,
    };
    Some(angle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{layout_subtree, LayoutOptions};

    fn display_list(markup: &str) -> Vec<DisplayItem> {
        let doc = Document::parse_html(markup, None).unwrap();
        let root = doc.get_element_by_id("card").unwrap();
        let tree = layout_subtree(&doc, root, &LayoutOptions { viewport: (400.0, 300.0) }).unwrap();
        build_display_list(
            &doc,
            &tree,
            &PaintOptions {
                allow_cross_origin: true,
                viewport: (400.0, 300.0),
            },
        )
    }

    #[test]
    fn gradient_stops_fill_in_offsets() {
        let fill = parse_linear_gradient("linear-gradient(to right, red, rgb(0, 255, 0) 75%, blue)").unwrap();
        let Fill::LinearGradient { angle, stops } = fill else {
            panic!("expected a gradient");
        };
        assert_eq!(angle, 90.0);
        let offsets: Vec<f32> = stops.iter().map(|s| s.0).collect();
        assert_eq!(offsets, vec![0.0, 0.75, 1.0]);

        let Some(Fill::LinearGradient { stops, angle }) =
            parse_linear_gradient("linear-gradient(45deg, red, white, white, blue)")
        else {
            panic!("expected a gradient");
        };
        assert_eq!(angle, 45.0);
        assert!((stops[1].0 - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn modern_colors_drop_gradients() {
        assert!(parse_linear_gradient("linear-gradient(oklch(0.7 0.1 200), red)").is_none());
    }

    #[test]
    fn unsupported_background_colors_paint_nothing() {
        let items = display_list(
            r#"<div id="card" style="width: 10px; height: 10px; background-color: oklch(0.7 0.1 200)"></div>"#,
        );
        assert!(items.is_empty());
        let items = display_list(
            r#"<div id="card" style="width: 10px; height: 10px; background-color: rgb(10, 20, 30)"></div>"#,
        );
        assert!(matches!(
            &items[0].command,
            PaintCommand::Background { fill: Fill::Solid(c), .. } if *c == Rgba::new(10, 20, 30, 1.0)
        ));
    }

    #[test]
    fn positioned_children_paint_last() {
        let items = display_list(
            r#"<div id="card" style="position: relative; width: 100px; height: 50px">
                 <div style="position: absolute; top: 0; left: 0; width: 10px; height: 10px; background: red"></div>
                 <div style="height: 10px; background: blue"></div>
               </div>"#,
        );
        let colors: Vec<Rgba> = items
            .iter()
            .filter_map(|i| match &i.command {
                PaintCommand::Background { fill: Fill::Solid(c), .. } => Some(*c),
                _ => None,
            })
            .collect();
        assert_eq!(colors, vec![Rgba::new(0, 0, 255, 1.0), Rgba::new(255, 0, 0, 1.0)]);
    }

    #[test]
    fn opacity_and_scale_reach_descendants() {
        let items = display_list(
            r#"<div id="card" style="width: 100px; height: 100px; opacity: 0.5; transform: scale(2)">
                 <div style="height: 10px; background: black; opacity: 0.5"></div>
               </div>"#,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].opacity, 0.25);
        let ts = items[0].transform;
        assert_eq!((ts.sx, ts.sy), (2.0, 2.0));
        assert_eq!((ts.tx, ts.ty), (-50.0, -50.0));
    }

    #[test]
    fn text_uses_inherited_color_and_borders_resolve() {
        let items = display_list(
            r#"<div id="card" style="color: #00ff00; border: 1px solid; font-size: 8px">hi</div>"#,
        );
        assert!(items.iter().any(|i| matches!(
            &i.command,
            PaintCommand::Text { text, color, .. } if text == "hi" && *color == Rgba::new(0, 255, 0, 1.0)
        )));
        assert!(items.iter().any(|i| matches!(
            &i.command,
            PaintCommand::Border { colors, .. } if colors[0] == Rgba::new(0, 255, 0, 1.0)
        )));
    }

    #[test]
    fn hard_shadows_follow_offsets() {
        let items = display_list(
            r#"<div id="card" style="width: 20px; height: 20px; box-shadow: 4px 6px 0 2px rgba(0, 0, 0, 0.5)"></div>"#,
        );
        let PaintCommand::Shadow { rect, blur, color, .. } = &items[0].command else {
            panic!("expected a shadow");
        };
        assert_eq!(*rect, Rect::new(2.0, 4.0, 24.0, 24.0));
        assert_eq!(*blur, 0.0);
        assert_eq!(color.a, 0.5);
    }

    #[test]
    fn url_arguments_strip_quotes() {
        assert_eq!(url_argument("url('a b.png')").as_deref(), Some("a b.png"));
        assert_eq!(url_argument("none"), None);
    }
}
