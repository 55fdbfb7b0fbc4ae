//! Inline SVG shapes and shared path geometry.

use std::str::FromStr;

use log::debug;
use tiny_skia::{Path, PathBuilder, Transform};

use crate::css::color::{parse_legacy_color, Rgba};
use crate::dom::{Document, ElementData, NodeId};

use super::layout::{specified, Rect};

/// Cubic control-point factor approximating a quarter circle.
const KAPPA: f32 = 0.552_284_8;

/// Containers whose children are never painted directly.
const NON_RENDERING: [&str; 9] = [
    "defs",
    "clippath",
    "mask",
    "lineargradient",
    "radialgradient",
    "pattern",
    "symbol",
    "marker",
    "title",
];

/// A shape ready to paint, in canvas coordinates.
#[derive(Debug, Clone)]
pub struct SvgShape {
    pub path: Path,
    pub fill: Option<Rgba>,
    pub stroke: Option<(Rgba, f32)>,
}

/// Rectangle path with uniformly rounded corners.
pub fn rounded_rect_path(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(rect.to_skia()?));
    }
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
    let k = r * KAPPA;
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.cubic_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.cubic_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.cubic_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Collect the paintable shapes of the `svg` element `svg`, mapped into
/// `viewport` through its `viewBox` (`xMidYMid meet`).
pub fn svg_shapes(doc: &Document, svg: NodeId, viewport: Rect) -> Vec<SvgShape> {
    let Some(el) = doc.element(svg) else {
        return Vec::new();
    };
    let base = view_box_transform(el, viewport);
    let mut out = Vec::new();
    collect(doc, svg, base, viewport, &mut out);
    out
}

fn view_box_transform(el: &ElementData, viewport: Rect) -> Transform {
    let origin = Transform::from_translate(viewport.x, viewport.y);
    let Some(vb) = el.attr("viewBox").and_then(|v| svgtypes::ViewBox::from_str(v).ok()) else {
        return origin;
    };
    if vb.w <= 0.0 || vb.h <= 0.0 {
        return origin;
    }
    let scale = (viewport.width / vb.w as f32).min(viewport.height / vb.h as f32);
    let dx = (viewport.width - vb.w as f32 * scale) / 2.0;
    let dy = (viewport.height - vb.h as f32 * scale) / 2.0;
    origin
        .pre_translate(dx, dy)
        .pre_scale(scale, scale)
        .pre_translate(-vb.x as f32, -vb.y as f32)
}

fn element_transform(el: &ElementData) -> Transform {
    match el.attr("transform").map(svgtypes::Transform::from_str) {
        Some(Ok(t)) => Transform::from_row(
            t.a as f32, t.b as f32, t.c as f32, t.d as f32, t.e as f32, t.f as f32,
        ),
        _ => Transform::identity(),
    }
}

fn collect(doc: &Document, parent: NodeId, ts: Transform, viewport: Rect, out: &mut Vec<SvgShape>) {
    for &child in doc.children(parent) {
        let Some(el) = doc.element(child) else {
            continue;
        };
        if NON_RENDERING.contains(&el.tag()) || is_hidden(doc, child) {
            continue;
        }
        let ts = ts.pre_concat(element_transform(el));
        match el.tag() {
            "g" | "a" | "svg" | "switch" => collect(doc, child, ts, viewport, out),
            tag => {
                let Some(path) = shape_path(el, viewport) else {
                    if !matches!(tag, "text" | "image" | "use" | "foreignobject") {
                        debug!("skipping unsupported svg element <{tag}>");
                    }
                    continue;
                };
                let Some(path) = path.transform(ts) else {
                    continue;
                };
                let fill = if tag == "line" {
                    None
                } else {
                    paint_color(doc, child, "fill", Some(Rgba::new(0, 0, 0, 1.0)))
                };
                let stroke = paint_color(doc, child, "stroke", None).map(|color| {
                    let width = specified(doc, child, "stroke-width")
                        .and_then(|w| number(&w, viewport.width))
                        .unwrap_or(1.0);
                    (color, width * transform_scale(ts))
                });
                if fill.is_none() && stroke.is_none() {
                    continue;
                }
                out.push(SvgShape { path, fill, stroke });
            }
        }
    }
}

fn is_hidden(doc: &Document, node: NodeId) -> bool {
    let display = specified(doc, node, "display").map(|d| d.trim().to_ascii_lowercase());
    let visibility = specified(doc, node, "visibility").map(|v| v.trim().to_ascii_lowercase());
    display.as_deref() == Some("none") || visibility.as_deref() == Some("hidden")
}

/// Resolve `fill` or `stroke` with the rasterizer's color parser, folding in
/// the matching opacity properties.
fn paint_color(doc: &Document, node: NodeId, prop: &str, default: Option<Rgba>) -> Option<Rgba> {
    let color = match specified(doc, node, prop) {
        None => default?,
        Some(v) => {
            let v = v.trim();
            if v.eq_ignore_ascii_case("none") {
                return None;
            }
            if v.eq_ignore_ascii_case("currentcolor") {
                specified(doc, node, "color")
                    .and_then(|c| parse_legacy_color(&c))
                    .unwrap_or(Rgba::new(0, 0, 0, 1.0))
            } else {
                parse_legacy_color(v)?
            }
        }
    };
    let opacity = |p: &str| {
        specified(doc, node, p)
            .and_then(|v| v.trim().parse::<f32>().ok())
            .map_or(1.0, |o| o.clamp(0.0, 1.0))
    };
    let alpha = color.a * opacity(&format!("{prop}-opacity")) * opacity("opacity");
    let color = Rgba::new(color.r, color.g, color.b, alpha);
    (!color.is_transparent()).then_some(color)
}

fn transform_scale(ts: Transform) -> f32 {
    (ts.sx * ts.sy - ts.kx * ts.ky).abs().sqrt()
}

/// An SVG length attribute in user units. Percentages resolve against `base`.
fn number(value: &str, base: f32) -> Option<f32> {
    let length = svgtypes::Length::from_str(value.trim()).ok()?;
    let n = length.number as f32;
    match length.unit {
        svgtypes::LengthUnit::None | svgtypes::LengthUnit::Px => Some(n),
        svgtypes::LengthUnit::Percent => Some(n / 100.0 * base),
        svgtypes::LengthUnit::Pt => Some(n * 4.0 / 3.0),
        svgtypes::LengthUnit::Em => Some(n * 16.0),
        _ => None,
    }
}

fn shape_path(el: &ElementData, viewport: Rect) -> Option<Path> {
    let attr = |name: &str, base: f32| el.attr(name).and_then(|v| number(v, base)).unwrap_or(0.0);
    let (w, h) = (viewport.width, viewport.height);
    match el.tag() {
        "rect" => {
            let rect = Rect::new(attr("x", w), attr("y", h), attr("width", w), attr("height", h));
            if rect.is_empty() {
                return None;
            }
            let rx = el.attr("rx").or(el.attr("ry")).and_then(|v| number(v, w)).unwrap_or(0.0);
            rounded_rect_path(rect, rx)
        }
        "circle" => PathBuilder::from_circle(attr("cx", w), attr("cy", h), attr("r", w.min(h))),
        "ellipse" => {
            let (cx, cy) = (attr("cx", w), attr("cy", h));
            let (rx, ry) = (attr("rx", w), attr("ry", h));
            tiny_skia::Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0).map(PathBuilder::from_oval)?
        }
        "line" => {
            let mut pb = PathBuilder::new();
            pb.move_to(attr("x1", w), attr("y1", h));
            pb.line_to(attr("x2", w), attr("y2", h));
            pb.finish()
        }
        "polyline" | "polygon" => {
            let points: Vec<f32> = el
                .attr("points")?
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
            let mut pairs = points.chunks_exact(2);
            let first = pairs.next()?;
            let mut pb = PathBuilder::new();
            pb.move_to(first[0], first[1]);
            for p in pairs {
                pb.line_to(p[0], p[1]);
            }
            if el.tag() == "polygon" {
                pb.close();
            }
            pb.finish()
        }
        "path" => path_data(el.attr("d")?),
        _ => None,
    }
}

fn path_data(d: &str) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for segment in svgtypes::SimplifyingPathParser::from(d) {
        // Like a browser, render everything up to the first error.
        let Ok(segment) = segment else {
            break;
        };
        match segment {
            svgtypes::SimplePathSegment::MoveTo { x, y } => pb.move_to(x as f32, y as f32),
            svgtypes::SimplePathSegment::LineTo { x, y } => pb.line_to(x as f32, y as f32),
            svgtypes::SimplePathSegment::Quadratic { x1, y1, x, y } => {
                pb.quad_to(x1 as f32, y1 as f32, x as f32, y as f32)
            }
            svgtypes::SimplePathSegment::CurveTo { x1, y1, x2, y2, x, y } => pb.cubic_to(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
            ),
            svgtypes::SimplePathSegment::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes(markup: &str, viewport: Rect) -> Vec<SvgShape> {
        let doc = Document::parse_html(markup, None).unwrap();
        let svg = doc.get_element_by_id("icon").unwrap();
        svg_shapes(&doc, svg, viewport)
    }

    #[test]
    fn view_box_scales_shapes_into_viewport() {
        let out = shapes(
            r#"<svg id="icon" viewBox="0 0 10 10"><rect x="0" y="0" width="10" height="10" fill="rgb(255, 0, 0)"/></svg>"#,
            Rect::new(5.0, 5.0, 40.0, 20.0),
        );
        assert_eq!(out.len(), 1);
        let bounds = out[0].path.bounds();
        // meet: scale 2, centered horizontally
        assert_eq!((bounds.left(), bounds.top(), bounds.width(), bounds.height()), (15.0, 5.0, 20.0, 20.0));
        assert_eq!(out[0].fill, Some(Rgba::new(255, 0, 0, 1.0)));
    }

    #[test]
    fn modern_fill_attributes_are_unpaintable() {
        let out = shapes(
            r#"<svg id="icon"><circle cx="5" cy="5" r="5" fill="oklch(0.6 0.2 30)"/></svg>"#,
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn inherits_group_paint_and_scales_strokes() {
        let out = shapes(
            r##"<svg id="icon" viewBox="0 0 12 12" width="24" height="24">
                 <g stroke="#000" fill="none" transform="translate(1 1)">
                   <path d="M0 0 L10 10"/>
                   <line x1="0" y1="10" x2="10" y2="0" stroke-width="2"/>
                 </g>
               </svg>"##,
            Rect::new(0.0, 0.0, 24.0, 24.0),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].fill, None);
        assert_eq!(out[0].stroke.map(|s| s.1), Some(2.0));
        assert_eq!(out[1].stroke.map(|s| s.1), Some(4.0));
        assert_eq!(out[0].path.bounds().left(), 2.0);
    }

    #[test]
    fn rounded_rect_stays_in_bounds() {
        let path = rounded_rect_path(Rect::new(0.0, 0.0, 20.0, 10.0), 50.0).unwrap();
        let b = path.bounds();
        assert_eq!((b.width(), b.height()), (20.0, 10.0));
    }
}
