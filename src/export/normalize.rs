//! Color normalization for the rasterizer.
//!
//! The rasterizer only parses legacy sRGB colors, so every declaration that
//! uses `oklch()`/`oklab()`/`lab()`/`lch()` or still carries a `var()`
//! reference is rewritten to the document's resolved `rgb()` value as an
//! inline `!important` declaration. Border and outline shorthands count too.
//! All passes are best effort: a property that fails to resolve, `color()`
//! included, is left alone.

use log::debug;

use crate::css::color::{canonicalize_colors, contains_unsupported_color};
use crate::css::{contains_var, LengthContext};
use crate::dom::{Document, NodeId};
use crate::rendering::layout::{border_side, specified};

/// Color-bearing properties rewritten on HTML elements.
pub const HTML_COLOR_PROPERTIES: [&str; 21] = [
    "color",
    "background-color",
    "background",
    "background-image",
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "border-color",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "outline",
    "outline-color",
    "box-shadow",
    "text-shadow",
    "text-decoration-color",
    "fill",
    "stroke",
];

/// `img` elements skip border properties; those are pinned by
/// [`preserve_image_styles`].
pub const IMAGE_COLOR_PROPERTIES: [&str; 7] = [
    "color",
    "background-color",
    "outline-color",
    "background",
    "background-image",
    "fill",
    "stroke",
];

/// SVG paint properties, read from both attributes and style.
pub const SVG_COLOR_PROPERTIES: [&str; 4] = ["fill", "stroke", "stop-color", "color"];

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Whether a raw value needs resolving before the rasterizer sees it.
pub fn needs_conversion(raw: &str) -> bool {
    contains_unsupported_color(raw) || contains_var(raw)
}

/// Whether a resolved value is worth writing back.
fn is_usable(computed: &str) -> bool {
    let v = computed.trim();
    !v.is_empty()
        && v != "rgba(0, 0, 0, 0)"
        && !v.eq_ignore_ascii_case("transparent")
        && !v.eq_ignore_ascii_case("none")
        && !contains_unsupported_color(v)
        && !contains_var(v)
}

fn set_important(doc: &mut Document, node: NodeId, prop: &str, value: &str) {
    if let Some(el) = doc.element_mut(node) {
        el.style_mut().set(prop, value, true);
    }
}

/// Rewrite `props` on `node`. Returns how many declarations were rewritten.
pub fn convert_properties(doc: &mut Document, node: NodeId, props: &[&str]) -> usize {
    let mut rewrites = Vec::new();
    {
        let style = doc.computed_style(node);
        for &prop in props {
            let Some((_, raw)) = doc.cascaded_value(node, prop) else {
                continue;
            };
            if !needs_conversion(raw) {
                continue;
            }
            match style.try_property_value(prop) {
                Ok(computed) if is_usable(&computed) => rewrites.push((prop, computed)),
                Ok(computed) => debug!("leaving {prop}: '{raw}' (resolved to '{computed}')"),
                Err(err) => debug!("skipping {prop}: {err}"),
            }
        }
    }
    let count = rewrites.len();
    for (prop, value) in rewrites {
        set_important(doc, node, prop, &value);
    }
    count
}

/// Normalize one element with the property table for its kind.
pub fn convert_styles_to_rgb(doc: &mut Document, node: NodeId) -> usize {
    let Some(el) = doc.element(node) else {
        return 0;
    };
    if el.is_svg() {
        return convert_svg_element(doc, node);
    }
    if el.tag() == "img" {
        return convert_properties(doc, node, &IMAGE_COLOR_PROPERTIES);
    }
    convert_properties(doc, node, &HTML_COLOR_PROPERTIES)
}

/// Normalize an `img` without touching its border colors.
pub fn convert_image_styles(doc: &mut Document, img: NodeId) -> usize {
    convert_properties(doc, img, &IMAGE_COLOR_PROPERTIES)
}

fn convert_svg_element(doc: &mut Document, node: NodeId) -> usize {
    let mut attrs = Vec::new();
    if let Some(el) = doc.element(node) {
        for prop in SVG_COLOR_PROPERTIES {
            let Some(raw) = el.attr(prop) else {
                continue;
            };
            if !needs_conversion(raw) {
                continue;
            }
            let resolved = if contains_var(raw) {
                doc.computed_style(node).try_property_value(prop)
            } else {
                Ok(canonicalize_colors(raw))
            };
            match resolved {
                Ok(value) if is_usable(&value) => attrs.push((prop, value)),
                Ok(value) => debug!("leaving {prop}=\"{raw}\" (resolved to '{value}')"),
                Err(err) => debug!("skipping {prop} attribute: {err}"),
            }
        }
    }
    let mut count = attrs.len();
    for (prop, value) in attrs {
        if let Some(el) = doc.element_mut(node) {
            el.set_attr(prop, &value);
        }
    }
    count += convert_properties(doc, node, &SVG_COLOR_PROPERTIES);
    count
}

/// Normalize every SVG element at or under `root`.
pub fn convert_svg_styles(doc: &mut Document, root: NodeId) -> usize {
    let mut nodes = vec![root];
    nodes.extend(doc.descendant_elements(root));
    let mut count = 0;
    for node in nodes {
        if doc.element(node).is_some_and(|e| e.is_svg()) {
            count += convert_svg_element(doc, node);
        }
    }
    count
}

/// Re-declare every custom property holding an unsupported color with its
/// `rgb()` form, on whichever element declared it.
pub fn inject_rgb_overrides(doc: &mut Document) -> usize {
    let root = doc.root();
    let mut nodes = vec![root];
    nodes.extend(doc.descendant_elements(root));

    let mut overrides = Vec::new();
    for node in nodes {
        let Some(el) = doc.element(node) else {
            continue;
        };
        for decl in el.rules().iter().chain(el.style().iter()) {
            if decl.name.starts_with("--") && contains_unsupported_color(&decl.value) {
                let value = canonicalize_colors(&decl.value);
                if !contains_unsupported_color(&value) {
                    overrides.push((node, decl.name.clone(), value));
                }
            }
        }
    }
    let count = overrides.len();
    for (node, name, value) in overrides {
        set_important(doc, node, &name, &value);
    }
    debug!("rewrote {count} custom color properties");
    count
}

/// Pin an image's resolved border colors, widths, styles and radius inline so
/// later passes and the cascade cannot disturb them.
pub fn preserve_image_styles(doc: &mut Document, img: NodeId, viewport: (f32, f32)) {
    if doc.element(img).is_none() {
        return;
    }
    let ctx = LengthContext {
        percent_base: 0.0,
        font_size: doc.font_size_px(img),
        viewport,
    };
    let current_color = doc.computed_style(img).get_property_value("color");
    let mut pinned = Vec::new();
    for (idx, side) in SIDES.iter().enumerate() {
        let resolved = border_side(doc, img, idx, ctx);
        let color = resolved
            .color
            .as_deref()
            .filter(|c| !c.trim().eq_ignore_ascii_case("currentcolor"))
            .map(canonicalize_colors)
            .unwrap_or_else(|| current_color.clone());
        if is_usable(&color) || color.trim() == "rgba(0, 0, 0, 0)" {
            pinned.push((format!("border-{side}-color"), color));
        }
        pinned.push((format!("border-{side}-width"), format!("{}px", resolved.width)));
        pinned.push((format!("border-{side}-style"), resolved.style));
    }
    if let Some(radius) = specified(doc, img, "border-radius") {
        pinned.push(("border-radius".to_string(), radius));
    }
    for (prop, value) in pinned {
        set_important(doc, img, &prop, &value);
    }
}
