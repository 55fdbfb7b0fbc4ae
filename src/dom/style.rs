//! Cascade and computed-style resolution, the document's `getComputedStyle`.

use super::{Document, NodeId};
use crate::css::color::{canonicalize_colors, carries_color};
use crate::css::{parse_length, substitute_vars, LengthContext, ROOT_FONT_SIZE};
use crate::Result;

/// Properties whose value passes from parent to child when undeclared.
const INHERITED: [&str; 13] = [
    "color",
    "font-size",
    "font-family",
    "font-weight",
    "font-style",
    "line-height",
    "text-align",
    "visibility",
    "fill",
    "stroke",
    "stroke-width",
    "letter-spacing",
    "white-space",
];

/// SVG attributes that act as lowest-priority style declarations.
const PRESENTATION_ATTRIBUTES: [&str; 8] = [
    "fill",
    "stroke",
    "stroke-width",
    "stop-color",
    "color",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
];

/// Tags that never render.
const HIDDEN_TAGS: [&str; 8] = ["head", "style", "script", "title", "meta", "link", "template", "defs"];

fn is_inherited(prop: &str) -> bool {
    prop.starts_with("--") || INHERITED.contains(&prop)
}

impl Document {
    /// The winning declared value on `id` itself: inline `!important`, rule
    /// `!important`, inline, rule, then SVG presentation attribute.
    pub fn declared_value(&self, id: NodeId, prop: &str) -> Option<&str> {
        let el = self.element(id)?;
        let inline = el.style().get(prop);
        let rule = el.rules().get(prop);
        match (inline, rule) {
            (Some(i), _) if i.important => return Some(&i.value),
            (_, Some(r)) if r.important => return Some(&r.value),
            (Some(i), _) => return Some(&i.value),
            (None, Some(r)) => return Some(&r.value),
            (None, None) => {}
        }
        if el.is_svg() && PRESENTATION_ATTRIBUTES.contains(&prop) {
            return el.attr(prop);
        }
        None
    }

    /// Declared value on `id` or, for inherited properties, the nearest
    /// ancestor declaring it. Returns the declaring node with the raw value.
    pub fn cascaded_value(&self, id: NodeId, prop: &str) -> Option<(NodeId, &str)> {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(value) = self.declared_value(node, prop) {
                if value.eq_ignore_ascii_case("inherit") {
                    current = self.parent(node);
                    continue;
                }
                return Some((node, value));
            }
            if !is_inherited(prop) {
                return None;
            }
            current = self.parent(node);
        }
        None
    }

    /// Cascaded value with every `var()` substituted, colors left as written.
    /// This is what a renderer that never asks for resolved values sees.
    pub fn specified_value(&self, id: NodeId, prop: &str) -> Result<Option<String>> {
        let Some((source, raw)) = self.cascaded_value(id, prop) else {
            return Ok(None);
        };
        let lookup = |name: &str| self.cascaded_value(source, name).map(|(_, v)| v.to_string());
        substitute_vars(raw, &lookup).map(Some)
    }

    /// Computed font size in px.
    pub fn font_size_px(&self, id: NodeId) -> f32 {
        let parent_size = self
            .parent(id)
            .filter(|&p| self.element(p).is_some())
            .map(|p| self.font_size_px(p))
            .unwrap_or(ROOT_FONT_SIZE);
        let Some(value) = self.declared_value(id, "font-size") else {
            return parent_size;
        };
        let lookup = |name: &str| self.cascaded_value(id, name).map(|(_, v)| v.to_string());
        let Ok(value) = substitute_vars(value, &lookup) else {
            return parent_size;
        };
        let ctx = LengthContext {
            percent_base: parent_size,
            font_size: parent_size,
            viewport: (0.0, 0.0),
        };
        parse_length(&value, ctx).unwrap_or(parent_size)
    }
}

/// A resolved view of one element's style. Color-bearing properties come back
/// canonicalized to `rgb()` / `rgba()` the way a browser reports them.
#[derive(Debug, Clone, Copy)]
pub struct ComputedStyle<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl<'a> ComputedStyle<'a> {
    pub(crate) fn new(doc: &'a Document, node: NodeId) -> Self {
        Self { doc, node }
    }

    /// Resolve a property. Fails when a `var()` reference cannot be resolved.
    pub fn try_property_value(&self, prop: &str) -> Result<String> {
        let prop = crate::css::normalize_property_name(prop);
        if prop == "font-size" {
            return Ok(format!("{}px", self.doc.font_size_px(self.node)));
        }
        let value = match self.doc.specified_value(self.node, &prop)? {
            Some(v) => v,
            None => self.initial_value(&prop).to_string(),
        };
        if carries_color(&prop) {
            Ok(canonicalize_colors(&value))
        } else {
            Ok(value)
        }
    }

    /// Like `getComputedStyle(el).getPropertyValue(prop)`: empty on failure.
    pub fn get_property_value(&self, prop: &str) -> String {
        self.try_property_value(prop).unwrap_or_default()
    }

    pub fn position(&self) -> String {
        self.get_property_value("position")
    }

    pub fn display(&self) -> String {
        self.get_property_value("display")
    }

    fn initial_value(&self, prop: &str) -> &'static str {
        match prop {
            "color" => "rgb(0, 0, 0)",
            "background-color" => "rgba(0, 0, 0, 0)",
            "background-image" | "box-shadow" | "text-shadow" | "transform" => "none",
            "position" => "static",
            "opacity" => "1",
            "visibility" => "visible",
            "display" => self.initial_display(),
            _ => "",
        }
    }

    fn initial_display(&self) -> &'static str {
        let Some(el) = self.doc.element(self.node) else {
            return "inline";
        };
        if HIDDEN_TAGS.contains(&el.tag()) {
            return "none";
        }
        match el.tag() {
            "span" | "a" | "img" | "strong" | "em" | "b" | "i" | "svg" | "label" => "inline",
            _ => "block",
        }
    }
}
