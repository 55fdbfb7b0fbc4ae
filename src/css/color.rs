//! Color parsing and canonicalization.
//!
//! Two parsers live here. [`parse_color`] is the document's resolver: it
//! understands `oklab()`, `oklch()`, `lab()` and `lch()` on top of the legacy
//! sRGB syntax and is what computed styles are canonicalized with.
//! [`parse_legacy_color`] is what the rasterizer understands: hex, named,
//! `rgb[a]()`, `hsl[a]()` and `hwb()` only. `color()` is understood by
//! neither.

use super::matching_paren;

/// Color functions the rasterizer cannot parse.
const UNSUPPORTED_FUNCTIONS: [&str; 5] = ["oklch(", "oklab(", "lab(", "lch(", "color("];

const COLOR_FUNCTIONS: [&str; 9] = ["rgb", "rgba", "hsl", "hsla", "hwb", "oklch", "oklab", "lab", "lch"];

/// Non-`*-color` properties whose values may contain colors.
const COLOR_BEARING_PROPERTIES: [&str; 14] = [
    "background",
    "background-image",
    "border",
    "border-top",
    "border-right",
    "border-bottom",
    "border-left",
    "outline",
    "column-rule",
    "text-decoration",
    "box-shadow",
    "text-shadow",
    "fill",
    "stroke",
];

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0.0 };

    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a: a.clamp(0.0, 1.0) }
    }

    fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(channel(r), channel(g), channel(b), a)
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Serialize the way a browser reports a resolved color.
    pub fn to_css(&self) -> String {
        if self.a >= 1.0 {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            let alpha = (self.a * 1000.0).round() / 1000.0;
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }

    pub fn to_skia(&self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, (self.a * 255.0).round() as u8)
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Whether a property's resolved value has its colors canonicalized.
pub fn carries_color(prop: &str) -> bool {
    !prop.starts_with("--") && (prop.ends_with("color") || COLOR_BEARING_PROPERTIES.contains(&prop))
}

/// Whether the value mentions a color function outside the legacy sRGB set.
pub fn contains_unsupported_color(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    UNSUPPORTED_FUNCTIONS.iter().any(|f| lower.contains(f))
}

/// Resolve any color the document understands, including `oklch()`.
pub fn parse_color(value: &str) -> Option<Rgba> {
    let v = value.trim().to_ascii_lowercase();
    if v.contains("var(") || v == "currentcolor" || v.starts_with("color(") {
        return None;
    }
    parse_css_color(&v)
}

/// The rasterizer's parser: legacy sRGB syntax only.
pub fn parse_legacy_color(value: &str) -> Option<Rgba> {
    let v = value.trim().to_ascii_lowercase();
    if v.contains("var(") || contains_unsupported_color(&v) {
        return None;
    }
    parse_css_color(&v)
}

fn parse_css_color(value: &str) -> Option<Rgba> {
    let parsed = csscolorparser::parse(value).ok()?;
    let [r, g, b, a] = parsed.to_array();
    Some(Rgba::from_unit(r, g, b, a))
}

/// Rewrite every resolvable color inside `value` into canonical `rgb()` form,
/// leaving everything else (lengths, keywords, unresolvable functions) as is.
pub fn canonicalize_colors(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut idx = 0;
    while idx < value.len() {
        let ch = match value[idx..].chars().next() {
            Some(ch) => ch,
            None => break,
        };
        let starts_word = (ch.is_ascii_alphabetic() || ch == '#')
            && !value[..idx]
                .chars()
                .next_back()
                .is_some_and(|p| p.is_ascii_alphanumeric() || p == '-' || p == '.');
        if !starts_word {
            out.push(ch);
            idx += ch.len_utf8();
            continue;
        }

        let start = idx;
        idx += ch.len_utf8();
        while let Some(c) = value[idx..].chars().next() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                idx += c.len_utf8();
            } else {
                break;
            }
        }
        let word = &value[start..idx];

        if value[idx..].starts_with('(') {
            let Some(close) = matching_paren(value, idx) else {
                out.push_str(&value[start..]);
                return out;
            };
            let call = &value[start..=close];
            let name = word.to_ascii_lowercase();
            if COLOR_FUNCTIONS.contains(&name.as_str()) {
                match parse_color(call) {
                    Some(color) => out.push_str(&color.to_css()),
                    None => out.push_str(call),
                }
            } else if name == "url" {
                out.push_str(call);
            } else {
                out.push_str(word);
                out.push('(');
                out.push_str(&canonicalize_colors(&value[idx + 1..close]));
                out.push(')');
            }
            idx = close + 1;
        } else {
            match parse_css_color(&word.to_ascii_lowercase()) {
                Some(color) => out.push_str(&color.to_css()),
                None => out.push_str(word),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_oklch_and_oklab() {
        assert_eq!(parse_color("oklch(1 0 0)").unwrap().to_css(), "rgb(255, 255, 255)");
        assert_eq!(parse_color("oklch(0.628 0.2577 29.23)").unwrap().to_css(), "rgb(255, 0, 0)");
        assert_eq!(parse_color("oklab(0.5 0 0)").unwrap().to_css(), "rgb(99, 99, 99)");
        assert_eq!(parse_color("oklch(0 0 0 / 0.5)").unwrap().to_css(), "rgba(0, 0, 0, 0.5)");
    }

    #[test]
    fn resolves_lab_and_lch() {
        for value in ["lab(54 81 70)", "lch(54 107 41)"] {
            let c = parse_color(value).unwrap();
            assert!(c.r > 200 && c.g < 80 && c.b < 80, "{value} gave {c:?}");
        }
        assert!(canonicalize_colors("2px solid lab(54 81 70)").starts_with("2px solid rgb("));
    }

    #[test]
    fn legacy_parser_rejects_modern_functions() {
        assert!(parse_legacy_color("oklch(0.7 0.1 200)").is_none());
        assert!(parse_legacy_color("lab(50% 20 30)").is_none());
        assert!(parse_legacy_color("var(--bg)").is_none());
        assert_eq!(parse_legacy_color("#ff0000").unwrap().to_css(), "rgb(255, 0, 0)");
        assert_eq!(
            parse_legacy_color("rgba(255, 255, 255, 0.7)").unwrap().to_css(),
            "rgba(255, 255, 255, 0.7)"
        );
    }

    #[test]
    fn color_function_stays_unsupported() {
        assert!(parse_color("color(display-p3 1 0 0)").is_none());
        assert!(contains_unsupported_color("color(display-p3 1 0 0)"));
        assert!(!contains_unsupported_color("rgb(1, 2, 3)"));
        assert_eq!(canonicalize_colors("color(display-p3 1 0 0)"), "color(display-p3 1 0 0)");
    }

    #[test]
    fn only_color_properties_are_canonicalized() {
        assert!(carries_color("border-top-color"));
        assert!(carries_color("border-left"));
        assert!(carries_color("box-shadow"));
        assert!(!carries_color("font-family"));
        assert!(!carries_color("--accent"));
    }

    #[test]
    fn canonicalizes_colors_inside_compound_values() {
        assert_eq!(
            canonicalize_colors("0 4px 12px oklch(0 0 0 / 0.15)"),
            "0 4px 12px rgba(0, 0, 0, 0.15)"
        );
        assert_eq!(
            canonicalize_colors("linear-gradient(90deg, #ff0000 0%, oklch(1 0 0) 100%)"),
            "linear-gradient(90deg, rgb(255, 0, 0) 0%, rgb(255, 255, 255) 100%)"
        );
        assert_eq!(canonicalize_colors("1px solid red"), "1px solid rgb(255, 0, 0)");
        assert_eq!(canonicalize_colors("transparent"), "rgba(0, 0, 0, 0)");
        assert_eq!(canonicalize_colors("none"), "none");
        assert_eq!(canonicalize_colors("url(red.png) tan"), "url(red.png) rgb(210, 180, 140)");
    }
}
