//! Minimal CSS plumbing for scene documents: declaration blocks, stylesheets,
//! `var()` substitution and length resolution.
//!
//! This is deliberately small. It understands exactly what the editor emits
//! into its render card (inline styles plus a handful of `:root` / class
//! rules) and nothing of the wider CSS syntax.

pub mod color;

use crate::{Error, Result};

/// Maximum nesting of `var()` references before a value is treated as cyclic.
const MAX_VAR_DEPTH: usize = 16;

/// A single `name: value [!important]` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// An ordered declaration block. Setting a property replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    items: Vec<Declaration>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the body of a `style` attribute or rule block.
    pub fn parse(text: &str) -> Self {
        let mut block = Self::new();
        for raw in split_top_level(text, ';') {
            let Some((name, value)) = raw.split_once(':') else {
                continue;
            };
            let name = normalize_property_name(name);
            if name.is_empty() {
                continue;
            }
            let mut value = value.trim();
            let mut important = false;
            if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
                if value[idx + "!important".len()..].trim().is_empty() {
                    value = value[..idx].trim_end();
                    important = true;
                }
            }
            if value.is_empty() {
                continue;
            }
            block.set(&name, value, important);
        }
        block
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        let name = normalize_property_name(name);
        self.items.iter().find(|d| d.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|d| d.value.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str, important: bool) {
        let name = normalize_property_name(name);
        let decl = Declaration {
            name,
            value: value.trim().to_string(),
            important,
        };
        match self.items.iter_mut().find(|d| d.name == decl.name) {
            Some(existing) => *existing = decl,
            None => self.items.push(decl),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Declaration> {
        let name = normalize_property_name(name);
        let idx = self.items.iter().position(|d| d.name == name)?;
        Some(self.items.remove(idx))
    }

    /// Apply `other` on top of this block, following normal cascade order:
    /// later declarations win unless this block's copy is `!important` and
    /// the incoming one is not.
    pub fn merge(&mut self, other: &Declarations) {
        for decl in &other.items {
            match self.items.iter().find(|d| d.name == decl.name) {
                Some(existing) if existing.important && !decl.important => {}
                _ => self.set(&decl.name, &decl.value, decl.important),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Custom properties keep their case, camelCase accessor names become
/// kebab-case, everything else is ASCII-lowercased.
pub fn normalize_property_name(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") {
        return name.to_string();
    }
    let camel = name.starts_with(|c: char| c.is_ascii_lowercase()) && !name.contains('-');
    if !camel {
        return name.to_ascii_lowercase();
    }
    // `backgroundColor` -> `background-color`
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.char_indices() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// One qualified rule from a `<style>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: String,
    pub declarations: Declarations,
}

/// Parse a stylesheet into qualified rules, skipping at-rules entirely.
pub fn parse_stylesheet(text: &str) -> Vec<StyleRule> {
    let text = strip_comments(text);
    let mut rules = Vec::new();
    let mut rest = text.as_str();

    while let Some(open) = rest.find('{') {
        let prelude = rest[..open].trim();
        let Some(close) = matching_brace(rest, open) else {
            break;
        };
        let body = &rest[open + 1..close];
        rest = &rest[close + 1..];

        // An at-rule without a block (`@import ...;`) can precede a rule.
        let prelude = match prelude.rfind(';') {
            Some(idx) => prelude[idx + 1..].trim(),
            None => prelude,
        };
        if prelude.is_empty() || prelude.starts_with('@') {
            continue;
        }
        rules.push(StyleRule {
            selectors: prelude.to_string(),
            declarations: Declarations::parse(body),
        });
    }
    rules
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` while ignoring separators nested in parentheses or quotes.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Split a value on top-level whitespace (`1px solid rgb(0, 0, 0)` has three parts).
pub fn split_whitespace_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    parts.push(&text[s..idx]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        parts.push(&text[s..]);
    }
    parts
}

/// Index of the `)` closing the `(` at `open`.
pub fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn contains_var(value: &str) -> bool {
    value.to_ascii_lowercase().contains("var(")
}

/// Replace every `var(--name[, fallback])` in `value`. `lookup` returns the
/// raw (possibly var-bearing) value of a custom property.
pub fn substitute_vars<F>(value: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    substitute_vars_at(value, lookup, 0)
}

fn substitute_vars_at<F>(value: &str, lookup: &F, depth: usize) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    if depth > MAX_VAR_DEPTH {
        return Err(Error::ParseError(format!("cyclic var() reference in '{value}'")));
    }
    let lower = value.to_ascii_lowercase();
    let Some(start) = lower.find("var(") else {
        return Ok(value.to_string());
    };
    let open = start + 3;
    let close = matching_paren(value, open)
        .ok_or_else(|| Error::ParseError(format!("unbalanced var() in '{value}'")))?;
    let inner = &value[open + 1..close];
    let (name, fallback) = match inner.find(',') {
        Some(idx) => (inner[..idx].trim(), Some(inner[idx + 1..].trim())),
        None => (inner.trim(), None),
    };

    let replacement = match lookup(name) {
        Some(raw) => substitute_vars_at(&raw, lookup, depth + 1)?,
        None => match fallback {
            Some(fb) => substitute_vars_at(fb, lookup, depth + 1)?,
            None => {
                return Err(Error::ParseError(format!("unresolved custom property {name}")))
            }
        },
    };

    let tail = substitute_vars_at(&value[close + 1..], lookup, depth)?;
    Ok(format!("{}{}{}", &value[..start], replacement, tail))
}

/// Reference values for resolving relative lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthContext {
    /// Base for percentages (containing block width or height)
    pub percent_base: f32,
    /// Computed font size of the element, for `em`
    pub font_size: f32,
    /// Layout viewport, for `vw` / `vh`
    pub viewport: (f32, f32),
}

pub const ROOT_FONT_SIZE: f32 = 16.0;

/// Resolve a single length token to px. `auto`, `none` and anything not a
/// length yield `None`.
pub fn parse_length(value: &str, ctx: LengthContext) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() || v == "auto" || v == "none" {
        return None;
    }
    let split = v
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
        .map(|(i, _)| i)
        .unwrap_or(v.len());
    let number: f32 = v[..split].parse().ok()?;
    let px = match &v[split..] {
        "" if number == 0.0 => 0.0,
        "px" => number,
        "%" => number / 100.0 * ctx.percent_base,
        "em" => number * ctx.font_size,
        "rem" => number * ROOT_FONT_SIZE,
        "vw" => number / 100.0 * ctx.viewport.0,
        "vh" => number / 100.0 * ctx.viewport.1,
        "vmin" => number / 100.0 * ctx.viewport.0.min(ctx.viewport.1),
        "vmax" => number / 100.0 * ctx.viewport.0.max(ctx.viewport.1),
        "pt" => number * 4.0 / 3.0,
        _ => return None,
    };
    px.is_finite().then_some(px)
}

/// Expand a 1-4 value box shorthand (`padding: 4px 8px`) to top/right/bottom/left.
pub fn expand_box_shorthand(value: &str) -> Option<[&str; 4]> {
    let parts = split_whitespace_top_level(value);
    match parts.as_slice() {
        [a] => Some([a, a, a, a]),
        [v, h] => Some([v, h, v, h]),
        [t, h, b] => Some([t, h, b, h]),
        [t, r, b, l] => Some([t, r, b, l]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LengthContext {
        LengthContext {
            percent_base: 200.0,
            font_size: 10.0,
            viewport: (1000.0, 500.0),
        }
    }

    #[test]
    fn parses_declarations_with_important_and_nested_semicolons() {
        let block = Declarations::parse(
            "color: red; background: url(\"a;b.png\") !important; --Accent: oklch(0.7 0.1 200)",
        );
        assert_eq!(block.len(), 3);
        assert_eq!(block.value("color"), Some("red"));
        let bg = block.get("background").unwrap();
        assert!(bg.important);
        assert_eq!(bg.value, "url(\"a;b.png\")");
        assert_eq!(block.value("--Accent"), Some("oklch(0.7 0.1 200)"));
        assert!(block.get("--accent").is_none());
    }

    #[test]
    fn property_names() {
        assert_eq!(normalize_property_name("backgroundColor"), "background-color");
        assert_eq!(normalize_property_name(" COLOR "), "color");
        assert_eq!(normalize_property_name("border-top-color"), "border-top-color");
        assert_eq!(normalize_property_name("--Brand"), "--Brand");
    }

    #[test]
    fn merge_respects_important() {
        let mut base = Declarations::parse("color: red !important; width: 1px");
        base.merge(&Declarations::parse("color: blue; width: 2px"));
        assert_eq!(base.value("color"), Some("red"));
        assert_eq!(base.value("width"), Some("2px"));
    }

    #[test]
    fn stylesheet_skips_at_rules_and_comments() {
        let css = "/* theme */ :root { --bg: #fff; } @media (max-width: 10px) { .a { color: red; } } .card, #x { padding: 4px }";
        let rules = parse_stylesheet(css);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selectors, ":root");
        assert_eq!(rules[1].selectors, ".card, #x");
        assert_eq!(rules[1].declarations.value("padding"), Some("4px"));
    }

    #[test]
    fn substitutes_nested_vars_and_fallbacks() {
        let lookup = |name: &str| match name {
            "--a" => Some("var(--b)".to_string()),
            "--b" => Some("12px".to_string()),
            _ => None,
        };
        assert_eq!(substitute_vars("calc(var(--a) + 1px)", &lookup).unwrap(), "calc(12px + 1px)");
        assert_eq!(substitute_vars("var(--missing, 3px) var(--b)", &lookup).unwrap(), "3px 12px");
        assert!(substitute_vars("var(--missing)", &lookup).is_err());
    }

    #[test]
    fn detects_var_cycles() {
        let lookup = |name: &str| match name {
            "--a" => Some("var(--b)".to_string()),
            "--b" => Some("var(--a)".to_string()),
            _ => None,
        };
        assert!(matches!(substitute_vars("var(--a)", &lookup), Err(Error::ParseError(_))));
    }

    #[test]
    fn resolves_lengths() {
        assert_eq!(parse_length("12px", ctx()), Some(12.0));
        assert_eq!(parse_length("50%", ctx()), Some(100.0));
        assert_eq!(parse_length("2em", ctx()), Some(20.0));
        assert_eq!(parse_length("10vw", ctx()), Some(100.0));
        assert_eq!(parse_length("10vh", ctx()), Some(50.0));
        assert_eq!(parse_length("0", ctx()), Some(0.0));
        assert_eq!(parse_length("auto", ctx()), None);
        assert_eq!(parse_length("12", ctx()), None);
    }

    #[test]
    fn splits_values_at_top_level() {
        assert_eq!(
            split_whitespace_top_level("1px  solid rgb(0, 0, 0)"),
            vec!["1px", "solid", "rgb(0, 0, 0)"]
        );
        assert_eq!(
            split_top_level("linear-gradient(90deg, red, blue), url(a.png)", ','),
            vec!["linear-gradient(90deg, red, blue)", "url(a.png)"]
        );
        assert_eq!(expand_box_shorthand("1px 2px"), Some(["1px", "2px", "1px", "2px"]));
    }
}
