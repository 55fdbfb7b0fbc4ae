//! Building a [`Document`] from HTML markup with `scraper`.

use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Document, ElementData, Namespace, NodeData, NodeId};
use crate::css::{parse_stylesheet, Declarations};
use crate::{Error, Result};

impl Document {
    /// Parse a scene from HTML. `<style>` rules are matched once here and
    /// folded into each element's rule declarations in source order.
    ///
    /// Image loads for every `img` start immediately when a tokio runtime is
    /// available, and otherwise on the first readiness wait.
    pub fn parse_html(markup: &str, base_url: Option<&str>) -> Result<Self> {
        let base = base_url
            .map(|b| Url::parse(b).map_err(|e| Error::ConfigError(format!("invalid base URL {b}: {e}"))))
            .transpose()?;
        let html = Html::parse_document(markup);
        let rules = collect_rules(&html);

        let mut doc = Document::with_base_url(base);
        // Drop the placeholder tree; the parsed one replaces it.
        doc.nodes.clear();
        doc.root = doc.import(html.root_element(), Namespace::Html, &rules);
        doc.request_images();
        debug!("parsed scene document with {} nodes", doc.nodes.len());
        Ok(doc)
    }

    fn import(
        &mut self,
        source: ElementRef<'_>,
        parent_ns: Namespace,
        rules: &[(Selector, Declarations)],
    ) -> NodeId {
        let value = source.value();
        let namespace = if value.name().eq_ignore_ascii_case("svg") {
            Namespace::Svg
        } else {
            parent_ns
        };

        let mut data = ElementData::new(value.name(), namespace);
        for (name, attr) in value.attrs() {
            data.set_attr(name, attr);
        }
        for (selector, declarations) in rules {
            if selector.matches(&source) {
                data.rules.merge(declarations);
            }
        }
        let id = self.push(NodeData::Element(data));

        for child in source.children() {
            let child_id = match child.value() {
                scraper::Node::Element(_) => match ElementRef::wrap(child) {
                    Some(el) => self.import(el, namespace, rules),
                    None => continue,
                },
                scraper::Node::Text(text) => {
                    if text.text.trim().is_empty() {
                        continue;
                    }
                    self.create_text_node(&text.text)
                }
                _ => continue,
            };
            self.append_child(id, child_id);
        }
        id
    }
}

fn collect_rules(html: &Html) -> Vec<(Selector, Declarations)> {
    let Ok(style_selector) = Selector::parse("style") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for style in html.select(&style_selector) {
        let text = style.text().collect::<String>();
        for rule in parse_stylesheet(&text) {
            match Selector::parse(&rule.selectors) {
                Ok(selector) => out.push((selector, rule.declarations)),
                Err(_) => warn!("skipping unsupported selector '{}'", rule.selectors),
            }
        }
    }
    out
}
