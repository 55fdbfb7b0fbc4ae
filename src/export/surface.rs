//! Pinning the cloned export target to the requested pixel size.

use log::debug;

use crate::dom::{Document, NodeId};

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Force `target` to exactly `width`x`height` CSS px, independent of the
/// window it was laid out for on screen, and make it a containing block for
/// absolutely positioned children.
pub fn setup_export_element(doc: &mut Document, target: NodeId, width: u32, height: u32) {
    let position = doc.computed_style(target).position();
    let Some(el) = doc.element_mut(target) else {
        return;
    };
    let style = el.style_mut();
    style.set("width", &format!("{width}px"), true);
    style.set("height", &format!("{height}px"), true);
    style.set("min-width", "0px", true);
    style.set("min-height", "0px", true);
    style.set("max-width", "none", true);
    style.set("max-height", "none", true);
    style.set("box-sizing", "border-box", true);
    style.set("margin", "0px", true);
    for side in SIDES {
        style.set(&format!("margin-{side}"), "0px", true);
    }
    style.set("top", "0px", true);
    style.set("left", "0px", true);
    style.set("right", "auto", true);
    style.set("bottom", "auto", true);
    if position.trim().eq_ignore_ascii_case("static") {
        style.set("position", "relative", true);
    }
    debug!("export surface pinned to {width}x{height} (was {position})");
}
