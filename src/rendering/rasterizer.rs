//! Document-to-canvas rasterization.
//!
//! A [`Rasterize`] implementation clones the document, hands the clone to a
//! snapshot callback, waits for the clone's images and paints the target
//! subtree onto a fresh [`Canvas`]. The export pipeline only talks to the
//! trait, so tests can swap the built-in [`Rasterizer`] for a stub.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use log::{debug, warn};

use crate::assets::ImageSlot;
use crate::css::color::parse_legacy_color;
use crate::css::{split_top_level, split_whitespace_top_level};
use crate::dom::{Document, NodeId};
use crate::{Error, Result};

use super::canvas::Canvas;
use super::layout::{layout_subtree, specified, LayoutOptions};
use super::paint::{build_display_list, url_argument, PaintOptions};
use super::raster::paint_display_list;

/// Window used when neither the options nor the target give one.
pub const DEFAULT_WINDOW: (u32, u32) = (1280, 720);

/// Snapshot callback run on the cloned document with the cloned target.
pub type OnClone<'a> = Box<dyn FnOnce(&mut Document, NodeId) + Send + 'a>;

/// Rasterizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Canvas fill before painting; `None` leaves it transparent.
    pub background_color: Option<String>,
    /// Device pixels per CSS px.
    pub scale: f32,
    /// Load cross-origin images.
    pub use_cors: bool,
    /// Paint cross-origin images.
    pub allow_taint: bool,
    /// Canvas width in CSS px; the target's border box when unset.
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Window the clone is laid out in.
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    /// Emit per-pass statistics at debug level.
    pub logging: bool,
    /// Ceiling for each image wait.
    pub image_timeout: Duration,
    /// Drop the cloned document once painted. The built-in rasterizer never
    /// attaches its clone to the live document, so it always does.
    pub remove_container: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            background_color: Some("#ffffff".to_string()),
            scale: 1.0,
            use_cors: false,
            allow_taint: false,
            width: None,
            height: None,
            window_width: None,
            window_height: None,
            logging: true,
            image_timeout: Duration::from_millis(15_000),
            remove_container: true,
        }
    }
}

impl RasterOptions {
    fn window(&self) -> (f32, f32) {
        let width = self.window_width.or(self.width).unwrap_or(DEFAULT_WINDOW.0);
        let height = self.window_height.or(self.height).unwrap_or(DEFAULT_WINDOW.1);
        (width as f32, height as f32)
    }

    fn cross_origin_allowed(&self) -> bool {
        self.use_cors || self.allow_taint
    }
}

/// Turns a document subtree into a canvas.
pub trait Rasterize: Send + Sync {
    /// Rasterize `target` of `document`. `on_clone` runs exactly once, on the
    /// clone, before layout. `Ok(None)` means no canvas could be allocated.
    fn rasterize<'a>(
        &'a self,
        document: &'a Document,
        target: NodeId,
        options: RasterOptions,
        on_clone: OnClone<'a>,
    ) -> BoxFuture<'a, Result<Option<Canvas>>>;
}

/// The built-in rasterizer: clone, wait for images, lay out, paint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rasterizer;

impl Rasterizer {
    pub fn new() -> Self {
        Self
    }

    /// Start every image the clone will paint and collect their slots.
    fn request_images(doc: &Document, target: NodeId, options: &RasterOptions) -> Vec<Arc<ImageSlot>> {
        let mut sources = Vec::new();
        let mut nodes = vec![target];
        nodes.extend(doc.descendant_elements(target));
        for node in nodes {
            let Some(el) = doc.element(node) else {
                continue;
            };
            if el.tag() == "img" {
                sources.extend(doc.image_source(node));
            }
            for prop in ["background", "background-image"] {
                let Some(value) = specified(doc, node, prop) else {
                    continue;
                };
                for layer in split_top_level(&value, ',') {
                    for token in split_whitespace_top_level(layer) {
                        if let Some(href) = url_argument(token) {
                            sources.push(doc.resolve_url(&href));
                        }
                    }
                }
            }
        }
        sources.sort();
        sources.dedup();

        let images = doc.images();
        sources
            .into_iter()
            .filter(|src| {
                let blocked = !options.cross_origin_allowed() && images.is_cross_origin(src);
                if blocked {
                    debug!("not loading cross-origin image {src}");
                }
                !blocked
            })
            .map(|src| images.request(&src))
            .collect()
    }

    async fn wait_for_images(slots: &[Arc<ImageSlot>], timeout: Duration, logging: bool) {
        let waits = slots.iter().map(|slot| async move {
            match tokio::time::timeout(timeout, slot.wait()).await {
                Ok(_) => true,
                Err(_) => {
                    warn!("timed out after {}ms loading {}", timeout.as_millis(), slot.src());
                    false
                }
            }
        });
        let finished = join_all(waits).await;
        if logging {
            let ready = finished.iter().filter(|ok| **ok).count();
            debug!("{ready}/{} images settled before painting", finished.len());
        }
    }

    fn paint(doc: &Document, target: NodeId, options: &RasterOptions) -> Result<Option<Canvas>> {
        let viewport = options.window();
        let Some(tree) = layout_subtree(doc, target, &LayoutOptions { viewport }) else {
            debug!("export target is not rendered");
            return Ok(None);
        };
        let width = options.width.map(|w| w as f32).unwrap_or(tree.rect.width);
        let height = options.height.map(|h| h as f32).unwrap_or(tree.rect.height);
        let (px_width, px_height) = match device_size(width, height, options.scale) {
            Some(size) => size,
            None => return Ok(None),
        };
        let Some(mut canvas) = Canvas::new(px_width, px_height) else {
            warn!("cannot allocate a {px_width}x{px_height} canvas");
            return Ok(None);
        };

        if let Some(background) = &options.background_color {
            match parse_legacy_color(background) {
                Some(color) => canvas.pixmap_mut().fill(color.to_skia()),
                None => debug!("ignoring unparseable canvas background '{background}'"),
            }
        }

        let paint_options = PaintOptions {
            allow_cross_origin: options.cross_origin_allowed(),
            viewport,
        };
        let items = build_display_list(doc, &tree, &paint_options);
        if options.logging {
            debug!(
                "painting {} display items onto {px_width}x{px_height} (scale {})",
                items.len(),
                options.scale
            );
        }
        paint_display_list(canvas.pixmap_mut(), &items, options.scale);
        Ok(Some(canvas))
    }
}

/// Device pixel size for a CSS size at `scale`, or `None` when it is empty.
fn device_size(width: f32, height: f32, scale: f32) -> Option<(u32, u32)> {
    let w = (width * scale).ceil();
    let h = (height * scale).ceil();
    if !w.is_finite() || !h.is_finite() || w < 1.0 || h < 1.0 || w > u32::MAX as f32 || h > u32::MAX as f32 {
        return None;
    }
    Some((w as u32, h as u32))
}

impl Rasterize for Rasterizer {
    fn rasterize<'a>(
        &'a self,
        document: &'a Document,
        target: NodeId,
        options: RasterOptions,
        on_clone: OnClone<'a>,
    ) -> BoxFuture<'a, Result<Option<Canvas>>> {
        Box::pin(async move {
            if !document.is_connected(target) {
                return Err(Error::RenderError("element is not attached to the document".into()));
            }
            let mut clone = document.clone();
            on_clone(&mut clone, target);
            if !clone.is_connected(target) {
                return Err(Error::RenderError("snapshot callback detached the target".into()));
            }

            let slots = Self::request_images(&clone, target, &options);
            Self::wait_for_images(&slots, options.image_timeout, options.logging).await;

            tokio::task::spawn_blocking(move || Self::paint(&clone, target, &options))
                .await
                .map_err(|e| Error::RenderError(format!("paint task failed: {e}")))?
        })
    }
}
