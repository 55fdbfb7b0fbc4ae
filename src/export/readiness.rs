//! Waiting for a subtree's images before it is sampled.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};

use crate::assets::{ImageSlot, LoadState};
use crate::dom::{Document, NodeId};

/// Outcome of [`wait_for_images`], counted per `img` element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessReport {
    pub total: usize,
    pub loaded: usize,
    /// Errored, undecodable or without a `src`.
    pub failed: usize,
    /// Still loading when the timeout elapsed.
    pub pending: usize,
}

impl ReadinessReport {
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }

    fn count(&mut self, state: &LoadState) {
        match state {
            LoadState::Loaded(_) => self.loaded += 1,
            LoadState::Failed(_) => self.failed += 1,
            LoadState::Pending => self.pending += 1,
        }
    }
}

/// Resolve once every `img` at or under `root` has loaded or failed, or once
/// `timeout` elapses. Images that are already complete never wait, and a
/// subtree without images returns immediately.
pub async fn wait_for_images(doc: &Document, root: NodeId, timeout: Duration) -> ReadinessReport {
    let mut report = ReadinessReport::default();
    let images = doc.elements_by_tag(root, "img");
    report.total = images.len();

    let mut slots: Vec<Arc<ImageSlot>> = Vec::with_capacity(images.len());
    for img in images {
        match doc.image_source(img) {
            Some(src) => slots.push(doc.images().request(&src)),
            None => report.failed += 1,
        }
    }

    let waiting: Vec<&Arc<ImageSlot>> = slots.iter().filter(|s| !s.is_complete()).collect();
    if !waiting.is_empty() {
        debug!("waiting for {} of {} images", waiting.len(), report.total);
        let all = join_all(waiting.iter().map(|slot| slot.wait()));
        if tokio::time::timeout(timeout, all).await.is_err() {
            debug!("image wait hit the {}ms ceiling", timeout.as_millis());
        }
    }

    for slot in &slots {
        report.count(&slot.state());
    }
    if report.pending > 0 {
        warn!(
            "{} image(s) still loading after {}ms; exporting without them",
            report.pending,
            timeout.as_millis()
        );
    }
    report
}
