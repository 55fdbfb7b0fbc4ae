//! Image resources shared by a document and all of its clones.
//!
//! Each distinct source gets one [`ImageSlot`] whose state moves from
//! `Pending` to `Loaded` or `Failed` exactly once. Loads run as tokio tasks
//! (decoding on the blocking pool) and are started on first request, which
//! mirrors a browser kicking off a fetch when an `img` is inserted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine as _;
use log::{debug, warn};
use tiny_skia::{IntSize, Pixmap};
use tokio::sync::watch;
use url::Url;

use crate::{Error, Result};

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Loading state of one image source.
#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Loaded(Arc<Pixmap>),
    Failed(String),
}

impl LoadState {
    /// Loaded and failed are both terminal: a broken image is "complete".
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

#[derive(Debug)]
pub struct ImageSlot {
    src: String,
    state: watch::Sender<LoadState>,
    started: AtomicBool,
}

impl ImageSlot {
    fn new(src: &str) -> Self {
        let (state, _) = watch::channel(LoadState::Pending);
        Self {
            src: src.to_string(),
            state,
            started: AtomicBool::new(false),
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    pub fn pixmap(&self) -> Option<Arc<Pixmap>> {
        match &*self.state.borrow() {
            LoadState::Loaded(p) => Some(Arc::clone(p)),
            _ => None,
        }
    }

    /// Wait until the slot reaches a terminal state.
    pub async fn wait(&self) -> LoadState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(LoadState::is_terminal).await {
            Ok(state) => (*state).clone(),
            Err(_) => self.state(),
        };
        state
    }

    fn finish(&self, state: LoadState) {
        self.state.send_replace(state);
    }
}

/// Registry of image sources, keyed by resolved URL.
pub struct ImageRegistry {
    base_url: Option<Url>,
    slots: Mutex<HashMap<String, Arc<ImageSlot>>>,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl std::fmt::Debug for ImageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.slots.lock().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("ImageRegistry")
            .field("base_url", &self.base_url)
            .field("slots", &count)
            .finish()
    }
}

impl ImageRegistry {
    pub fn new(base_url: Option<Url>) -> Self {
        Self {
            base_url,
            slots: Mutex::new(HashMap::new()),
            #[cfg(feature = "http")]
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub fn slot(&self, src: &str) -> Option<Arc<ImageSlot>> {
        self.lock_slots().get(src).cloned()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ImageSlot>>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the slot for `src`, starting its load if a runtime is available
    /// and it has not been started yet.
    pub fn request(&self, src: &str) -> Arc<ImageSlot> {
        let slot = Arc::clone(
            self.lock_slots()
                .entry(src.to_string())
                .or_insert_with(|| Arc::new(ImageSlot::new(src))),
        );
        if slot.is_complete() {
            return slot;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return slot;
        };
        if slot.started.swap(true, Ordering::SeqCst) {
            return slot;
        }

        debug!("loading image {src}");
        let task_slot = Arc::clone(&slot);
        let source = Source {
            src: src.to_string(),
            #[cfg(feature = "http")]
            client: self.client.clone(),
        };
        handle.spawn(async move {
            let state = match source.load().await {
                Ok(pixmap) => LoadState::Loaded(Arc::new(pixmap)),
                Err(err) => {
                    warn!("{err}");
                    LoadState::Failed(err.to_string())
                }
            };
            task_slot.finish(state);
        });
        slot
    }

    /// Decode `bytes` synchronously and register them under `src`.
    pub fn preload(&self, src: &str, bytes: &[u8]) -> Result<Arc<ImageSlot>> {
        let pixmap = decode_pixmap(src, bytes)?;
        let slot = Arc::new(ImageSlot::new(src));
        slot.started.store(true, Ordering::SeqCst);
        slot.finish(LoadState::Loaded(Arc::new(pixmap)));
        self.lock_slots().insert(src.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Whether fetching `src` leaves the document's origin.
    pub fn is_cross_origin(&self, src: &str) -> bool {
        let Ok(url) = Url::parse(src) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        match &self.base_url {
            Some(base) => base.origin() != url.origin(),
            None => true,
        }
    }
}

struct Source {
    src: String,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl Source {
    async fn load(self) -> Result<Pixmap> {
        let bytes = self.fetch().await?;
        let src = self.src;
        tokio::task::spawn_blocking(move || decode_pixmap(&src, &bytes))
            .await
            .map_err(|e| Error::Other(format!("image decode task failed: {e}")))?
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        let src = self.src.as_str();
        if src.starts_with("data:") {
            return decode_data_url(src);
        }
        if src.starts_with("http://") || src.starts_with("https://") {
            return self.fetch_http().await;
        }
        let path = if src.starts_with("file:") {
            Url::parse(src)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| Error::image(src, "invalid file URL"))?
        } else {
            PathBuf::from(src)
        };
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::image(src, e))
    }

    #[cfg(feature = "http")]
    async fn fetch_http(&self) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.src)
            .send()
            .await
            .map_err(|e| Error::image(&self.src, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::image(&self.src, format!("HTTP status {status}")));
        }
        let body = response.bytes().await.map_err(|e| Error::image(&self.src, e))?;
        Ok(body.to_vec())
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_http(&self) -> Result<Vec<u8>> {
        Err(Error::image(&self.src, "http image support is disabled"))
    }
}

/// Decode a `data:` URL payload.
pub fn decode_data_url(src: &str) -> Result<Vec<u8>> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| Error::image(src, "not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::image(src, "data URL without payload"))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::image(src, e))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Decode encoded image bytes into a premultiplied pixmap.
pub fn decode_pixmap(src: &str, bytes: &[u8]) -> Result<Pixmap> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| Error::image(src, e))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let size = IntSize::from_wh(width, height).ok_or_else(|| Error::image(src, "empty image"))?;
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size).ok_or_else(|| Error::image(src, "invalid pixel buffer"))
}

/// A solid-color PNG for tests.
#[cfg(test)]
pub(crate) fn solid_png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
