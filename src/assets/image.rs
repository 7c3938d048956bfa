//! Headless view model for displaying a remote asset image.
//!
//! Pixel work (download, decoding, caching, drawing) belongs to an external
//! image component behind [`ImageLoader`]. [`AssetImage`] only decides what
//! to show: the caller's placeholder until a URL is resolved, then an
//! [`ImageRequest`] for the loader.

use std::time::Duration;

use tokio::sync::watch;

use super::resolver::AssetResolver;

/// How long the image component may keep a downloaded image on disk.
pub const DISK_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cross-fade applied when the image replaces the placeholder.
pub const FADE_IN: Duration = Duration::from_millis(250);

/// What the image component is asked to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub url: String,
    /// Key the image component caches the pixels under.
    pub cache_key: String,
    pub disk_cache_ttl: Duration,
    pub fade_in: Duration,
}

impl ImageRequest {
    pub fn new(url: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cache_key: cache_key.into(),
            disk_cache_ttl: DISK_CACHE_TTL,
            fade_in: FADE_IN,
        }
    }
}

/// The external image-loading component.
pub trait ImageLoader: Send + Sync {
    fn load(&self, request: &ImageRequest);
}

/// Resolution progress of an [`AssetImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPhase {
    Pending,
    Ready(ImageRequest),
    /// No URL could be resolved; the placeholder stays.
    Unavailable,
}

/// What to render right now.
#[derive(Debug, PartialEq)]
pub enum AssetView<'a, P> {
    Placeholder(&'a P),
    Image(ImageRequest),
}

/// An asset image with a caller-supplied placeholder `P`.
pub struct AssetImage<P> {
    key: String,
    path: String,
    placeholder: P,
    phase: watch::Sender<AssetPhase>,
}

impl<P> AssetImage<P> {
    pub fn new(key: impl Into<String>, path: impl Into<String>, placeholder: P) -> Self {
        let (phase, _) = watch::channel(AssetPhase::Pending);
        Self {
            key: key.into(),
            path: path.into(),
            placeholder,
            phase,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn phase(&self) -> AssetPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AssetPhase> {
        self.phase.subscribe()
    }

    /// Resolves the asset URL and hands it to `loader`.
    pub async fn load(&self, resolver: &AssetResolver, loader: &dyn ImageLoader) -> AssetPhase {
        self.phase.send_replace(AssetPhase::Pending);
        let phase = match resolver.resolve(&self.key, &self.path).await {
            Some(url) => {
                let request = ImageRequest::new(url, self.key.clone());
                loader.load(&request);
                AssetPhase::Ready(request)
            }
            None => AssetPhase::Unavailable,
        };
        self.phase.send_replace(phase.clone());
        phase
    }

    pub fn view(&self) -> AssetView<'_, P> {
        match &*self.phase.borrow() {
            AssetPhase::Ready(request) => AssetView::Image(request.clone()),
            AssetPhase::Pending | AssetPhase::Unavailable => {
                AssetView::Placeholder(&self.placeholder)
            }
        }
    }
}
