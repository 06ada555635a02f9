//! Lazily decoded images with provenance.
//!
//! An [`ImageHandle`] wraps one image source (URL, file, or in-memory
//! bitmap). Nothing is fetched or decoded until a pixel-level question is
//! asked; the first such question decodes once and every later one reuses
//! the result, including from other threads.
//!
//! ## OK / KO
//!
//! A handle whose decode failed is *KO* for good. Every operation on a KO
//! handle returns `None` instead of failing: geometry, corner colors,
//! `trim`, `thumbnail`, `save`, `text`. Fetch and decode errors are logged
//! at this boundary and never surface past it.
//!
//! ## Provenance
//!
//! `trim`, `thumbnail` and `save` each return a new handle whose parent is
//! the handle they were called on. Parents are fixed at construction, so
//! chains are acyclic and end at an origin with no parent.
//!
//! | Created by | Background |
//! |---|---|
//! | `open_url`, `open_path`, `from_bitmap` | most common corner color, if decodable, else none |
//! | `trim` | the color the trim removed (explicit) |
//! | `thumbnail`, `save` | inherited from the parent chain |
//!
//! Resolving an inherited background walks parents until a handle can
//! answer, so a saved thumbnail of a trimmed poster reports the trimmed
//! frame color without re-sampling anything.

use super::calculations::fit_within;
use super::color::{Color, CornerColors};
use super::encode::{self, ImagingError};
use super::ocr::TextRecognizer;
use super::params::{Quality, TrimParams};
use super::trim::BorderTrimmer;
use crate::fetch::{Fetch, FetchError};
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

#[derive(Clone)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
    Bitmap(Arc<RgbImage>),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bitmap(img) => write!(f, "Bitmap({}x{})", img.width(), img.height()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Self::Landscape,
            std::cmp::Ordering::Less => Self::Portrait,
            std::cmp::Ordering::Equal => Self::Square,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Square => "square",
        }
    }
}

/// Collaborators shared by every handle opened through them.
pub struct ImageServices {
    fetcher: Arc<dyn Fetch>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    trimmer: BorderTrimmer,
}

impl ImageServices {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            recognizer: None,
            trimmer: BorderTrimmer::default(),
        }
    }

    /// Services for handles that never touch the network.
    pub fn offline() -> Self {
        Self::new(Arc::new(Offline))
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_trim_params(mut self, params: TrimParams) -> Self {
        self.trimmer = BorderTrimmer::new(params);
        self
    }

    pub fn trimmer(&self) -> &BorderTrimmer {
        &self.trimmer
    }
}

struct Offline;

impl Fetch for Offline {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Network {
            url: url.to_string(),
            reason: "no fetcher configured".into(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Background {
    Explicit(Color),
    Sample,
    Inherit,
}

/// What a trim removed, carried so a second trim can weigh against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimRecord {
    pub background: Color,
    pub removed_area: u64,
}

struct Inner {
    source: ImageSource,
    services: Arc<ImageServices>,
    parent: Option<ImageHandle>,
    background: Background,
    trim_record: Option<TrimRecord>,
    bitmap: OnceLock<Option<Arc<RgbImage>>>,
    text: OnceLock<Option<String>>,
    display_url: RwLock<Option<String>>,
}

/// Cheap-to-clone reference to one image in a provenance chain.
///
/// Equality is identity: two handles are equal when they are the same node.
#[derive(Clone)]
pub struct ImageHandle {
    inner: Arc<Inner>,
}

impl ImageHandle {
    pub fn open_url(services: &Arc<ImageServices>, url: impl Into<String>) -> Self {
        Self::origin_of(services, ImageSource::Url(url.into()))
    }

    pub fn open_path(services: &Arc<ImageServices>, path: impl Into<PathBuf>) -> Self {
        Self::origin_of(services, ImageSource::Path(path.into()))
    }

    pub fn from_bitmap(services: &Arc<ImageServices>, bitmap: RgbImage) -> Self {
        Self::origin_of(services, ImageSource::Bitmap(Arc::new(bitmap)))
    }

    fn origin_of(services: &Arc<ImageServices>, source: ImageSource) -> Self {
        Self::build(services.clone(), source, None, Background::Sample, None)
    }

    fn derive(&self, source: ImageSource, background: Background, trim: Option<TrimRecord>) -> Self {
        Self::build(
            self.inner.services.clone(),
            source,
            Some(self.clone()),
            background,
            trim,
        )
    }

    fn build(
        services: Arc<ImageServices>,
        source: ImageSource,
        parent: Option<ImageHandle>,
        background: Background,
        trim_record: Option<TrimRecord>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                services,
                parent,
                background,
                trim_record,
                bitmap: OnceLock::new(),
                text: OnceLock::new(),
                display_url: RwLock::new(None),
            }),
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.inner.source
    }

    pub fn parent(&self) -> Option<&ImageHandle> {
        self.inner.parent.as_ref()
    }

    pub fn trim_record(&self) -> Option<TrimRecord> {
        self.inner.trim_record
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// The decoded bitmap, or `None` if this handle is KO.
    pub fn decode(&self) -> Option<Arc<RgbImage>> {
        self.inner
            .bitmap
            .get_or_init(|| match self.load() {
                Ok(img) => Some(img),
                Err(e) => {
                    tracing::warn!(source = ?self.inner.source, error = %e, "image unavailable");
                    None
                }
            })
            .clone()
    }

    fn load(&self) -> Result<Arc<RgbImage>, LoadError> {
        match &self.inner.source {
            ImageSource::Bitmap(img) => Ok(img.clone()),
            ImageSource::Path(path) => Ok(Arc::new(encode::load_path(path)?)),
            ImageSource::Url(url) => {
                let bytes = self.inner.services.fetcher.fetch(url)?;
                Ok(Arc::new(encode::decode_bytes(&bytes)?))
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.decode().is_some()
    }

    pub fn is_ko(&self) -> bool {
        !self.is_ok()
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.decode().map(|img| img.dimensions())
    }

    pub fn width(&self) -> Option<u32> {
        self.dimensions().map(|(w, _)| w)
    }

    pub fn height(&self) -> Option<u32> {
        self.dimensions().map(|(_, h)| h)
    }

    pub fn area(&self) -> Option<u64> {
        self.dimensions()
            .map(|(w, h)| u64::from(w) * u64::from(h))
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.dimensions().map(|(w, h)| Orientation::of(w, h))
    }

    pub fn is_landscape(&self) -> bool {
        self.orientation() == Some(Orientation::Landscape)
    }

    pub fn is_portrait(&self) -> bool {
        self.orientation() == Some(Orientation::Portrait)
    }

    pub fn corner_colors(&self) -> Option<CornerColors> {
        CornerColors::sample(&*self.decode()?)
    }

    // =========================================================================
    // Provenance
    // =========================================================================

    /// Background color, resolved along the parent chain when not known here.
    pub fn background(&self) -> Option<Color> {
        let mut current = Some(self);
        while let Some(handle) = current {
            match handle.inner.background {
                Background::Explicit(color) => return Some(color),
                Background::Sample => {
                    if let Some(corners) = handle.corner_colors() {
                        return Some(corners.most_common());
                    }
                }
                Background::Inherit => {}
            }
            current = handle.parent();
        }
        None
    }

    /// The first handle of this chain.
    pub fn origin(&self) -> ImageHandle {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// Number of ancestors between this handle and its origin.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Some(parent) = current.parent() {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn display_url(&self) -> Option<String> {
        self.inner
            .display_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_display_url(&self, url: impl Into<String>) {
        *self
            .inner
            .display_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.into());
    }

    // =========================================================================
    // Derived images
    // =========================================================================

    /// Remove a uniform frame. `None` means KO or nothing worth trimming.
    pub fn trim(&self) -> Option<ImageHandle> {
        let bitmap = self.decode()?;
        let trimmed = self.inner.services.trimmer.trim(&bitmap)?;
        let record = match self.inner.trim_record {
            Some(prev) => TrimRecord {
                background: if prev.removed_area >= trimmed.removed_area {
                    prev.background
                } else {
                    trimmed.background
                },
                removed_area: prev.removed_area + trimmed.removed_area,
            },
            None => TrimRecord {
                background: trimmed.background,
                removed_area: trimmed.removed_area,
            },
        };
        tracing::debug!(
            from = ?bitmap.dimensions(),
            to = ?trimmed.bitmap.dimensions(),
            background = %record.background,
            "trimmed"
        );
        Some(self.derive(
            ImageSource::Bitmap(Arc::new(trimmed.bitmap)),
            Background::Explicit(record.background),
            Some(record),
        ))
    }

    /// Scale down to fit within `max_width x max_height`. Never upscales.
    pub fn thumbnail(&self, max_width: u32, max_height: u32) -> Option<ImageHandle> {
        let bitmap = self.decode()?;
        let (w, h) = fit_within(bitmap.dimensions(), (max_width, max_height));
        let scaled = if (w, h) == bitmap.dimensions() {
            bitmap
        } else {
            Arc::new(imageops::resize(&*bitmap, w, h, FilterType::Lanczos3))
        };
        Some(self.derive(
            ImageSource::Bitmap(scaled),
            Background::Inherit,
            self.inner.trim_record,
        ))
    }

    /// Encode to `path` (format from its extension), creating directories.
    ///
    /// Returns a handle on the written file. Write failures are logged and
    /// yield `None`; they never abort anything beyond this image.
    pub fn save(&self, path: impl AsRef<Path>, quality: Quality) -> Option<ImageHandle> {
        let path = path.as_ref();
        let bitmap = self.decode()?;
        if let Err(e) = encode::save(&bitmap, path, quality) {
            tracing::error!(path = %path.display(), error = %e, "failed to save image");
            return None;
        }
        Some(self.derive(
            ImageSource::Path(path.to_path_buf()),
            Background::Inherit,
            self.inner.trim_record,
        ))
    }

    /// Recognized text, computed at most once. `None` when KO, when no
    /// recognizer is configured, or when recognition fails or finds nothing.
    pub fn text(&self) -> Option<String> {
        self.inner
            .text
            .get_or_init(|| {
                let recognizer = self.inner.services.recognizer.as_ref()?;
                let bitmap = self.decode()?;
                match recognizer.recognize(&bitmap) {
                    Ok(text) if text.is_empty() => None,
                    Ok(text) => Some(text),
                    Err(e) => {
                        tracing::warn!(source = ?self.inner.source, error = %e, "text recognition failed");
                        None
                    }
                }
            })
            .clone()
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ImageHandle {}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("source", &self.inner.source)
            .field("decoded", &self.inner.bitmap.get().map(Option::is_some))
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
}
