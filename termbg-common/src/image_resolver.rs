use std::collections::HashMap;
use std::path::{Path, PathBuf};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use walkdir::WalkDir;
use crate::error::{ErrorContext, ImageError, TermbgError};
use crate::Result;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "jpe", "png", "webp"];

/// Height/width ratio above which an image counts as portrait. Near-square
/// images stay single so they do not force a pairing.
pub const PORTRAIT_RATIO: f64 = 1.1;

/// The 0, 1 or 2 images currently on screen, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedImages(Vec<PathBuf>);

impl SelectedImages {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn single(image: PathBuf) -> Self {
        Self(vec![image])
    }

    /// Two portraits side by side. Identical paths collapse to one image.
    pub fn pair(left: PathBuf, right: PathBuf) -> Self {
        if left == right {
            return Self::single(left);
        }
        Self(vec![left, right])
    }

    /// Rebuilds a set received over the wire, dropping anything past the
    /// second entry.
    pub fn from_reported(mut images: Vec<PathBuf>) -> Self {
        images.truncate(2);
        match images.len() {
            2 => {
                let right = images.pop().unwrap_or_default();
                let left = images.pop().unwrap_or_default();
                Self::pair(left, right)
            }
            _ => Self(images),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_pair(&self) -> bool {
        self.0.len() == 2
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn is_portrait(&self) -> bool {
        if self.width == 0 {
            return false;
        }
        f64::from(self.height) / f64::from(self.width) > PORTRAIT_RATIO
    }
}

/// Reads the pixel size of an image file.
pub trait DimensionProbe: Send {
    fn probe(&self, path: &Path) -> Result<Dimensions>;
}

/// Header-only probe backed by the `image` crate.
pub struct ImageProbe;

impl DimensionProbe for ImageProbe {
    fn probe(&self, path: &Path) -> Result<Dimensions> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            TermbgError::Image(ImageError::Probe {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })?;
        Ok(Dimensions { width, height })
    }
}

/// Probe answering from a fixed table, for headless runs and tests.
#[derive(Default)]
pub struct FixedProbe {
    sizes: HashMap<PathBuf, Dimensions>,
}

impl FixedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        self.sizes.insert(path.into(), Dimensions { width, height });
        self
    }
}

impl DimensionProbe for FixedProbe {
    fn probe(&self, path: &Path) -> Result<Dimensions> {
        self.sizes.get(path).copied().ok_or_else(|| {
            TermbgError::Image(ImageError::Probe {
                path: path.to_path_buf(),
                message: "unknown image".to_string(),
            })
        })
    }
}

/// Uniform index picker. `pick(len)` is only called with `len > 0`.
pub trait RandomSource: Send {
    fn pick(&mut self, len: usize) -> usize;
}

pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// Turns a profile's `path` into the image(s) to show.
pub struct ImageResolver {
    probe: Box<dyn DimensionProbe>,
    random: Box<dyn RandomSource>,
}

impl ImageResolver {
    pub fn new(probe: Box<dyn DimensionProbe>, random: Box<dyn RandomSource>) -> Self {
        Self { probe, random }
    }

    pub fn with_defaults() -> Self {
        Self::new(Box::new(ImageProbe), Box::new(ThreadRandom))
    }

    /// Resolves `source` and picks the images for one rotation. Filesystem
    /// problems are logged and yield an empty set.
    pub fn resolve(&mut self, source: &Path) -> SelectedImages {
        match Self::collect_pool(source) {
            Ok(pool) => self.select(pool),
            Err(e) => {
                log::warn!("No images available from {:?}: {}", source, e);
                SelectedImages::empty()
            }
        }
    }

    /// Builds the candidate pool: every image in a directory, or every entry
    /// of a newline-delimited list file.
    pub fn collect_pool(source: &Path) -> Result<Vec<PathBuf>> {
        let source = absolute(source)?;
        if source.is_dir() {
            return Self::list_images_in_directory(&source);
        }
        if !source.is_file() {
            return Err(TermbgError::Image(ImageError::MissingSource { path: source }));
        }

        let content = std::fs::read_to_string(&source).map_err(|e| {
            TermbgError::Image(ImageError::ListRead { path: source.clone(), source: e })
        })?;
        let base = source.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut pool = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let entry = base.join(line);
            if entry.is_dir() {
                pool.extend(Self::list_images_in_directory(&entry)?);
            } else if entry.is_file() {
                pool.push(entry);
            } else {
                return Err(ImageError::BrokenEntry { path: entry })
                    .with_context(format!("reading image list {:?}", source));
            }
        }

        log::debug!("Image list {:?} expanded to {} images", source, pool.len());
        Ok(pool)
    }

    /// Images directly inside `dir` (no recursion), sorted by path.
    pub fn list_images_in_directory(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                // Depth 0 is `dir` itself; anything deeper is one bad entry.
                Err(e) if e.depth() > 0 => {
                    log::warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                    continue;
                }
                Err(e) => {
                    let source = e.into_io_error().unwrap_or_else(|| {
                        std::io::Error::other("filesystem loop")
                    });
                    return Err(TermbgError::Image(ImageError::DirectoryRead {
                        path: dir.to_path_buf(),
                        source,
                    }));
                }
            };
            let path = entry.path();
            if path.is_file() && Self::is_supported(path) {
                images.push(path.to_path_buf());
            }
        }

        images.sort();
        log::debug!("Found {} images in {:?}", images.len(), dir);
        Ok(images)
    }

    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Picks one image; a portrait pick tries to find a second portrait.
    /// A landscape second pick wins the screen on its own.
    pub fn select(&mut self, mut pool: Vec<PathBuf>) -> SelectedImages {
        if pool.is_empty() {
            return SelectedImages::empty();
        }

        let candidate = pool.swap_remove(self.random.pick(pool.len()));
        if !self.is_portrait(&candidate) {
            return SelectedImages::single(candidate);
        }

        if pool.is_empty() {
            return SelectedImages::single(candidate);
        }
        let next = pool.swap_remove(self.random.pick(pool.len()));
        if self.is_portrait(&next) {
            SelectedImages::pair(candidate, next)
        } else {
            SelectedImages::single(next)
        }
    }

    fn is_portrait(&self, path: &Path) -> bool {
        match self.probe.probe(path) {
            Ok(dimensions) => dimensions.is_portrait(),
            Err(e) => {
                log::warn!("Treating {:?} as landscape: {}", path, e);
                false
            }
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        TermbgError::Image(ImageError::DirectoryRead { path: path.to_path_buf(), source: e })
    })
}
