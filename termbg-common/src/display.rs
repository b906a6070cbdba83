use std::collections::BTreeMap;
use std::sync::Mutex;
use crate::image_resolver::SelectedImages;

/// The custom properties the presenter owns on its container element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleProperty {
    BackgroundImage,
    BackgroundOpacity,
    BackgroundColor,
    OpacityDelay,
    BlurSize,
    BackgroundPosition,
    BackgroundSize,
}

impl StyleProperty {
    pub const ALL: [StyleProperty; 7] = [
        StyleProperty::BackgroundImage,
        StyleProperty::BackgroundOpacity,
        StyleProperty::BackgroundColor,
        StyleProperty::OpacityDelay,
        StyleProperty::BlurSize,
        StyleProperty::BackgroundPosition,
        StyleProperty::BackgroundSize,
    ];

    pub fn css_name(&self) -> &'static str {
        match self {
            StyleProperty::BackgroundImage => "--background-image",
            StyleProperty::BackgroundOpacity => "--background-opacity",
            StyleProperty::BackgroundColor => "--background-color",
            StyleProperty::OpacityDelay => "--opacity-delay",
            StyleProperty::BlurSize => "--blur-size",
            StyleProperty::BackgroundPosition => "--background-position",
            StyleProperty::BackgroundSize => "--background-size",
        }
    }
}

impl std::fmt::Display for StyleProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.css_name())
    }
}

/// A batch of property writes applied together.
pub type StyleUpdate = Vec<(StyleProperty, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    values: BTreeMap<StyleProperty, String>,
}

impl DisplayState {
    /// Nothing visible: no image, zero opacity.
    pub fn hidden() -> Self {
        let mut state = Self { values: BTreeMap::new() };
        state.apply(&hidden_update());
        state
    }

    pub fn apply(&mut self, update: &[(StyleProperty, String)]) {
        for (property, value) in update {
            self.values.insert(*property, value.clone());
        }
    }

    pub fn get(&self, property: StyleProperty) -> Option<&str> {
        self.values.get(&property).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StyleProperty, &str)> {
        self.values.iter().map(|(p, v)| (*p, v.as_str()))
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::hidden()
    }
}

/// Where the presenter writes display state. Each `apply` call is one
/// display-state write.
pub trait DisplaySurface: Send + Sync + 'static {
    fn apply(&self, update: &[(StyleProperty, String)]);
}

/// Keeps display state in memory and counts writes.
#[derive(Debug, Default)]
pub struct MemorySurface {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    state: DisplayState,
    writes: usize,
    log: Vec<StyleUpdate>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DisplayState {
        self.lock().state.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn history(&self) -> Vec<StyleUpdate> {
        self.lock().log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned surface still holds the last complete write.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySurface for MemorySurface {
    fn apply(&self, update: &[(StyleProperty, String)]) {
        let mut inner = self.lock();
        inner.state.apply(update);
        inner.writes += 1;
        inner.log.push(update.to_vec());
    }
}

pub fn hidden_update() -> StyleUpdate {
    vec![
        (StyleProperty::BackgroundImage, "unset".to_string()),
        (StyleProperty::BackgroundOpacity, "0".to_string()),
        (StyleProperty::BackgroundColor, "transparent".to_string()),
        (StyleProperty::OpacityDelay, "0s".to_string()),
        (StyleProperty::BlurSize, "0px".to_string()),
        (StyleProperty::BackgroundPosition, "center".to_string()),
        (StyleProperty::BackgroundSize, "cover".to_string()),
    ]
}

/// Fade-out write at the start of a rotation.
pub fn fade_out_update(overlay_color: &str, opacity_delay: &str, blur: &str) -> StyleUpdate {
    vec![
        (StyleProperty::BackgroundOpacity, "0".to_string()),
        (StyleProperty::BackgroundColor, overlay_color.to_string()),
        (StyleProperty::OpacityDelay, opacity_delay.to_string()),
        (StyleProperty::BlurSize, blur.to_string()),
    ]
}

/// Image swap write; a pair is laid out left and right.
pub fn image_update(images: &SelectedImages) -> StyleUpdate {
    let urls = images
        .paths()
        .iter()
        .map(|p| format!("url(\"file://{}\")", p.display()))
        .collect::<Vec<_>>()
        .join(", ");

    let (position, size) = if images.is_pair() {
        ("left center, right center", "auto 100%, auto 100%")
    } else {
        ("center", "cover")
    };

    vec![
        (StyleProperty::BackgroundImage, urls),
        (StyleProperty::BackgroundPosition, position.to_string()),
        (StyleProperty::BackgroundSize, size.to_string()),
    ]
}

pub fn fade_in_update() -> StyleUpdate {
    vec![(StyleProperty::BackgroundOpacity, "1".to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hidden_baseline() {
        let state = DisplayState::hidden();
        assert_eq!(state.get(StyleProperty::BackgroundImage), Some("unset"));
        assert_eq!(state.get(StyleProperty::BackgroundOpacity), Some("0"));
        assert_eq!(state.iter().count(), StyleProperty::ALL.len());
    }

    #[test]
    fn test_image_update_single() {
        let update = image_update(&SelectedImages::single(PathBuf::from("/wall/a b.jpg")));
        let mut state = DisplayState::hidden();
        state.apply(&update);

        assert_eq!(state.get(StyleProperty::BackgroundImage), Some("url(\"file:///wall/a b.jpg\")"));
        assert_eq!(state.get(StyleProperty::BackgroundPosition), Some("center"));
        assert_eq!(state.get(StyleProperty::BackgroundSize), Some("cover"));
    }

    #[test]
    fn test_image_update_pair() {
        let images = SelectedImages::pair(PathBuf::from("/l.jpg"), PathBuf::from("/r.jpg"));
        let mut state = DisplayState::hidden();
        state.apply(&image_update(&images));

        assert_eq!(
            state.get(StyleProperty::BackgroundImage),
            Some("url(\"file:///l.jpg\"), url(\"file:///r.jpg\")")
        );
        assert_eq!(state.get(StyleProperty::BackgroundPosition), Some("left center, right center"));
    }

    #[test]
    fn test_memory_surface_counts_writes() {
        let surface = MemorySurface::new();
        surface.apply(&fade_out_update("red", "0.4s", "2px"));
        surface.apply(&fade_in_update());

        assert_eq!(surface.write_count(), 2);
        let state = surface.snapshot();
        assert_eq!(state.get(StyleProperty::BackgroundColor), Some("red"));
        assert_eq!(state.get(StyleProperty::BackgroundOpacity), Some("1"));
        assert_eq!(surface.history()[0].len(), 4);
    }
}
