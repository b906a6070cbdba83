use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use termbg_common::{DisplayState, DisplaySurface, StyleProperty};

pub const DEFAULT_SELECTOR: &str = ".terms_terms";

/// Renders display state into a stylesheet the host injects into the
/// window. The file is replaced on every write, never edited in place.
#[derive(Debug)]
pub struct CssFileSurface {
    path: PathBuf,
    selector: String,
    state: Mutex<DisplayState>,
}

impl CssFileSurface {
    pub fn new(path: PathBuf, selector: impl Into<String>) -> Self {
        Self {
            path,
            selector: selector.into(),
            state: Mutex::new(DisplayState::hidden()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self, state: &DisplayState) -> String {
        let mut css = String::new();

        let _ = writeln!(css, "{} {{", self.selector);
        for (property, value) in state.iter() {
            let _ = writeln!(css, "  {}: {};", property, value);
        }
        css.push_str("}\n");

        let _ = write!(
            css,
            "{selector}::before {{\n\
             \x20 content: \"\";\n\
             \x20 background-image: var({image});\n\
             \x20 background-position: var({position});\n\
             \x20 background-size: var({size});\n\
             \x20 background-repeat: no-repeat;\n\
             \x20 transition: opacity var({delay}) ease;\n\
             \x20 opacity: var({opacity});\n\
             \x20 position: absolute;\n\
             \x20 top: 0;\n\
             \x20 left: 0;\n\
             \x20 bottom: 0;\n\
             \x20 right: 0;\n\
             }}\n\
             {selector}::after {{\n\
             \x20 content: \"\";\n\
             \x20 background-color: var({color});\n\
             \x20 backdrop-filter: blur(var({blur}));\n\
             \x20 position: absolute;\n\
             \x20 top: 0;\n\
             \x20 left: 0;\n\
             \x20 bottom: 0;\n\
             \x20 right: 0;\n\
             \x20 pointer-events: none;\n\
             }}\n",
            selector = self.selector,
            image = StyleProperty::BackgroundImage,
            position = StyleProperty::BackgroundPosition,
            size = StyleProperty::BackgroundSize,
            delay = StyleProperty::OpacityDelay,
            opacity = StyleProperty::BackgroundOpacity,
            color = StyleProperty::BackgroundColor,
            blur = StyleProperty::BlurSize,
        );

        css
    }

    fn write_atomically(&self, css: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("css.tmp");
        std::fs::write(&tmp, css)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl DisplaySurface for CssFileSurface {
    fn apply(&self, update: &[(StyleProperty, String)]) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.apply(update);
        let css = self.render(&state);

        if let Err(e) = self.write_atomically(&css) {
            log::error!("Failed to write stylesheet {:?}: {}", self.path, e);
        }
    }
}
