pub mod image_resolver;
pub mod display;
pub mod ipc;
pub mod error;

pub use image_resolver::{
    DimensionProbe, Dimensions, FixedProbe, ImageProbe, ImageResolver, RandomSource, SeededRandom,
    SelectedImages, ThreadRandom,
};
pub use display::{DisplayState, DisplaySurface, MemorySurface, StyleProperty, StyleUpdate};
pub use ipc::{
    BackendMessage, ClientMessage, DaemonStatus, FrontendMessage, IpcClient, IpcCommand,
    IpcResponse, IpcServer, MenuEntry, MenuView,
};
pub use error::{TermbgError, Result, ErrorReporting};
