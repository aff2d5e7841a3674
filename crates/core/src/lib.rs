//! Core library for the audio-reactive carousel.
//!
//! The crate owns the session lifecycle of the carousel: [`AudioSession`]
//! guarantees that exactly one audio resource is ever live and connected to
//! the shared [`AnalyserNode`], and [`CarouselController`] debounces
//! navigation input and drives one orchestration sequence per accepted
//! gesture. Presentation-only collaborators (the display surface, the
//! decorative renderer, and the content transport) sit behind traits so
//! hosts can bring their own.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod content;
pub mod controller;
pub mod error;
pub mod graph;
pub mod page;
pub mod render;

pub use analysis::{AnalyserNode, SourceId};
pub use audio::{AudioSession, MediaBackend, MediaResource, SessionHandle, SyntheticBackend};
pub use config::{AnalyserConfig, AppConfig, CarouselConfig};
pub use content::{ContentFetcher, FsContentFetcher, CONTENT_ERROR_PLACEHOLDER};
pub use controller::CarouselController;
pub use error::{CarouselError, Result};
pub use graph::{AudioGraphManager, ContextState, GestureGatedContext, PlaybackContext};
pub use page::{Direction, Page, PageSet};
pub use render::{ConsoleDisplay, ConsoleRenderer, DisplaySurface, NullRenderer, VisualRenderer};
