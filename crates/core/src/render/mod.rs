use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::analysis::AnalyserNode;

/// Where the carousel presents itself: image, content fragment, and the
/// fade hooks around an asset swap. The controller is the only writer.
pub trait DisplaySurface: Send + Sync {
    fn begin_transition(&self);
    fn end_transition(&self);
    fn show_image(&self, image: &str, alt: &str);
    fn install_content(&self, html: &str);
}

/// Decorative renderer reading from the shared analyser. Stateless with
/// respect to the controller beyond these calls.
pub trait VisualRenderer: Send + Sync {
    fn bind_analyser(&self, analyser: Arc<AnalyserNode>);
    fn start(&self);
    fn stop(&self);
}

/// Renderer that ignores every signal, for headless use.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl VisualRenderer for NullRenderer {
    fn bind_analyser(&self, _analyser: Arc<AnalyserNode>) {}
    fn start(&self) {}
    fn stop(&self) {}
}

/// Display surface that narrates every write through tracing. Used by the
/// command line demo in place of a real UI.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl DisplaySurface for ConsoleDisplay {
    fn begin_transition(&self) {
        tracing::info!("display fading out");
    }

    fn end_transition(&self) {
        tracing::info!("display fading in");
    }

    fn show_image(&self, image: &str, alt: &str) {
        tracing::info!(image, alt, "image swapped");
    }

    fn install_content(&self, html: &str) {
        tracing::info!(bytes = html.len(), "content installed");
    }
}

/// Tracing-backed renderer for the demo. Reports the analyser spectrum
/// width when started so the wiring is visible in the logs.
#[derive(Default)]
pub struct ConsoleRenderer {
    analyser: Mutex<Option<Arc<AnalyserNode>>>,
    running: AtomicBool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl VisualRenderer for ConsoleRenderer {
    fn bind_analyser(&self, analyser: Arc<AnalyserNode>) {
        if let Ok(mut slot) = self.analyser.lock() {
            *slot = Some(analyser);
        }
    }

    fn start(&self) {
        self.running.store(true, Ordering::Relaxed);
        let bins = self
            .analyser
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|node| node.fft_size() / 2 + 1));
        tracing::info!(?bins, "visualiser started");
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            tracing::info!("visualiser stopped");
        }
    }
}
