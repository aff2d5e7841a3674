use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::task::JoinHandle;

use crate::{
    audio::AudioSession,
    content::{ContentFetcher, CONTENT_ERROR_PLACEHOLDER},
    graph::AudioGraphManager,
    page::{Direction, Page, PageSet},
    render::{DisplaySurface, VisualRenderer},
    CarouselError, CarouselConfig, Result,
};

/// Translates discrete navigation events into a settled target page and
/// drives one orchestration sequence per accepted event.
///
/// Input gating is a debounce: the first gesture in a burst wins, further
/// input is ignored until the window elapses. Orchestration sequences run
/// concurrently with the debounce window and with each other; each carries
/// a monotonically increasing sequence number, and display-mutating steps
/// only write while they still hold the latest number. The audio step
/// additionally relies on [`AudioSession`]'s own last-call-wins
/// serialization, so two overlapping sequences can never leave two live
/// audio sessions behind.
///
/// Cloning is cheap; clones share the same navigation state.
#[derive(Clone)]
pub struct CarouselController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    pages: PageSet,
    config: CarouselConfig,
    graph: Arc<AudioGraphManager>,
    session: AudioSession,
    fetcher: Arc<dyn ContentFetcher>,
    display: Arc<dyn DisplaySurface>,
    renderer: Arc<dyn VisualRenderer>,
    nav: Mutex<NavState>,
    latest_seq: AtomicU64,
}

struct NavState {
    current_index: usize,
    debounce_active: bool,
    debounce_timer: Option<JoinHandle<()>>,
}

impl CarouselController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pages: PageSet,
        config: CarouselConfig,
        graph: Arc<AudioGraphManager>,
        session: AudioSession,
        fetcher: Arc<dyn ContentFetcher>,
        display: Arc<dyn DisplaySurface>,
        renderer: Arc<dyn VisualRenderer>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                pages,
                config,
                graph,
                session,
                fetcher,
                display,
                renderer,
                nav: Mutex::new(NavState {
                    current_index: 0,
                    debounce_active: false,
                    debounce_timer: None,
                }),
                latest_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Accepts or ignores one navigation gesture. Returns whether the input
    /// was accepted; input arriving inside the debounce window is dropped
    /// without touching the index. Never fails from the caller's view, even
    /// when the orchestration it launches runs into trouble.
    pub fn navigate(&self, direction: Direction) -> bool {
        let inner = &self.inner;
        let page = {
            let mut nav = match inner.lock_nav() {
                Ok(nav) => nav,
                Err(err) => {
                    tracing::error!(%err, "navigation state unavailable");
                    return false;
                }
            };
            if nav.debounce_active {
                tracing::trace!(?direction, "navigation ignored inside debounce window");
                return false;
            }
            nav.debounce_active = true;
            nav.current_index = inner.pages.step(nav.current_index, direction);

            // Explicit timer handle: replaced on every accepted navigation,
            // never merely flagged.
            if let Some(timer) = nav.debounce_timer.take() {
                timer.abort();
            }
            let debouncer = Arc::clone(inner);
            nav.debounce_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(debouncer.config.debounce()).await;
                debouncer.clear_debounce();
            }));

            match inner.pages.get(nav.current_index) {
                Some(page) => page.clone(),
                None => return false,
            }
        };

        let seq = inner.latest_seq.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(?direction, page = %page.id, seq, "navigation accepted");

        let sequence = Arc::clone(inner);
        tokio::spawn(async move {
            ControllerInner::run_transition(sequence, seq, page).await;
        });
        true
    }

    /// Renders page 0 at startup without touching audio; playback stays
    /// deferred until the first navigation resumes the playback context.
    pub async fn show_initial(&self) -> Result<()> {
        let inner = &self.inner;
        let page = {
            let nav = inner.lock_nav()?;
            inner
                .pages
                .get(nav.current_index)
                .cloned()
                .ok_or_else(|| CarouselError::msg("current index out of range"))?
        };

        inner.display.show_image(&page.image, &page.alt);
        let content = inner.resolve_content(&page).await;
        inner.display.install_content(&content);
        tracing::info!(page = %page.id, "initial page displayed, audio deferred until first gesture");
        Ok(())
    }

    /// Registers the callback fired when the current clip finishes
    /// naturally. Delegates to the audio session.
    pub fn on_session_ended(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner.session.on_ended(callback);
    }

    pub fn current_index(&self) -> Result<usize> {
        Ok(self.inner.lock_nav()?.current_index)
    }

    /// Whether a navigation has been accepted and its debounce window has
    /// not yet elapsed.
    pub fn navigation_pending(&self) -> Result<bool> {
        Ok(self.inner.lock_nav()?.debounce_active)
    }

    pub fn session(&self) -> &AudioSession {
        &self.inner.session
    }
}

impl ControllerInner {
    fn lock_nav(&self) -> Result<MutexGuard<'_, NavState>> {
        self.nav
            .lock()
            .map_err(|_| CarouselError::msg("navigation state has been poisoned"))
    }

    fn clear_debounce(&self) {
        if let Ok(mut nav) = self.nav.lock() {
            nav.debounce_active = false;
            nav.debounce_timer = None;
            tracing::trace!("debounce window elapsed");
        }
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.latest_seq.load(Ordering::Relaxed) == seq
    }

    async fn resolve_content(&self, page: &Page) -> String {
        match &page.content_url {
            Some(url) => match self.fetcher.fetch(url).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(url, %err, "content fetch failed, installing placeholder");
                    CONTENT_ERROR_PLACEHOLDER.to_string()
                }
            },
            None => String::new(),
        }
    }

    /// One orchestration sequence: fade out, swap assets, fetch content,
    /// fade in, restart audio, restart the visualiser. Display writes are
    /// skipped once a newer sequence exists; every failure is contained
    /// here and never reaches the caller of `navigate`.
    async fn run_transition(self: Arc<Self>, seq: u64, page: Page) {
        self.display.begin_transition();
        tokio::time::sleep(self.config.swap_delay()).await;

        if self.is_latest(seq) {
            self.display.show_image(&page.image, &page.alt);
        }

        let content = self.resolve_content(&page).await;
        if self.is_latest(seq) {
            self.display.install_content(&content);
        }
        self.display.end_transition();

        if !self.is_latest(seq) {
            tracing::debug!(page = %page.id, seq, "sequence superseded before the audio step");
            return;
        }

        if let Err(err) = self.graph.ensure_running().await {
            tracing::warn!(%err, "could not resume playback context");
            self.renderer.stop();
            return;
        }

        if let Err(err) = self.session.stop() {
            tracing::warn!(%err, "failed to stop previous audio session");
        }
        match self.session.start(&page.audio_url).await {
            Ok(handle) => {
                self.renderer.bind_analyser(self.graph.analyser());
                self.renderer.start();
                tracing::info!(page = %page.id, source = %handle.source, "transition complete");
            }
            Err(err) => {
                tracing::warn!(page = %page.id, %err, "audio start failed, visualiser stopped");
                self.renderer.stop();
            }
        }
    }
}

impl std::fmt::Debug for CarouselController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarouselController")
            .field("pages", &self.inner.pages.len())
            .finish()
    }
}
