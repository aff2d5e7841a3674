use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use crate::{analysis::SourceId, graph::AudioGraphManager, CarouselError, Result};

mod synthetic;

pub use synthetic::SyntheticBackend;

/// One playable audio resource, owned by the session for the duration of a
/// handle's life.
///
/// `subscribe_ended` hands out a receiver that fires only when playback
/// finishes naturally. Implementations must make sure the sender is dropped
/// unsent when the resource is torn down programmatically, so a stopped
/// session never looks like a finished one.
#[async_trait]
pub trait MediaResource: Send {
    fn url(&self) -> &str;

    /// Resolves once the resource is ready to play, or fails with
    /// [`CarouselError::Load`] if it errors before becoming ready.
    async fn wait_ready(&mut self) -> Result<()>;

    /// Begins playback. Fails with [`CarouselError::PlaybackPermission`]
    /// when the platform refuses, typically for lack of a user gesture.
    async fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Releases the resource's content reference. Safe to call at any point
    /// in the lifecycle, including before the resource became ready.
    fn detach(&mut self);

    fn subscribe_ended(&mut self) -> oneshot::Receiver<()>;
}

/// Factory for media resources, one per `start` call.
pub trait MediaBackend: Send + Sync {
    fn create(&self, url: &str) -> Box<dyn MediaResource>;
}

/// Snapshot describing the currently active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub url: String,
    pub source: SourceId,
}

type EndedCallback = Box<dyn Fn() + Send + Sync>;

/// Manager of the single active audio session.
///
/// At most one resource is live and connected to the analyser at any time.
/// Overlapping `start` calls are serialized through an internal epoch: every
/// `start` and `stop` bumps it, and an in-flight `start` that observes a
/// newer epoch releases everything it allocated and returns
/// [`CarouselError::Superseded`]. The last call always wins.
///
/// Cloning is cheap; clones share the same session state.
#[derive(Clone)]
pub struct AudioSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    graph: Arc<AudioGraphManager>,
    backend: Arc<dyn MediaBackend>,
    state: Mutex<SessionState>,
    ended_callback: Mutex<Option<EndedCallback>>,
    next_source: AtomicU64,
}

#[derive(Default)]
struct SessionState {
    epoch: u64,
    /// Cancel signal for a `start` currently awaiting ready or playback.
    pending: Option<Arc<Notify>>,
    current: Option<ActiveSession>,
}

struct ActiveSession {
    handle: SessionHandle,
    resource: Box<dyn MediaResource>,
}

impl AudioSession {
    pub fn new(graph: Arc<AudioGraphManager>, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                graph,
                backend,
                state: Mutex::new(SessionState::default()),
                ended_callback: Mutex::new(None),
                next_source: AtomicU64::new(0),
            }),
        }
    }

    pub fn graph(&self) -> Arc<AudioGraphManager> {
        Arc::clone(&self.inner.graph)
    }

    /// Stops any current session, then loads and plays `url`.
    ///
    /// On success exactly one resource is active and connected to the
    /// analyser. On failure at any step everything this call allocated has
    /// been released, and the previous session remains stopped.
    pub async fn start(&self, url: &str) -> Result<SessionHandle> {
        let inner = &self.inner;
        inner.graph.ensure_running().await?;

        // Supersede any in-flight start and claim the current handle. The
        // previous session is torn down completely before anything new is
        // allocated.
        let (cancel, epoch, previous) = {
            let mut state = inner.lock_state()?;
            state.epoch += 1;
            if let Some(pending) = state.pending.take() {
                pending.notify_one();
            }
            let cancel = Arc::new(Notify::new());
            state.pending = Some(Arc::clone(&cancel));
            (cancel, state.epoch, state.current.take())
        };
        if let Some(previous) = previous {
            inner.release(previous);
        }

        let mut resource = inner.backend.create(url);
        tracing::debug!(url, "media resource allocated");

        let ready = tokio::select! {
            ready = resource.wait_ready() => Some(ready),
            _ = cancel.notified() => None,
        };
        match ready {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                resource.detach();
                inner.clear_pending(epoch)?;
                return Err(err);
            }
            None => {
                resource.detach();
                return Err(CarouselError::Superseded(url.to_string()));
            }
        }
        if !inner.is_current(epoch)? {
            resource.detach();
            return Err(CarouselError::Superseded(url.to_string()));
        }

        let source = SourceId::new(inner.next_source.fetch_add(1, Ordering::Relaxed) + 1);
        inner.graph.analyser().connect_source(source)?;

        let played = tokio::select! {
            played = resource.play() => Some(played),
            _ = cancel.notified() => None,
        };
        match played {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                let _ = inner.graph.analyser().disconnect_source(source);
                resource.detach();
                inner.clear_pending(epoch)?;
                return Err(err);
            }
            None => {
                let _ = inner.graph.analyser().disconnect_source(source);
                resource.detach();
                return Err(CarouselError::Superseded(url.to_string()));
            }
        }

        let ended = resource.subscribe_ended();
        let handle = SessionHandle {
            url: url.to_string(),
            source,
        };

        {
            let mut state = inner.lock_state()?;
            if state.epoch != epoch {
                drop(state);
                let _ = inner.graph.analyser().disconnect_source(source);
                resource.pause();
                resource.detach();
                return Err(CarouselError::Superseded(url.to_string()));
            }
            state.pending = None;
            state.current = Some(ActiveSession {
                handle: handle.clone(),
                resource,
            });
        }

        let watcher = Arc::clone(inner);
        tokio::spawn(async move {
            if ended.await.is_ok() {
                watcher.finish_naturally(source);
            }
        });

        tracing::info!(url, %source, "audio session started");
        Ok(handle)
    }

    /// Stops the current session, releasing its resource and its analyser
    /// connection, and cancels any `start` still in flight. Idempotent;
    /// a no-op when nothing is active.
    pub fn stop(&self) -> Result<()> {
        let previous = {
            let mut state = self.inner.lock_state()?;
            state.epoch += 1;
            if let Some(pending) = state.pending.take() {
                pending.notify_one();
            }
            state.current.take()
        };
        if let Some(previous) = previous {
            self.inner.release(previous);
        }
        Ok(())
    }

    /// Registers the callback invoked when the current clip finishes
    /// playing naturally. Re-registration replaces the previous callback.
    /// Programmatic `stop` never triggers it.
    pub fn on_ended(&self, callback: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.inner.ended_callback.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    /// Snapshot of the currently active session, if any.
    pub fn current(&self) -> Result<Option<SessionHandle>> {
        let state = self.inner.lock_state()?;
        Ok(state.current.as_ref().map(|active| active.handle.clone()))
    }

    pub fn is_active(&self) -> Result<bool> {
        Ok(self.current()?.is_some())
    }
}

impl SessionInner {
    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state
            .lock()
            .map_err(|_| CarouselError::msg("audio session state has been poisoned"))
    }

    fn is_current(&self, epoch: u64) -> Result<bool> {
        Ok(self.lock_state()?.epoch == epoch)
    }

    /// Drops the pending cancel signal if it still belongs to the `start`
    /// call identified by `epoch`.
    fn clear_pending(&self, epoch: u64) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.epoch == epoch {
            state.pending = None;
        }
        Ok(())
    }

    /// Full teardown of a previously active session: pause, sever the
    /// analyser connection, detach the content reference, drop.
    fn release(&self, mut active: ActiveSession) {
        active.resource.pause();
        let _ = self.graph.analyser().disconnect_source(active.handle.source);
        active.resource.detach();
        tracing::debug!(url = %active.handle.url, source = %active.handle.source, "audio session released");
    }

    /// Invoked by the ended watcher when a clip finishes on its own. Only
    /// acts if the finished source is still the current one, so a watcher
    /// outliving its session cannot disturb a newer one.
    fn finish_naturally(&self, source: SourceId) {
        let finished = match self.lock_state() {
            Ok(mut state) => match &state.current {
                Some(active) if active.handle.source == source => state.current.take(),
                _ => None,
            },
            Err(_) => None,
        };
        let Some(active) = finished else {
            return;
        };

        let _ = self.graph.analyser().disconnect_source(source);
        tracing::info!(url = %active.handle.url, %source, "audio playback ended");
        drop(active);

        if let Ok(slot) = self.ended_callback.lock() {
            if let Some(callback) = slot.as_ref() {
                callback();
            }
        }
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession").finish()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::testing::{FakeBackend, MediaScript};
    use super::*;
    use crate::config::AnalyserConfig;
    use crate::graph::ContextState;

    fn session_with(backend: Arc<FakeBackend>) -> AudioSession {
        let graph = Arc::new(AudioGraphManager::new(&AnalyserConfig::default()));
        AudioSession::new(graph, backend)
    }

    #[tokio::test]
    async fn start_connects_plays_and_resumes_the_context() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        let handle = session.start("a.wav").await.unwrap();

        assert!(session.is_active().unwrap());
        assert_eq!(
            session.graph().analyser().upstream().unwrap(),
            Some(handle.source)
        );
        assert_eq!(session.graph().context_state(), ContextState::Running);
        assert_eq!(
            backend.events(),
            vec!["create a.wav", "ready a.wav", "play a.wav"]
        );
    }

    #[tokio::test]
    async fn replacing_a_session_tears_the_previous_one_down_first() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        let a = session.start("a.wav").await.unwrap();
        let b = session.start("b.wav").await.unwrap();

        assert_ne!(a.source, b.source);
        assert_eq!(session.graph().analyser().upstream().unwrap(), Some(b.source));
        assert_eq!(
            backend.events(),
            vec![
                "create a.wav",
                "ready a.wav",
                "play a.wav",
                "pause a.wav",
                "detach a.wav",
                "create b.wav",
                "ready b.wav",
                "play b.wav",
            ]
        );
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_safe_without_a_session() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        session.stop().unwrap();
        assert!(backend.events().is_empty());

        session.start("a.wav").await.unwrap();
        session.stop().unwrap();
        session.stop().unwrap();

        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
        let teardowns = backend
            .events()
            .iter()
            .filter(|event| event.starts_with("pause"))
            .count();
        assert_eq!(teardowns, 1);
    }

    #[tokio::test]
    async fn load_failure_releases_everything_and_leaves_no_session() {
        let backend = FakeBackend::new();
        backend.push_script(MediaScript::FailLoad);
        let session = session_with(Arc::clone(&backend));

        let err = session.start("a.wav").await.unwrap_err();

        assert!(matches!(err, CarouselError::Load { .. }));
        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
        assert_eq!(backend.events(), vec!["create a.wav", "detach a.wav"]);
    }

    #[tokio::test]
    async fn failed_start_does_not_restore_the_previous_session() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        session.start("a.wav").await.unwrap();
        backend.push_script(MediaScript::FailLoad);
        let err = session.start("b.wav").await.unwrap_err();

        assert!(matches!(err, CarouselError::Load { .. }));
        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
    }

    #[tokio::test]
    async fn playback_rejection_disconnects_the_partial_session() {
        let backend = FakeBackend::new();
        backend.push_script(MediaScript::FailPlay);
        let session = session_with(Arc::clone(&backend));

        let err = session.start("a.wav").await.unwrap_err();

        assert!(matches!(err, CarouselError::PlaybackPermission { .. }));
        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
        assert_eq!(
            backend.events(),
            vec!["create a.wav", "ready a.wav", "detach a.wav"]
        );
    }

    #[tokio::test]
    async fn stop_cancels_a_start_that_never_becomes_ready() {
        let backend = FakeBackend::new();
        backend.push_script(MediaScript::NeverReady);
        let session = session_with(Arc::clone(&backend));

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.start("slow.wav").await }
        });
        tokio::task::yield_now().await;

        session.stop().unwrap();
        let result = pending.await.unwrap();

        assert!(matches!(result, Err(CarouselError::Superseded(_))));
        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
        assert_eq!(backend.events(), vec!["create slow.wav", "detach slow.wav"]);
    }

    #[tokio::test]
    async fn a_newer_start_supersedes_one_still_waiting_for_ready() {
        let backend = FakeBackend::new();
        backend.push_script(MediaScript::NeverReady);
        let session = session_with(Arc::clone(&backend));

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.start("a.wav").await }
        });
        tokio::task::yield_now().await;

        let b = session.start("b.wav").await.unwrap();
        let result = pending.await.unwrap();

        assert!(matches!(result, Err(CarouselError::Superseded(_))));
        assert_eq!(session.graph().analyser().upstream().unwrap(), Some(b.source));
        assert_eq!(session.current().unwrap().unwrap().url, "b.wav");
    }

    #[tokio::test]
    async fn natural_end_fires_the_callback_once_and_clears_the_session() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        let fired = Arc::new(AtomicU32::new(0));
        session.on_ended({
            let fired = Arc::clone(&fired);
            move || {
                fired.fetch_add(1, Ordering::Relaxed);
            }
        });

        session.start("a.wav").await.unwrap();
        backend.trigger_ended("a.wav");
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::Relaxed), 1);
        assert!(!session.is_active().unwrap());
        assert_eq!(session.graph().analyser().upstream().unwrap(), None);
    }

    #[tokio::test]
    async fn programmatic_stop_never_fires_the_ended_callback() {
        let backend = FakeBackend::new();
        let session = session_with(Arc::clone(&backend));

        let fired = Arc::new(AtomicU32::new(0));
        session.on_ended({
            let fired = Arc::clone(&fired);
            move || {
                fired.fetch_add(1, Ordering::Relaxed);
            }
        });

        session.start("a.wav").await.unwrap();
        session.stop().unwrap();
        backend.trigger_ended("a.wav");
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::Relaxed), 0);
    }
}
