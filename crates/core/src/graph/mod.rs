use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use crate::{analysis::AnalyserNode, config::AnalyserConfig, Result};

/// State of the platform playback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Playback is disallowed until the context has been resumed, typically
    /// from a user gesture.
    Suspended,
    Running,
}

/// Platform primitive that gates playback. `resume` must be idempotent when
/// the context is already running.
#[async_trait]
pub trait PlaybackContext: Send + Sync {
    fn state(&self) -> ContextState;
    async fn resume(&self) -> Result<()>;
}

/// Default context implementation: starts suspended and unlocks on the
/// first resume, which the application triggers from the first navigation.
#[derive(Debug, Default)]
pub struct GestureGatedContext {
    state: Mutex<ContextState>,
    resumes: AtomicU32,
}

impl GestureGatedContext {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ContextState::Suspended),
            resumes: AtomicU32::new(0),
        }
    }

    /// Number of resume calls observed so far.
    pub fn resume_count(&self) -> u32 {
        self.resumes.load(Ordering::Relaxed)
    }
}

impl Default for ContextState {
    fn default() -> Self {
        ContextState::Suspended
    }
}

#[async_trait]
impl PlaybackContext for GestureGatedContext {
    fn state(&self) -> ContextState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(ContextState::Suspended)
    }

    async fn resume(&self) -> Result<()> {
        self.resumes.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut state) = self.state.lock() {
            *state = ContextState::Running;
        }
        Ok(())
    }
}

/// Owner of the process-wide audio singletons: the playback context and the
/// shared analyser node.
///
/// Single-writer rule: [`crate::AudioSession`] is the only component that
/// connects and disconnects analyser sources; everything else only reads.
pub struct AudioGraphManager {
    context: Arc<dyn PlaybackContext>,
    analyser: Arc<AnalyserNode>,
}

impl AudioGraphManager {
    /// Creates a manager with the default gesture-gated context.
    pub fn new(config: &AnalyserConfig) -> Self {
        Self::with_context(Arc::new(GestureGatedContext::new()), config)
    }

    /// Creates a manager around an externally provided playback context.
    pub fn with_context(context: Arc<dyn PlaybackContext>, config: &AnalyserConfig) -> Self {
        Self {
            context,
            analyser: Arc::new(AnalyserNode::new(config)),
        }
    }

    pub fn analyser(&self) -> Arc<AnalyserNode> {
        Arc::clone(&self.analyser)
    }

    pub fn context_state(&self) -> ContextState {
        self.context.state()
    }

    /// Resumes the playback context if it is suspended and awaits the resume
    /// before returning. No-op when already running.
    pub async fn ensure_running(&self) -> Result<()> {
        if self.context.state() == ContextState::Suspended {
            self.context.resume().await?;
            tracing::debug!("playback context resumed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for AudioGraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraphManager")
            .field("context_state", &self.context.state())
            .finish()
    }
}
