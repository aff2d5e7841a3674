use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::Result;

use super::{MediaBackend, MediaResource};

/// Backend whose resources are driven purely by timers: they become ready
/// after a fixed latency and finish after a fixed clip length. Stands in
/// for a real platform media element in the demo application.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    ready_latency: Duration,
    clip_length: Duration,
}

impl SyntheticBackend {
    pub fn new(ready_latency: Duration, clip_length: Duration) -> Self {
        Self {
            ready_latency,
            clip_length,
        }
    }
}

impl MediaBackend for SyntheticBackend {
    fn create(&self, url: &str) -> Box<dyn MediaResource> {
        let (ended_tx, ended_rx) = oneshot::channel();
        Box::new(SyntheticResource {
            url: url.to_string(),
            ready_latency: self.ready_latency,
            clip_length: self.clip_length,
            ended_tx: Some(ended_tx),
            ended_rx: Some(ended_rx),
            clip_timer: None,
        })
    }
}

struct SyntheticResource {
    url: String,
    ready_latency: Duration,
    clip_length: Duration,
    ended_tx: Option<oneshot::Sender<()>>,
    ended_rx: Option<oneshot::Receiver<()>>,
    clip_timer: Option<JoinHandle<()>>,
}

#[async_trait]
impl MediaResource for SyntheticResource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn wait_ready(&mut self) -> Result<()> {
        tokio::time::sleep(self.ready_latency).await;
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        if let Some(ended_tx) = self.ended_tx.take() {
            let clip_length = self.clip_length;
            self.clip_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(clip_length).await;
                let _ = ended_tx.send(());
            }));
        }
        Ok(())
    }

    fn pause(&mut self) {
        // Aborting the clip timer drops the ended sender unsent, so a
        // paused resource never reports a natural finish.
        if let Some(timer) = self.clip_timer.take() {
            timer.abort();
        }
    }

    fn detach(&mut self) {
        self.pause();
        self.ended_tx = None;
    }

    fn subscribe_ended(&mut self) -> oneshot::Receiver<()> {
        self.ended_rx.take().unwrap_or_else(|| {
            let (_sender, receiver) = oneshot::channel();
            receiver
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::AudioSession;
    use crate::config::AnalyserConfig;
    use crate::graph::AudioGraphManager;

    #[tokio::test(start_paused = true)]
    async fn clip_finishes_after_its_length() {
        let backend = Arc::new(SyntheticBackend::new(
            Duration::from_millis(20),
            Duration::from_millis(500),
        ));
        let graph = Arc::new(AudioGraphManager::new(&AnalyserConfig::default()));
        let session = AudioSession::new(graph, backend);

        session.start("clip.wav").await.unwrap();
        assert!(session.is_active().unwrap());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!session.is_active().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_clip_never_reports_a_finish() {
        let backend = Arc::new(SyntheticBackend::new(
            Duration::from_millis(20),
            Duration::from_millis(500),
        ));
        let graph = Arc::new(AudioGraphManager::new(&AnalyserConfig::default()));
        let session = AudioSession::new(graph, backend);

        let fired = Arc::new(std::sync::atomic::AtomicU32::new(0));
        session.on_ended({
            let fired = Arc::clone(&fired);
            move || {
                fired.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        });

        session.start("clip.wav").await.unwrap();
        session.stop().unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
