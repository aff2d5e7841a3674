use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::AnalyserConfig, CarouselError, Result};

/// Identifier for a source node wired into the analyser. Allocated by the
/// audio session, one per media resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Shared signal-analysis stage that downstream visual effects read from.
///
/// Invariant: at most one upstream source is connected at any instant.
/// [`AnalyserNode::connect_source`] severs any prior connection before
/// binding the new one; [`AnalyserNode::disconnect_source`] only severs if
/// the given source is still the upstream, so a stale disconnect from a
/// superseded session cannot knock out the current one.
pub struct AnalyserNode {
    config: AnalyserConfig,
    inner: Mutex<AnalyserInner>,
}

struct AnalyserInner {
    upstream: Option<SourceId>,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    smoothed: Vec<f32>,
}

impl AnalyserNode {
    pub fn new(config: &AnalyserConfig) -> Self {
        Self {
            config: config.clone(),
            inner: Mutex::new(AnalyserInner {
                upstream: None,
                planner: RealFftPlanner::new(),
                fft: None,
                smoothed: Vec::new(),
            }),
        }
    }

    /// Binds `source` as the upstream connection, severing any prior one.
    pub fn connect_source(&self, source: SourceId) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(previous) = inner.upstream.replace(source) {
            tracing::warn!(%previous, %source, "replacing analyser upstream source");
        } else {
            tracing::debug!(%source, "analyser upstream connected");
        }
        Ok(())
    }

    /// Severs the upstream connection if `source` still holds it. Returns
    /// whether a disconnect actually happened.
    pub fn disconnect_source(&self, source: SourceId) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.upstream == Some(source) {
            inner.upstream = None;
            tracing::debug!(%source, "analyser upstream disconnected");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns the currently connected upstream source, if any.
    pub fn upstream(&self) -> Result<Option<SourceId>> {
        Ok(self.lock()?.upstream)
    }

    /// Consumes a block of samples from the connected source and updates the
    /// smoothed magnitude spectrum.
    pub fn process_block(&self, samples: &[f32]) -> Result<()> {
        if samples.len() < 2 {
            return Err(CarouselError::InvalidInput(
                "analysis requires blocks with at least two samples",
            ));
        }

        let len = samples.len();
        let smoothing = self.config.smoothing_time_constant.clamp(0.0, 0.999);
        let mut inner = self.lock()?;
        let fft = inner.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let magnitudes: Vec<f32> = fft.spectrum.iter().map(|bin| bin.norm()).collect();
        if inner.smoothed.len() != magnitudes.len() {
            inner.smoothed = vec![0.0; magnitudes.len()];
        }
        for (slot, magnitude) in inner.smoothed.iter_mut().zip(magnitudes) {
            *slot = smoothing * *slot + (1.0 - smoothing) * magnitude;
        }

        Ok(())
    }

    /// Returns the smoothed magnitude spectrum from the most recent blocks.
    /// Empty until the first block has been processed.
    pub fn frequency_data(&self) -> Result<Vec<f32>> {
        Ok(self.lock()?.smoothed.clone())
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnalyserInner>> {
        self.inner
            .lock()
            .map_err(|_| CarouselError::msg("analyser state has been poisoned"))
    }
}

impl AnalyserInner {
    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        self.fft.as_mut().expect("fft resources must exist")
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for AnalyserNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserNode")
            .field("config", &self.config)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser() -> AnalyserNode {
        AnalyserNode::new(&AnalyserConfig::default())
    }

    #[test]
    fn holds_at_most_one_upstream() {
        let node = analyser();
        let a = SourceId::new(1);
        let b = SourceId::new(2);

        node.connect_source(a).unwrap();
        assert_eq!(node.upstream().unwrap(), Some(a));

        node.connect_source(b).unwrap();
        assert_eq!(node.upstream().unwrap(), Some(b));
    }

    #[test]
    fn stale_disconnect_does_not_sever_current_source() {
        let node = analyser();
        let a = SourceId::new(1);
        let b = SourceId::new(2);

        node.connect_source(a).unwrap();
        node.connect_source(b).unwrap();

        assert!(!node.disconnect_source(a).unwrap());
        assert_eq!(node.upstream().unwrap(), Some(b));

        assert!(node.disconnect_source(b).unwrap());
        assert_eq!(node.upstream().unwrap(), None);
    }

    #[test]
    fn smooths_spectrum_across_blocks() {
        let node = analyser();
        let loud = vec![1.0_f32; 64];

        node.process_block(&loud).unwrap();
        let first = node.frequency_data().unwrap();
        assert_eq!(first.len(), 33);

        node.process_block(&loud).unwrap();
        let second = node.frequency_data().unwrap();

        // With a positive smoothing constant the spectrum converges towards
        // the raw magnitudes instead of jumping straight to them.
        let total_first: f32 = first.iter().sum();
        let total_second: f32 = second.iter().sum();
        assert!(total_first > 0.0);
        assert!(total_second > total_first);
    }

    #[test]
    fn rejects_degenerate_blocks() {
        let node = analyser();
        assert!(node.process_block(&[]).is_err());
        assert!(node.process_block(&[0.5]).is_err());
    }
}
