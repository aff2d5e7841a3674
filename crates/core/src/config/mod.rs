use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub carousel: CarouselConfig,
    pub analyser: AnalyserConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            carousel: CarouselConfig::default(),
            analyser: AnalyserConfig::default(),
        }
    }
}

/// Timing knobs for the navigation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarouselConfig {
    /// Window after an accepted navigation during which further input is
    /// ignored, in milliseconds.
    pub debounce_ms: u64,
    /// Presentation delay between the fade-out hook and the asset swap,
    /// in milliseconds.
    pub swap_delay_ms: u64,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 800,
            swap_delay_ms: 300,
        }
    }
}

impl CarouselConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn swap_delay(&self) -> Duration {
        Duration::from_millis(self.swap_delay_ms)
    }
}

/// Configuration for the shared analyser stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyserConfig {
    /// Block size for spectrum analysis. Must be a power of two.
    pub fft_size: usize,
    /// Exponential smoothing factor applied to bin magnitudes between
    /// blocks, in [0, 1). Higher values favour the previous spectrum.
    pub smoothing_time_constant: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
        }
    }
}
