use crate::segment::{padded_range, EventWindow};

/// Samples of context on each side of an event used for validation.
pub const DEFAULT_CONTEXT: usize = 300;

/// Thresholds applied by the [`Validator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorConfig {
    /// Windows whose peak magnitude is below this are noise. Default: 1000.
    pub noise_floor: u64,
    /// Windows whose peak magnitude is above this are ADC glitches.
    ///
    /// Default: 4,000,000,000. Raw 32-bit samples stay below it, but a
    /// rail-to-rail swing can exceed it once the baseline is removed.
    pub ceiling: u64,
    /// A sample is active when its magnitude exceeds this fraction of the
    /// peak. Default: 0.2.
    pub activity_ratio: f64,
    /// More than this fraction of the window must be active. Default: 0.02.
    pub min_active_fraction: f64,
    /// Context added on each side of an event before validating. Default: 300.
    pub context: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            noise_floor: 1000,
            ceiling: 4_000_000_000,
            activity_ratio: 0.2,
            min_active_fraction: 0.02,
            context: DEFAULT_CONTEXT,
        }
    }
}

/// Why a window was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("window is empty")]
    Empty,

    #[error("too quiet (peak {peak})")]
    TooQuiet { peak: u64 },

    #[error("too loud (peak {peak})")]
    TooLoud { peak: u64 },

    /// Too few active samples: a single spike rather than an event.
    #[error("needle spike ({active} active samples, needs more than {required:.1})")]
    Needle { active: usize, required: f64 },
}

/// Largest sample magnitude in `window`, 0 when empty.
pub fn peak_abs(window: &[i64]) -> u64 {
    window
        .iter()
        .map(|sample| sample.unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// Rejects noise, glitches and needle spikes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a window of samples.
    ///
    /// Stops scanning as soon as enough active samples have been seen.
    pub fn check(&self, window: &[i64]) -> Result<(), Rejection> {
        if window.is_empty() {
            return Err(Rejection::Empty);
        }

        let peak = peak_abs(window);
        if peak < self.config.noise_floor {
            return Err(Rejection::TooQuiet { peak });
        }
        if peak > self.config.ceiling {
            return Err(Rejection::TooLoud { peak });
        }

        let activity_level = peak as f64 * self.config.activity_ratio;
        let required = window.len() as f64 * self.config.min_active_fraction;
        let mut active = 0usize;
        for sample in window {
            if sample.unsigned_abs() as f64 > activity_level {
                active += 1;
                if active as f64 > required {
                    return Ok(());
                }
            }
        }

        Err(Rejection::Needle { active, required })
    }

    /// Validate `event` padded with the configured context, clipped to
    /// `samples`.
    pub fn check_event(&self, samples: &[i64], event: EventWindow) -> Result<(), Rejection> {
        let range = padded_range(event, self.config.context, samples.len());
        self.check(&samples[range])
    }

    pub fn is_valid(&self, window: &[i64]) -> bool {
        self.check(window).is_ok()
    }
}

/// Validate a window with the default thresholds.
pub fn is_valid(window: &[i64]) -> bool {
    Validator::default().is_valid(window)
}
