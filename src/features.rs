//! MFCC-style feature extraction feeding the wake-word scorer.
//!
//! Parameters are grounded in the reference wake-word engine's
//! `wake_feature_config_t`: sample rate, frame size/stride, mel filter
//! count, cepstral coefficient count, pre-emphasis, and optional energy and
//! delta features. Only the extractor lives in this crate — the neural
//! scoring decision itself is an external capability (see [`crate::wakeword`]).

use realfft::RealFftPlanner;
use std::sync::Arc;

/// Feature-extraction configuration. Field names and defaults mirror the
/// reference header's `wake_feature_config_t` / `wake_get_default_feature_config()`.
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub frame_size_ms: u32,
    pub frame_stride_ms: u32,
    pub num_filters: usize,
    pub num_coeffs: usize,
    pub pre_emphasis: f32,
    pub use_energy: bool,
    pub use_deltas: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            sample_rate: 16_000,
            frame_size_ms: 25,
            frame_stride_ms: 10,
            num_filters: 40,
            num_coeffs: 13,
            pre_emphasis: 0.97,
            use_energy: true,
            use_deltas: false,
        }
    }
}

impl FeatureConfig {
    fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_size_ms as u64 / 1000) as usize
    }

    fn stride_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_stride_ms as u64 / 1000) as usize
    }

    /// Output dimension for one analysis frame, before deltas.
    pub fn base_dim(&self) -> usize {
        self.num_coeffs + if self.use_energy { 1 } else { 0 }
    }

    /// Output dimension including deltas, if enabled.
    pub fn output_dim(&self) -> usize {
        if self.use_deltas {
            self.base_dim() * 2
        } else {
            self.base_dim()
        }
    }
}

/// Stateful extractor: owns the FFT plan, mel filterbank, and the previous
/// frame's cepstral vector (needed for delta computation).
pub struct FeatureExtractor {
    config: FeatureConfig,
    fft_size: usize,
    mel_filterbank: Vec<Vec<f32>>, // [filter][fft_bin]
    previous: Option<Vec<f32>>,
    fft: Arc<dyn realfft::RealToComplex<f32>>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let frame_samples = config.frame_samples();
        let fft_size = frame_samples.next_power_of_two();
        let mel_filterbank = build_mel_filterbank(
            config.num_filters,
            fft_size,
            config.sample_rate,
        );
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        FeatureExtractor {
            config,
            fft_size,
            mel_filterbank,
            previous: None,
            fft,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Number of whole analysis frames `samples` contains, given the
    /// configured frame/stride sizes. Used by callers deciding how much
    /// rolling context to keep before calling [`Self::extract`].
    pub fn analysis_frame_count(&self, samples_len: usize) -> usize {
        let frame_samples = self.config.frame_samples();
        if samples_len < frame_samples {
            return 0;
        }
        1 + (samples_len - frame_samples) / self.config.stride_samples()
    }

    /// Extracts one feature vector from exactly one analysis window
    /// (`frame_size_ms` worth of mono samples, already beamformed/mixed).
    pub fn extract(&mut self, window: &[i16]) -> Vec<f32> {
        let frame_samples = self.config.frame_samples();
        let mut buf: Vec<f32> = window.iter().map(|&s| s as f32 / 32768.0).collect();
        buf.resize(frame_samples, 0.0);

        pre_emphasize(&mut buf, self.config.pre_emphasis);
        apply_hamming_window(&mut buf);
        buf.resize(self.fft_size, 0.0);

        let mut spectrum = self.fft.make_output_vec();
        let mut input = buf;
        self.fft
            .process(&mut input, &mut spectrum)
            .expect("fixed-size FFT plan never fails on correctly-sized buffers");

        let power: Vec<f32> = spectrum
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im) / self.fft_size as f32)
            .collect();

        let mel_energies: Vec<f32> = self
            .mel_filterbank
            .iter()
            .map(|filter| {
                let energy: f32 = filter
                    .iter()
                    .zip(power.iter())
                    .map(|(w, p)| w * p)
                    .sum();
                energy.max(1e-10).ln()
            })
            .collect();

        let mut cepstrum = dct2(&mel_energies, self.config.num_coeffs);

        if self.config.use_energy {
            let frame_energy = crate::energy::energy_db(window) / 100.0; // loosely normalized
            cepstrum.push(frame_energy);
        }

        let features = if self.config.use_deltas {
            let delta = match &self.previous {
                Some(prev) => cepstrum
                    .iter()
                    .zip(prev.iter())
                    .map(|(cur, prev)| cur - prev)
                    .collect(),
                None => vec![0.0; cepstrum.len()],
            };
            let mut combined = cepstrum.clone();
            combined.extend(delta);
            combined
        } else {
            cepstrum.clone()
        };

        self.previous = Some(cepstrum);
        features
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

fn pre_emphasize(samples: &mut [f32], coeff: f32) {
    for i in (1..samples.len()).rev() {
        samples[i] -= coeff * samples[i - 1];
    }
}

fn apply_hamming_window(samples: &mut [f32]) {
    let n = samples.len();
    if n <= 1 {
        return;
    }
    for (i, s) in samples.iter_mut().enumerate() {
        let w = 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos();
        *s *= w;
    }
}

/// Triangular mel filterbank spanning 0 Hz to Nyquist.
fn build_mel_filterbank(num_filters: usize, fft_size: usize, sample_rate: u32) -> Vec<Vec<f32>> {
    let num_bins = fft_size / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let mel_points: Vec<f32> = (0..=num_filters + 1)
        .map(|i| mel_max * i as f32 / (num_filters + 1) as f32)
        .collect();
    let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();
    let bin_points: Vec<usize> = hz_points
        .iter()
        .map(|&hz| ((fft_size as f32 + 1.0) * hz / sample_rate as f32).floor() as usize)
        .map(|b| b.min(num_bins - 1))
        .collect();

    let mut filters = vec![vec![0.0f32; num_bins]; num_filters];
    for m in 1..=num_filters {
        let (left, center, right) = (bin_points[m - 1], bin_points[m], bin_points[m + 1]);
        for bin in left..center.max(left) {
            if center > left {
                filters[m - 1][bin] = (bin - left) as f32 / (center - left) as f32;
            }
        }
        for bin in center..right.max(center) {
            if right > center {
                filters[m - 1][bin] = (right - bin) as f32 / (right - center) as f32;
            }
        }
    }
    filters
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Type-II DCT, keeping the first `num_coeffs` outputs (standard MFCC step).
fn dct2(input: &[f32], num_coeffs: usize) -> Vec<f32> {
    let n = input.len();
    (0..num_coeffs)
        .map(|k| {
            let mut sum = 0.0f32;
            for (i, &x) in input.iter().enumerate() {
                sum += x * (std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n as f32)).cos();
            }
            sum
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dim_matches_config() {
        let cfg = FeatureConfig::default();
        assert_eq!(cfg.output_dim(), 14); // 13 coeffs + energy
    }

    #[test]
    fn output_dim_doubles_with_deltas() {
        let mut cfg = FeatureConfig::default();
        cfg.use_deltas = true;
        assert_eq!(cfg.output_dim(), 28);
    }

    #[test]
    fn extract_produces_expected_length() {
        let cfg = FeatureConfig::default();
        let frame_samples = cfg.sample_rate as usize * cfg.frame_size_ms as usize / 1000;
        let dim = cfg.output_dim();
        let mut extractor = FeatureExtractor::new(cfg);
        let window: Vec<i16> = (0..frame_samples)
            .map(|i| ((i as f32 * 0.1).sin() * 10000.0) as i16)
            .collect();
        let features = extractor.extract(&window);
        assert_eq!(features.len(), dim);
        assert!(features.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn silence_produces_finite_features() {
        let cfg = FeatureConfig::default();
        let frame_samples = cfg.sample_rate as usize * cfg.frame_size_ms as usize / 1000;
        let mut extractor = FeatureExtractor::new(cfg);
        let window = vec![0i16; frame_samples];
        let features = extractor.extract(&window);
        assert!(features.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn analysis_frame_count_accounts_for_stride() {
        let cfg = FeatureConfig::default();
        let extractor = FeatureExtractor::new(cfg.clone());
        let frame_samples = cfg.sample_rate as usize * cfg.frame_size_ms as usize / 1000;
        let stride_samples = cfg.sample_rate as usize * cfg.frame_stride_ms as usize / 1000;
        assert_eq!(extractor.analysis_frame_count(frame_samples), 1);
        assert_eq!(
            extractor.analysis_frame_count(frame_samples + stride_samples),
            2
        );
    }
}
