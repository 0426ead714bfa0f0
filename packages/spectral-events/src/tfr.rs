//! Morlet wavelet time-frequency decomposition
//!
//! Each trial is convolved with a complex Morlet wavelet per frequency and the
//! squared magnitude of the (scaled) response is kept as power. Convolution is
//! done in the frequency domain with zero padding, so the result equals the
//! direct linear convolution centred on each sample.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::error::{Result, SpectralEventsError};
use crate::types::{FrequencyAxis, TfrParams, TimeSeries};

// Thread-local FFT planner so parallel trials reuse their plans
thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

/// Power spectrogram indexed by (trial, frequency, time)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tfr {
    /// Trial-major, then frequency, then time
    power: Vec<f64>,
    num_trials: usize,
    frequencies: FrequencyAxis,
    times: Vec<f64>,
}

impl Tfr {
    pub fn new(
        power: Vec<f64>,
        num_trials: usize,
        frequencies: FrequencyAxis,
        times: Vec<f64>,
    ) -> Result<Self> {
        if num_trials == 0 || times.is_empty() {
            return Err(SpectralEventsError::EmptyInput(
                "TFR needs at least one trial and one time sample".to_string(),
            ));
        }
        let expected = num_trials * frequencies.len() * times.len();
        if power.len() != expected {
            return Err(SpectralEventsError::InputShape(format!(
                "power array has {} values, expected {} ({} trials x {} frequencies x {} times)",
                power.len(),
                expected,
                num_trials,
                frequencies.len(),
                times.len()
            )));
        }
        Ok(Self {
            power,
            num_trials,
            frequencies,
            times,
        })
    }

    /// Build from nested `[trial][frequency][time]` vectors
    pub fn from_nested(
        nested: Vec<Vec<Vec<f64>>>,
        frequencies: FrequencyAxis,
        times: Vec<f64>,
    ) -> Result<Self> {
        let num_trials = nested.len();
        let mut power = Vec::with_capacity(num_trials * frequencies.len() * times.len());
        for (trial_idx, trial) in nested.into_iter().enumerate() {
            if trial.len() != frequencies.len() {
                return Err(SpectralEventsError::InputShape(format!(
                    "trial {} has {} frequency rows, expected {}",
                    trial_idx,
                    trial.len(),
                    frequencies.len()
                )));
            }
            for (freq_idx, row) in trial.into_iter().enumerate() {
                if row.len() != times.len() {
                    return Err(SpectralEventsError::InputShape(format!(
                        "trial {} frequency row {} has {} samples, expected {}",
                        trial_idx,
                        freq_idx,
                        row.len(),
                        times.len()
                    )));
                }
                power.extend(row);
            }
        }
        Self::new(power, num_trials, frequencies, times)
    }

    pub fn num_trials(&self) -> usize {
        self.num_trials
    }

    pub fn num_frequencies(&self) -> usize {
        self.frequencies.len()
    }

    pub fn num_times(&self) -> usize {
        self.times.len()
    }

    pub fn frequencies(&self) -> &FrequencyAxis {
        &self.frequencies
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.power
    }

    /// Frequency x time plane of one trial (row-major)
    pub fn trial_plane(&self, trial: usize) -> &[f64] {
        let plane = self.num_frequencies() * self.num_times();
        &self.power[trial * plane..(trial + 1) * plane]
    }

    /// Power over time for one trial and frequency bin
    pub fn row(&self, trial: usize, freq: usize) -> &[f64] {
        let n_times = self.num_times();
        let start = (trial * self.num_frequencies() + freq) * n_times;
        &self.power[start..start + n_times]
    }

    pub fn power(&self, trial: usize, freq: usize, time: usize) -> f64 {
        self.row(trial, freq)[time]
    }
}

/// Complex Morlet wavelet sampled at the recording rate
#[derive(Debug, Clone)]
pub struct MorletWavelet {
    pub frequency: f64,
    /// Number of samples on each side of the centre
    pub half_width: usize,
    pub coefficients: Vec<Complex<f64>>,
}

impl MorletWavelet {
    pub fn new(frequency: f64, sampling_rate: f64, width: f64) -> Self {
        let sf = frequency / width;
        let st = 1.0 / (2.0 * PI * sf);
        let amplitude = 1.0 / (st * PI.sqrt()).sqrt();
        let half_width = (3.5 * st * sampling_rate).ceil() as usize;

        let coefficients = (0..=2 * half_width)
            .map(|k| {
                let t = (k as f64 - half_width as f64) / sampling_rate;
                let envelope = amplitude * (-(t * t) / (2.0 * st * st)).exp();
                Complex::from_polar(envelope, 2.0 * PI * frequency * t)
            })
            .collect();

        Self {
            frequency,
            half_width,
            coefficients,
        }
    }
}

/// Wavelet spectrum prepared for one FFT size
struct PreparedWavelet {
    fft_len: usize,
    half_width: usize,
    spectrum: Vec<Complex<f64>>,
}

fn forward_fft(buffer: &mut [Complex<f64>]) {
    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_forward(buffer.len());
        fft.process(buffer);
    });
}

fn inverse_fft(buffer: &mut [Complex<f64>]) {
    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_inverse(buffer.len());
        fft.process(buffer);
    });
}

fn prepare_wavelet(wavelet: &MorletWavelet, num_samples: usize) -> PreparedWavelet {
    let fft_len = (num_samples + 2 * wavelet.half_width).next_power_of_two();
    let mut spectrum = vec![Complex::new(0.0, 0.0); fft_len];
    spectrum[..wavelet.coefficients.len()].copy_from_slice(&wavelet.coefficients);
    forward_fft(&mut spectrum);
    PreparedWavelet {
        fft_len,
        half_width: wavelet.half_width,
        spectrum,
    }
}

/// Power of one trial for every prepared wavelet, appended frequency by frequency
fn trial_power(signal: &[f64], wavelets: &[PreparedWavelet], sampling_rate: f64) -> Vec<f64> {
    let n = signal.len();
    let mut out = Vec::with_capacity(n * wavelets.len());
    let mut signal_spectra: HashMap<usize, Vec<Complex<f64>>> = HashMap::new();

    for wavelet in wavelets {
        let signal_spectrum = signal_spectra.entry(wavelet.fft_len).or_insert_with(|| {
            let mut buffer = vec![Complex::new(0.0, 0.0); wavelet.fft_len];
            for (slot, &x) in buffer.iter_mut().zip(signal) {
                slot.re = x;
            }
            forward_fft(&mut buffer);
            buffer
        });

        let mut product: Vec<Complex<f64>> = signal_spectrum
            .iter()
            .zip(&wavelet.spectrum)
            .map(|(a, b)| a * b)
            .collect();
        inverse_fft(&mut product);

        let scale = 1.0 / wavelet.fft_len as f64;
        out.extend(
            product[wavelet.half_width..wavelet.half_width + n]
                .iter()
                .map(|c| (2.0 * c.norm() * scale / sampling_rate).powi(2)),
        );
    }

    out
}

/// Compute the Morlet TFR of every trial
///
/// # Arguments
/// * `series` - Trials x samples recording
/// * `frequencies` - Frequencies to evaluate; all must be at or below Nyquist
/// * `params` - Wavelet width in cycles
///
/// # Returns
/// Power array (trials x frequencies x time) sharing the series' time axis
pub fn compute_tfr(
    series: &TimeSeries,
    frequencies: &FrequencyAxis,
    params: &TfrParams,
) -> Result<Tfr> {
    crate::profile_scope!("compute_tfr");

    params.validate()?;

    let fs = series.sampling_rate();
    let nyquist = fs / 2.0;
    if frequencies.max() > nyquist {
        return Err(SpectralEventsError::ParameterRange(format!(
            "frequency {} Hz exceeds the Nyquist limit of {} Hz",
            frequencies.max(),
            nyquist
        )));
    }

    let num_samples = series.num_samples();
    log::debug!(
        "Computing TFR: {} trials x {} samples, {} frequencies ({}-{} Hz), width {}",
        series.num_trials(),
        num_samples,
        frequencies.len(),
        frequencies.values()[0],
        frequencies.max(),
        params.width
    );

    let wavelets: Vec<PreparedWavelet> = frequencies
        .values()
        .iter()
        .map(|&f| prepare_wavelet(&MorletWavelet::new(f, fs, params.width), num_samples))
        .collect();

    let power: Vec<f64> = series
        .trials()
        .par_iter()
        .map(|trial| trial_power(trial, &wavelets, fs))
        .collect::<Vec<_>>()
        .concat();

    Tfr::new(power, series.num_trials(), frequencies.clone(), series.times())
}
