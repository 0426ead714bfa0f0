use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectralEventsError};

/// Multi-trial recording sampled at a fixed rate
///
/// Rows are trials, columns are samples. Construction validates the shape, so
/// every trial is guaranteed to hold `num_samples()` values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    trials: Vec<Vec<f64>>,
    sampling_rate: f64,
    epoch_start: f64,
}

impl TimeSeries {
    pub fn new(trials: Vec<Vec<f64>>, sampling_rate: f64, epoch_start: f64) -> Result<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(SpectralEventsError::ParameterRange(format!(
                "sampling rate must be positive, got {}",
                sampling_rate
            )));
        }
        if !epoch_start.is_finite() {
            return Err(SpectralEventsError::ParameterRange(
                "epoch start must be finite".to_string(),
            ));
        }
        if trials.is_empty() {
            return Err(SpectralEventsError::EmptyInput(
                "time series has no trials".to_string(),
            ));
        }

        let num_samples = trials[0].len();
        if num_samples == 0 {
            return Err(SpectralEventsError::EmptyInput(
                "time series has no samples".to_string(),
            ));
        }
        if let Some((idx, trial)) = trials
            .iter()
            .enumerate()
            .find(|(_, t)| t.len() != num_samples)
        {
            return Err(SpectralEventsError::InputShape(format!(
                "trial {} has {} samples, expected {}",
                idx,
                trial.len(),
                num_samples
            )));
        }

        Ok(Self {
            trials,
            sampling_rate,
            epoch_start,
        })
    }

    pub fn trials(&self) -> &[Vec<f64>] {
        &self.trials
    }

    pub fn trial(&self, index: usize) -> Option<&[f64]> {
        self.trials.get(index).map(|t| t.as_slice())
    }

    pub fn num_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn num_samples(&self) -> usize {
        self.trials[0].len()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn epoch_start(&self) -> f64 {
        self.epoch_start
    }

    /// Sample times in seconds relative to the epoch reference
    pub fn times(&self) -> Vec<f64> {
        (0..self.num_samples())
            .map(|k| self.epoch_start + k as f64 / self.sampling_rate)
            .collect()
    }
}

/// Ordered set of frequencies (Hz) at which the TFR is evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FrequencyAxis(Vec<f64>);

impl FrequencyAxis {
    pub fn new(frequencies: Vec<f64>) -> Result<Self> {
        if frequencies.is_empty() {
            return Err(SpectralEventsError::EmptyInput(
                "frequency axis is empty".to_string(),
            ));
        }
        if let Some(f) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(SpectralEventsError::ParameterRange(format!(
                "frequencies must be positive and finite, got {}",
                f
            )));
        }
        if frequencies.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SpectralEventsError::ParameterRange(
                "frequencies must be strictly increasing".to_string(),
            ));
        }
        Ok(Self(frequencies))
    }

    /// Evenly spaced axis from `min` to `max` (inclusive when `max` lands on the grid)
    pub fn range(min: f64, max: f64, step: f64) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(SpectralEventsError::ParameterRange(format!(
                "frequency step must be positive, got {}",
                step
            )));
        }
        if !(min.is_finite() && max.is_finite()) || max < min {
            return Err(SpectralEventsError::ParameterRange(format!(
                "invalid frequency range [{}, {}]",
                min, max
            )));
        }

        // Tolerance keeps `max` on the grid despite accumulated rounding
        let count = ((max - min) / step + 1e-9).floor() as usize + 1;
        Self::new((0..count).map(|i| min + i as f64 * step).collect())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> f64 {
        self.0[self.0.len() - 1]
    }

    /// Indices of the bins whose centre falls inside `band`
    pub fn indices_in(&self, band: &EventBand) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, f)| band.contains(**f))
            .map(|(i, _)| i)
            .collect()
    }
}

impl TryFrom<Vec<f64>> for FrequencyAxis {
    type Error = SpectralEventsError;

    fn try_from(value: Vec<f64>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FrequencyAxis> for Vec<f64> {
    fn from(axis: FrequencyAxis) -> Self {
        axis.0
    }
}

/// Frequency grid description used in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 60.0,
            step: 1.0,
        }
    }
}

impl FrequencyRange {
    pub fn to_axis(&self) -> Result<FrequencyAxis> {
        FrequencyAxis::range(self.min, self.max, self.step)
    }
}

/// Closed frequency interval `[low, high]` in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventBand {
    pub low: f64,
    pub high: f64,
}

impl EventBand {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let band = Self { low, high };
        band.validate()?;
        Ok(band)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.low.is_finite() && self.high.is_finite()) || self.low > self.high {
            return Err(SpectralEventsError::ParameterRange(format!(
                "invalid event band [{}, {}]",
                self.low, self.high
            )));
        }
        Ok(())
    }

    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low && frequency <= self.high
    }
}

impl Default for EventBand {
    /// Beta band
    fn default() -> Self {
        Self {
            low: 15.0,
            high: 29.0,
        }
    }
}

/// Morlet wavelet parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfrParams {
    /// Number of cycles per wavelet
    pub width: f64,
}

impl Default for TfrParams {
    fn default() -> Self {
        Self { width: 7.0 }
    }
}

impl TfrParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(SpectralEventsError::ParameterRange(format!(
                "wavelet width must be positive, got {}",
                self.width
            )));
        }
        Ok(())
    }
}

/// How the per-frequency median baseline is gathered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Median over every trial and time sample of the bin
    #[default]
    Pooled,
    /// Median over the time samples of each trial separately
    PerTrial,
}

/// How an event's time/frequency extent is measured around its peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMethod {
    /// Connected region that stays above the bin thresholds
    #[default]
    Threshold,
    /// Full width at half of the peak power along the peak's row and column
    HalfMaximum,
}

/// What happens to events whose region reaches the edge of the TFR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Keep the event with its region clipped to the TFR and flagged as truncated
    #[default]
    Truncate,
    /// Drop the event
    Discard,
}

impl BaselinePolicy {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "pooled" => Some(Self::Pooled),
            "per_trial" | "per-trial" => Some(Self::PerTrial),
            _ => None,
        }
    }
}

impl RegionMethod {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "threshold" => Some(Self::Threshold),
            "half_maximum" | "half-maximum" | "fwhm" => Some(Self::HalfMaximum),
            _ => None,
        }
    }
}

impl EdgePolicy {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "truncate" => Some(Self::Truncate),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

/// Event detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Factor-of-median threshold
    pub threshold_fom: f64,
    pub baseline: BaselinePolicy,
    pub region: RegionMethod,
    pub edge: EdgePolicy,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold_fom: 6.0,
            baseline: BaselinePolicy::default(),
            region: RegionMethod::default(),
            edge: EdgePolicy::default(),
        }
    }
}

impl DetectionParams {
    pub fn with_fom(threshold_fom: f64) -> Self {
        Self {
            threshold_fom,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold_fom.is_finite() && self.threshold_fom > 0.0) {
            return Err(SpectralEventsError::ParameterRange(format!(
                "threshold factor-of-median must be positive, got {}",
                self.threshold_fom
            )));
        }
        Ok(())
    }
}

/// A transient suprathreshold power peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralEvent {
    pub trial: usize,
    pub peak_time: f64,
    pub peak_frequency: f64,
    pub peak_power: f64,
    /// Peak power divided by the bin median (FOM units); `None` when the median is zero
    pub normalized_peak_power: Option<f64>,
    /// Threshold of the peak's frequency bin
    pub threshold: f64,
    pub onset_time: f64,
    pub offset_time: f64,
    pub duration: f64,
    pub lower_frequency_bound: f64,
    pub upper_frequency_bound: f64,
    pub frequency_span: f64,
    /// Region reached the boundary of the TFR and was clipped
    pub truncated: bool,
}

/// Events detected in a single trial, ordered by peak time then frequency
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialEventList {
    pub trial: usize,
    pub events: Vec<SpectralEvent>,
}

impl TrialEventList {
    pub fn new(trial: usize, events: Vec<SpectralEvent>) -> Self {
        Self { trial, events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpectralEvent> {
        self.events.iter()
    }
}

/// Total number of events across trials
pub fn total_event_count(lists: &[TrialEventList]) -> usize {
    lists.iter().map(TrialEventList::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_rejects_ragged_trials() {
        let result = TimeSeries::new(vec![vec![0.0; 4], vec![0.0; 3]], 100.0, 0.0);
        assert!(matches!(result, Err(SpectralEventsError::InputShape(_))));
    }

    #[test]
    fn test_time_series_rejects_empty() {
        assert!(matches!(
            TimeSeries::new(vec![], 100.0, 0.0),
            Err(SpectralEventsError::EmptyInput(_))
        ));
        assert!(matches!(
            TimeSeries::new(vec![vec![]], 100.0, 0.0),
            Err(SpectralEventsError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_time_series_rejects_bad_sampling_rate() {
        assert!(matches!(
            TimeSeries::new(vec![vec![1.0]], 0.0, 0.0),
            Err(SpectralEventsError::ParameterRange(_))
        ));
        assert!(matches!(
            TimeSeries::new(vec![vec![1.0]], -5.0, 0.0),
            Err(SpectralEventsError::ParameterRange(_))
        ));
    }

    #[test]
    fn test_times_start_at_epoch_start() {
        let ts = TimeSeries::new(vec![vec![0.0; 4]], 4.0, -1.0).unwrap();
        assert_eq!(ts.times(), vec![-1.0, -0.75, -0.5, -0.25]);
    }

    #[test]
    fn test_frequency_range_includes_max() {
        let axis = FrequencyAxis::range(1.0, 60.0, 1.0).unwrap();
        assert_eq!(axis.len(), 60);
        assert_eq!(axis.values()[0], 1.0);
        assert_eq!(axis.max(), 60.0);

        let axis = FrequencyAxis::range(2.0, 3.0, 0.1).unwrap();
        assert_eq!(axis.len(), 11);
    }

    #[test]
    fn test_frequency_axis_validation() {
        assert!(FrequencyAxis::new(vec![]).is_err());
        assert!(FrequencyAxis::new(vec![0.0, 1.0]).is_err());
        assert!(FrequencyAxis::new(vec![5.0, 4.0]).is_err());
        assert!(FrequencyAxis::new(vec![5.0, 5.0]).is_err());
        assert!(FrequencyAxis::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_band_indices() {
        let axis = FrequencyAxis::range(10.0, 40.0, 1.0).unwrap();
        let idx = axis.indices_in(&EventBand::new(15.0, 29.0).unwrap());
        assert_eq!(idx.first(), Some(&5));
        assert_eq!(idx.last(), Some(&19));
        assert_eq!(idx.len(), 15);
    }

    #[test]
    fn test_event_band_validation() {
        assert!(EventBand::new(30.0, 20.0).is_err());
        assert!(EventBand::new(f64::NAN, 20.0).is_err());
        assert!(EventBand::new(20.0, 20.0).is_ok());
    }

    #[test]
    fn test_detection_params_validation() {
        assert!(DetectionParams::with_fom(6.0).validate().is_ok());
        assert!(DetectionParams::with_fom(0.0).validate().is_err());
        assert!(DetectionParams::with_fom(-1.0).validate().is_err());
        assert!(DetectionParams::with_fom(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(BaselinePolicy::from_name("per-trial"), Some(BaselinePolicy::PerTrial));
        assert_eq!(RegionMethod::from_name("fwhm"), Some(RegionMethod::HalfMaximum));
        assert_eq!(EdgePolicy::from_name("discard"), Some(EdgePolicy::Discard));
        assert_eq!(EdgePolicy::from_name("clip"), None);
    }

    #[test]
    fn test_detection_params_deserialize_defaults() {
        let params: DetectionParams =
            serde_json::from_str(r#"{"threshold_fom": 4.0, "edge": "discard"}"#).unwrap();
        assert_eq!(params.threshold_fom, 4.0);
        assert_eq!(params.edge, EdgePolicy::Discard);
        assert_eq!(params.baseline, BaselinePolicy::Pooled);
    }

    #[test]
    fn test_frequency_axis_deserialize_validates() {
        let ok: FrequencyAxis = serde_json::from_str("[1.0, 2.0]").unwrap();
        assert_eq!(ok.len(), 2);
        assert!(serde_json::from_str::<FrequencyAxis>("[2.0, 1.0]").is_err());
    }
}
