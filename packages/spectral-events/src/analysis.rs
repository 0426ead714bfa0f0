use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::aggregate::{
    average_spectrogram, event_count_contrast, summarize_by_condition, trials_with_label,
    AverageSpectrogram, ConditionSummary, EventCountContrast,
};
use crate::detect::find_events;
use crate::error::Result;
use crate::loader::SubjectData;
use crate::tfr::compute_tfr;
use crate::types::{
    total_event_count, DetectionParams, EventBand, FrequencyRange, TfrParams, TrialEventList,
};

/// Condition label of trials where the stimulus was detected
pub const HIT_LABEL: i64 = 1;
/// Condition label of trials where the stimulus was missed
pub const MISS_LABEL: i64 = 0;

/// Everything that controls one subject's analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub tfr: TfrParams,
    pub frequencies: FrequencyRange,
    pub band: EventBand,
    pub detection: DetectionParams,
    /// Display names keyed by condition label
    pub condition_names: BTreeMap<i64, String>,
    /// Attach per-condition average spectrograms (FOM units) to the result
    pub include_spectrogram: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tfr: TfrParams::default(),
            frequencies: FrequencyRange::default(),
            band: EventBand::default(),
            detection: DetectionParams::default(),
            condition_names: BTreeMap::from([
                (HIT_LABEL, "hit".to_string()),
                (MISS_LABEL, "miss".to_string()),
            ]),
            include_spectrogram: false,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.tfr.validate()?;
        self.frequencies.to_axis()?;
        self.band.validate()?;
        self.detection.validate()
    }
}

/// Average spectrogram of the trials in one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpectrogram {
    pub label: i64,
    pub spectrogram: AverageSpectrogram,
}

/// Result of analysing one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectAnalysis {
    pub id: String,
    pub created_at: String,
    pub subject: String,
    pub source: String,
    pub num_trials: usize,
    pub num_samples: usize,
    pub sampling_rate: f64,
    pub config: AnalysisConfig,
    pub total_events: usize,
    pub events: Vec<TrialEventList>,
    pub conditions: Vec<ConditionSummary>,
    /// Hit minus miss, present when both conditions have trials
    pub hit_miss_contrast: Option<EventCountContrast>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrograms: Option<Vec<ConditionSpectrogram>>,
}

/// Run TFR, event detection and per-condition aggregation for one subject
pub fn analyze_subject(data: &SubjectData, config: &AnalysisConfig) -> Result<SubjectAnalysis> {
    crate::profile_scope!(format!("analyze_subject {}", data.subject));

    config.validate()?;
    let axis = config.frequencies.to_axis()?;

    log::info!(
        "Analysing {}: {} trials, {} frequencies ({}-{} Hz), band [{}, {}] Hz",
        data.subject,
        data.series.num_trials(),
        axis.len(),
        config.frequencies.min,
        config.frequencies.max,
        config.band.low,
        config.band.high
    );

    let tfr = compute_tfr(&data.series, &axis, &config.tfr)?;
    let events = find_events(&tfr, &config.band, &config.detection)?;
    let conditions = summarize_by_condition(&events, &data.labels, &config.condition_names)?;

    let has_trials = |label: i64| {
        conditions
            .iter()
            .any(|c| c.label == label && c.trial_count > 0)
    };
    let hit_miss_contrast = if has_trials(HIT_LABEL) && has_trials(MISS_LABEL) {
        Some(event_count_contrast(&conditions, HIT_LABEL, MISS_LABEL)?)
    } else {
        log::debug!("Skipping hit/miss contrast: one of the conditions has no trials");
        None
    };

    let spectrograms = if config.include_spectrogram {
        let mut out = Vec::new();
        for summary in conditions.iter().filter(|c| c.trial_count > 0) {
            let trials = trials_with_label(&data.labels, summary.label);
            out.push(ConditionSpectrogram {
                label: summary.label,
                spectrogram: average_spectrogram(&tfr, &trials, true)?,
            });
        }
        Some(out)
    } else {
        None
    };

    Ok(SubjectAnalysis {
        id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        subject: data.subject.clone(),
        source: data.source.display().to_string(),
        num_trials: data.series.num_trials(),
        num_samples: data.series.num_samples(),
        sampling_rate: data.series.sampling_rate(),
        config: config.clone(),
        total_events: total_event_count(&events),
        events,
        conditions,
        hit_miss_contrast,
        spectrograms,
    })
}
