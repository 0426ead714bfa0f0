//! Per-condition event statistics and trial-averaged spectrograms

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::Baseline;
use crate::error::{Result, SpectralEventsError};
use crate::tfr::Tfr;
use crate::types::{BaselinePolicy, SpectralEvent, TrialEventList};

/// Event statistics for all trials sharing one condition label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub label: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub trial_count: usize,
    /// Trial indices with this label, in trial order
    pub trials: Vec<usize>,
    /// Event count per trial, aligned with `trials`
    pub events_per_trial: Vec<usize>,
    pub total_events: usize,
    pub mean_events_per_trial: f64,
    /// Fraction of trials with at least one event
    pub event_rate: f64,
    pub mean_peak_power: Option<f64>,
    pub mean_normalized_peak_power: Option<f64>,
    pub mean_duration: Option<f64>,
    pub mean_frequency_span: Option<f64>,
}

impl ConditionSummary {
    fn from_trials(label: i64, trials: Vec<usize>, events: &[TrialEventList]) -> Self {
        let events_per_trial: Vec<usize> = trials.iter().map(|&t| events[t].len()).collect();
        let total_events: usize = events_per_trial.iter().sum();
        let trial_count = trials.len();

        let (mean_events_per_trial, event_rate) = if trial_count == 0 {
            (0.0, 0.0)
        } else {
            let with_events = events_per_trial.iter().filter(|&&n| n > 0).count();
            (
                total_events as f64 / trial_count as f64,
                with_events as f64 / trial_count as f64,
            )
        };

        let all_events: Vec<&SpectralEvent> =
            trials.iter().flat_map(|&t| events[t].iter()).collect();

        Self {
            label,
            name: None,
            trial_count,
            trials,
            events_per_trial,
            total_events,
            mean_events_per_trial,
            event_rate,
            mean_peak_power: mean_of(&all_events, |e| Some(e.peak_power)),
            mean_normalized_peak_power: mean_of(&all_events, |e| e.normalized_peak_power),
            mean_duration: mean_of(&all_events, |e| Some(e.duration)),
            mean_frequency_span: mean_of(&all_events, |e| Some(e.frequency_span)),
        }
    }
}

/// Mean of a per-event value over the events that have one
fn mean_of(
    events: &[&SpectralEvent],
    field: impl Fn(&SpectralEvent) -> Option<f64>,
) -> Option<f64> {
    let values: Vec<f64> = events.iter().filter_map(|e| field(*e)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Difference in event counts between two conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCountContrast {
    pub condition_a: i64,
    pub condition_b: i64,
    /// (total_a − total_b) / trial_count_a
    pub normalized_difference: f64,
    /// mean_events_per_trial_a − mean_events_per_trial_b
    pub mean_difference: f64,
}

/// Trial indices carrying `label`
pub fn trials_with_label(labels: &[i64], label: i64) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == label)
        .map(|(i, _)| i)
        .collect()
}

/// Group trials by label and summarise their events
///
/// Conditions are returned in ascending label order. Labels present in `names`
/// but absent from `labels` produce an empty summary.
pub fn summarize_by_condition(
    events: &[TrialEventList],
    labels: &[i64],
    names: &BTreeMap<i64, String>,
) -> Result<Vec<ConditionSummary>> {
    if labels.len() != events.len() {
        return Err(SpectralEventsError::InputShape(format!(
            "{} condition labels for {} trials",
            labels.len(),
            events.len()
        )));
    }

    let mut groups: BTreeMap<i64, Vec<usize>> = names.keys().map(|&l| (l, Vec::new())).collect();
    for (trial, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(trial);
    }

    let summaries = groups
        .into_iter()
        .map(|(label, trials)| {
            let mut summary = ConditionSummary::from_trials(label, trials, events);
            summary.name = names.get(&label).cloned();
            log::debug!(
                "Condition {}: {} trials, {} events",
                label,
                summary.trial_count,
                summary.total_events
            );
            summary
        })
        .collect();

    Ok(summaries)
}

/// Contrast the event counts of conditions `a` and `b`, normalised by the trial count of `a`
pub fn event_count_contrast(
    summaries: &[ConditionSummary],
    a: i64,
    b: i64,
) -> Result<EventCountContrast> {
    let find = |label: i64| {
        summaries
            .iter()
            .find(|s| s.label == label)
            .ok_or_else(|| {
                SpectralEventsError::ParameterRange(format!("unknown condition {}", label))
            })
    };
    let sa = find(a)?;
    let sb = find(b)?;

    for s in [sa, sb] {
        if s.trial_count == 0 {
            return Err(SpectralEventsError::ParameterRange(format!(
                "condition {} has no trials",
                s.label
            )));
        }
    }

    Ok(EventCountContrast {
        condition_a: a,
        condition_b: b,
        normalized_difference: (sa.total_events as f64 - sb.total_events as f64)
            / sa.trial_count as f64,
        mean_difference: sa.mean_events_per_trial - sb.mean_events_per_trial,
    })
}

/// Mean power over a set of trials, laid out frequency × time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageSpectrogram {
    pub trials: Vec<usize>,
    pub frequencies: Vec<f64>,
    pub times: Vec<f64>,
    /// Power divided by the pooled per-bin median
    pub normalized: bool,
    pub power: Vec<Vec<f64>>,
}

/// Average the TFR over `trials`, optionally in FOM units
pub fn average_spectrogram(tfr: &Tfr, trials: &[usize], normalize: bool) -> Result<AverageSpectrogram> {
    if trials.is_empty() {
        return Err(SpectralEventsError::EmptyInput(
            "no trials to average".to_string(),
        ));
    }
    if let Some(&bad) = trials.iter().find(|&&t| t >= tfr.num_trials()) {
        return Err(SpectralEventsError::ParameterRange(format!(
            "trial {} out of range (TFR has {} trials)",
            bad,
            tfr.num_trials()
        )));
    }

    let nf = tfr.num_frequencies();
    let nt = tfr.num_times();
    let mut power = vec![vec![0.0; nt]; nf];
    for &trial in trials {
        for (f, row) in power.iter_mut().enumerate() {
            for (acc, &p) in row.iter_mut().zip(tfr.row(trial, f)) {
                *acc += p;
            }
        }
    }

    let scale = 1.0 / trials.len() as f64;
    let baseline = normalize.then(|| Baseline::compute(tfr, BaselinePolicy::Pooled));
    for (f, row) in power.iter_mut().enumerate() {
        let median = baseline.as_ref().map(|b| b.medians(0)[f]);
        for v in row.iter_mut() {
            *v *= scale;
            if let Some(m) = median {
                *v = if m > 0.0 { *v / m } else { 0.0 };
            }
        }
    }

    Ok(AverageSpectrogram {
        trials: trials.to_vec(),
        frequencies: tfr.frequencies().values().to_vec(),
        times: tfr.times().to_vec(),
        normalized: normalize,
        power,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrequencyAxis;

    fn event(trial: usize, power: f64, duration: f64) -> SpectralEvent {
        SpectralEvent {
            trial,
            peak_time: 0.1,
            peak_frequency: 20.0,
            peak_power: power,
            normalized_peak_power: Some(power / 2.0),
            threshold: 1.0,
            onset_time: 0.05,
            offset_time: 0.05 + duration,
            duration,
            lower_frequency_bound: 18.0,
            upper_frequency_bound: 22.0,
            frequency_span: 4.0,
            truncated: false,
        }
    }

    fn sample_events() -> (Vec<TrialEventList>, Vec<i64>) {
        let events = vec![
            TrialEventList::new(0, vec![event(0, 10.0, 0.05), event(0, 20.0, 0.07)]),
            TrialEventList::new(1, vec![]),
            TrialEventList::new(2, vec![event(2, 30.0, 0.03)]),
            TrialEventList::new(3, vec![]),
        ];
        (events, vec![1, 0, 1, 0])
    }

    #[test]
    fn test_summarize_by_condition() {
        let (events, labels) = sample_events();
        let summaries = summarize_by_condition(&events, &labels, &BTreeMap::new()).unwrap();
        assert_eq!(summaries.len(), 2);

        let miss = &summaries[0];
        assert_eq!(miss.label, 0);
        assert_eq!(miss.trials, vec![1, 3]);
        assert_eq!(miss.total_events, 0);
        assert_eq!(miss.event_rate, 0.0);
        assert!(miss.mean_peak_power.is_none());

        let hit = &summaries[1];
        assert_eq!(hit.events_per_trial, vec![2, 1]);
        assert_eq!(hit.total_events, 3);
        assert!((hit.mean_events_per_trial - 1.5).abs() < 1e-12);
        assert!((hit.event_rate - 1.0).abs() < 1e-12);
        assert!((hit.mean_peak_power.unwrap() - 20.0).abs() < 1e-12);
        assert!((hit.mean_duration.unwrap() - 0.05).abs() < 1e-12);
        assert!((hit.mean_frequency_span.unwrap() - 4.0).abs() < 1e-12);
        assert!((hit.mean_normalized_peak_power.unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_normalized_power_skips_zero_median_events() {
        let (mut events, labels) = sample_events();
        events[2].events[0].normalized_peak_power = None;
        let summaries = summarize_by_condition(&events, &labels, &BTreeMap::new()).unwrap();
        let hit = &summaries[1];
        // (5 + 10) / 2 over the two events with a finite ratio
        assert!((hit.mean_normalized_peak_power.unwrap() - 7.5).abs() < 1e-12);
        assert!((hit.mean_peak_power.unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_condition_names_and_empty_conditions() {
        let (events, labels) = sample_events();
        let names = BTreeMap::from([(1, "hit".to_string()), (2, "catch".to_string())]);
        let summaries = summarize_by_condition(&events, &labels, &names).unwrap();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[1].name.as_deref(), Some("hit"));
        assert_eq!(summaries[2].trial_count, 0);

        let err = event_count_contrast(&summaries, 2, 0).unwrap_err();
        assert!(matches!(err, SpectralEventsError::ParameterRange(_)));
    }

    #[test]
    fn test_label_count_mismatch() {
        let (events, _) = sample_events();
        let result = summarize_by_condition(&events, &[1, 0], &BTreeMap::new());
        assert!(matches!(result, Err(SpectralEventsError::InputShape(_))));
    }

    #[test]
    fn test_event_count_contrast() {
        let (events, labels) = sample_events();
        let summaries = summarize_by_condition(&events, &labels, &BTreeMap::new()).unwrap();
        let contrast = event_count_contrast(&summaries, 1, 0).unwrap();
        assert!((contrast.normalized_difference - 1.5).abs() < 1e-12);
        assert!((contrast.mean_difference - 1.5).abs() < 1e-12);

        assert!(event_count_contrast(&summaries, 1, 7).is_err());
    }

    fn two_trial_tfr() -> Tfr {
        let freqs = FrequencyAxis::new(vec![10.0, 20.0]).unwrap();
        // trial 0: all 1.0, trial 1: all 3.0
        let mut power = vec![1.0; 2 * 3];
        power.extend(vec![3.0; 2 * 3]);
        Tfr::new(power, 2, freqs, vec![0.0, 0.1, 0.2]).unwrap()
    }

    #[test]
    fn test_average_spectrogram() {
        let tfr = two_trial_tfr();
        let avg = average_spectrogram(&tfr, &[0, 1], false).unwrap();
        assert_eq!(avg.power.len(), 2);
        assert_eq!(avg.power[0], vec![2.0, 2.0, 2.0]);

        let single = average_spectrogram(&tfr, &[1], false).unwrap();
        assert_eq!(single.power[1], vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_average_spectrogram_normalized() {
        let tfr = two_trial_tfr();
        // Pooled median per bin is 2.0
        let avg = average_spectrogram(&tfr, &[1], true).unwrap();
        assert!(avg.normalized);
        assert!((avg.power[0][0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_average_spectrogram_rejects_bad_trials() {
        let tfr = two_trial_tfr();
        assert!(matches!(
            average_spectrogram(&tfr, &[], false),
            Err(SpectralEventsError::EmptyInput(_))
        ));
        assert!(matches!(
            average_spectrogram(&tfr, &[5], false),
            Err(SpectralEventsError::ParameterRange(_))
        ));
    }

    #[test]
    fn test_trials_with_label() {
        assert_eq!(trials_with_label(&[1, 0, 1, 2], 1), vec![0, 2]);
        assert!(trials_with_label(&[0, 0], 1).is_empty());
    }
}
