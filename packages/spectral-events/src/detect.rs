//! Spectral event detection
//!
//! Events are local maxima of the TFR that rise above a per-frequency
//! threshold (a factor of the bin's median power). A maximum whose
//! half-maximum region also holds a higher peak is a shoulder of that peak
//! and is suppressed, so one burst gives one event. The extent of each event
//! is measured from the region around its peak.
//!
//! Suppression depends only on the power landscape, never on the threshold,
//! so raising the threshold can only remove events.

use rayon::prelude::*;

use crate::error::{Result, SpectralEventsError};
use crate::tfr::Tfr;
use crate::types::{
    BaselinePolicy, DetectionParams, EdgePolicy, EventBand, RegionMethod, SpectralEvent,
    TrialEventList,
};

/// Median of a slice, averaging the two middle values for even lengths.
/// Reorders the input. Returns 0.0 for an empty slice.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Per-frequency median power used as the detection baseline
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    policy: BaselinePolicy,
    /// One row for pooled baselines, one row per trial otherwise
    medians: Vec<Vec<f64>>,
}

impl Baseline {
    pub fn compute(tfr: &Tfr, policy: BaselinePolicy) -> Self {
        let n_freqs = tfr.num_frequencies();
        let medians = match policy {
            BaselinePolicy::Pooled => {
                let pooled = (0..n_freqs)
                    .into_par_iter()
                    .map(|f| {
                        let mut values: Vec<f64> = (0..tfr.num_trials())
                            .flat_map(|trial| tfr.row(trial, f).iter().copied())
                            .collect();
                        median(&mut values)
                    })
                    .collect();
                vec![pooled]
            }
            BaselinePolicy::PerTrial => (0..tfr.num_trials())
                .into_par_iter()
                .map(|trial| {
                    (0..n_freqs)
                        .map(|f| median(&mut tfr.row(trial, f).to_vec()))
                        .collect()
                })
                .collect(),
        };
        Self { policy, medians }
    }

    pub fn policy(&self) -> BaselinePolicy {
        self.policy
    }

    /// Median power per frequency bin that applies to `trial`
    pub fn medians(&self, trial: usize) -> &[f64] {
        match self.policy {
            BaselinePolicy::Pooled => &self.medians[0],
            BaselinePolicy::PerTrial => &self.medians[trial],
        }
    }
}

/// Inclusive bounding box of an event region, in sample indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    time_lo: usize,
    time_hi: usize,
    freq_lo: usize,
    freq_hi: usize,
}

impl Region {
    fn point(freq: usize, time: usize) -> Self {
        Self {
            time_lo: time,
            time_hi: time,
            freq_lo: freq,
            freq_hi: freq,
        }
    }

    fn include(&mut self, freq: usize, time: usize) {
        self.time_lo = self.time_lo.min(time);
        self.time_hi = self.time_hi.max(time);
        self.freq_lo = self.freq_lo.min(freq);
        self.freq_hi = self.freq_hi.max(freq);
    }

    fn touches_edge(&self, n_freqs: usize, n_times: usize) -> bool {
        self.time_lo == 0
            || self.time_hi + 1 == n_times
            || self.freq_lo == 0
            || self.freq_hi + 1 == n_freqs
    }
}

/// One trial's frequency x time power plane with its thresholds
struct TrialPlane<'a> {
    power: &'a [f64],
    thresholds: Vec<f64>,
    n_freqs: usize,
    n_times: usize,
}

impl<'a> TrialPlane<'a> {
    #[inline]
    fn at(&self, freq: usize, time: usize) -> f64 {
        self.power[freq * self.n_times + time]
    }

    #[inline]
    fn above(&self, freq: usize, time: usize) -> bool {
        self.at(freq, time) > self.thresholds[freq]
    }

    fn neighbours(&self, freq: usize, time: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let f_range = freq.saturating_sub(1)..=(freq + 1).min(self.n_freqs - 1);
        f_range.flat_map(move |f| {
            let t_range = time.saturating_sub(1)..=(time + 1).min(self.n_times - 1);
            t_range
                .filter(move |&t| (f, t) != (freq, time))
                .map(move |t| (f, t))
        })
    }

    /// Greater than or equal to every 8-connected neighbour
    fn is_local_max(&self, freq: usize, time: usize) -> bool {
        let p = self.at(freq, time);
        self.neighbours(freq, time).all(|(f, t)| self.at(f, t) <= p)
    }

    /// Bounding box of the suprathreshold region connected to `(freq, time)`.
    /// Labels are cached so peaks sharing a region only flood it once.
    fn threshold_region(
        &self,
        freq: usize,
        time: usize,
        labels: &mut [Option<usize>],
        regions: &mut Vec<Region>,
    ) -> Region {
        let idx = freq * self.n_times + time;
        if let Some(label) = labels[idx] {
            return regions[label];
        }

        let label = regions.len();
        let mut region = Region::point(freq, time);
        let mut stack = vec![(freq, time)];
        labels[idx] = Some(label);

        while let Some((f, t)) = stack.pop() {
            region.include(f, t);
            for (nf, nt) in self.neighbours(f, t) {
                let nidx = nf * self.n_times + nt;
                if labels[nidx].is_none() && self.above(nf, nt) {
                    labels[nidx] = Some(label);
                    stack.push((nf, nt));
                }
            }
        }

        regions.push(region);
        region
    }

    /// True when the 8-connected region of cells at or above half the peak
    /// power holds a higher cell, or an equal one earlier in time-major order.
    /// `marks` is shared between calls; `stamp` must be unique per call.
    fn is_dominated(&self, freq: usize, time: usize, marks: &mut [usize], stamp: usize) -> bool {
        let peak = self.at(freq, time);
        let half = peak / 2.0;
        let mut stack = vec![(freq, time)];
        marks[freq * self.n_times + time] = stamp;

        while let Some((f, t)) = stack.pop() {
            for (nf, nt) in self.neighbours(f, t) {
                let idx = nf * self.n_times + nt;
                if marks[idx] == stamp {
                    continue;
                }
                let p = self.at(nf, nt);
                if p < half {
                    continue;
                }
                if p > peak || (p == peak && (nt, nf) < (time, freq)) {
                    return true;
                }
                marks[idx] = stamp;
                stack.push((nf, nt));
            }
        }
        false
    }

    /// Full width at half of the peak power along the peak's row and column
    fn half_maximum_region(&self, freq: usize, time: usize) -> Region {
        let half = self.at(freq, time) / 2.0;

        let mut time_lo = time;
        while time_lo > 0 && self.at(freq, time_lo - 1) >= half {
            time_lo -= 1;
        }
        let mut time_hi = time;
        while time_hi + 1 < self.n_times && self.at(freq, time_hi + 1) >= half {
            time_hi += 1;
        }
        let mut freq_lo = freq;
        while freq_lo > 0 && self.at(freq_lo - 1, time) >= half {
            freq_lo -= 1;
        }
        let mut freq_hi = freq;
        while freq_hi + 1 < self.n_freqs && self.at(freq_hi + 1, time) >= half {
            freq_hi += 1;
        }

        Region {
            time_lo,
            time_hi,
            freq_lo,
            freq_hi,
        }
    }
}

fn detect_trial(
    tfr: &Tfr,
    trial: usize,
    medians: &[f64],
    band_rows: &[usize],
    params: &DetectionParams,
) -> TrialEventList {
    let n_freqs = tfr.num_frequencies();
    let n_times = tfr.num_times();
    let times = tfr.times();
    let freqs = tfr.frequencies().values();

    let plane = TrialPlane {
        power: tfr.trial_plane(trial),
        thresholds: medians.iter().map(|m| m * params.threshold_fom).collect(),
        n_freqs,
        n_times,
    };

    let mut labels: Vec<Option<usize>> = match params.region {
        RegionMethod::Threshold => vec![None; n_freqs * n_times],
        RegionMethod::HalfMaximum => Vec::new(),
    };
    let mut regions: Vec<Region> = Vec::new();
    let mut marks = vec![0usize; n_freqs * n_times];
    let mut stamp = 0usize;
    let mut events = Vec::new();

    // Time-major scan so events come out ordered by peak time, then frequency
    for t in 0..n_times {
        for &f in band_rows {
            if !plane.above(f, t) || !plane.is_local_max(f, t) {
                continue;
            }

            stamp += 1;
            if plane.is_dominated(f, t, &mut marks, stamp) {
                log::trace!(
                    "Trial {}: suppressing shoulder peak at {:.3}s / {} Hz",
                    trial,
                    times[t],
                    freqs[f]
                );
                continue;
            }

            let region = match params.region {
                RegionMethod::Threshold => {
                    plane.threshold_region(f, t, &mut labels, &mut regions)
                }
                RegionMethod::HalfMaximum => plane.half_maximum_region(f, t),
            };

            let truncated = region.touches_edge(n_freqs, n_times);
            if truncated && params.edge == EdgePolicy::Discard {
                log::trace!(
                    "Trial {}: discarding edge event at {:.3}s / {} Hz",
                    trial,
                    times[t],
                    freqs[f]
                );
                continue;
            }

            let peak_power = plane.at(f, t);
            let normalized_peak_power = (medians[f] > 0.0).then(|| peak_power / medians[f]);

            events.push(SpectralEvent {
                trial,
                peak_time: times[t],
                peak_frequency: freqs[f],
                peak_power,
                normalized_peak_power,
                threshold: plane.thresholds[f],
                onset_time: times[region.time_lo],
                offset_time: times[region.time_hi],
                duration: times[region.time_hi] - times[region.time_lo],
                lower_frequency_bound: freqs[region.freq_lo],
                upper_frequency_bound: freqs[region.freq_hi],
                frequency_span: freqs[region.freq_hi] - freqs[region.freq_lo],
                truncated,
            });
        }
    }

    TrialEventList::new(trial, events)
}

/// Find spectral events in every trial of a TFR
///
/// # Arguments
/// * `tfr` - Power array with its time and frequency axes
/// * `band` - Frequency interval the peaks must fall in
/// * `params` - Factor-of-median threshold, baseline, region and edge policies
///
/// # Returns
/// One `TrialEventList` per trial, in trial order
pub fn find_events(
    tfr: &Tfr,
    band: &EventBand,
    params: &DetectionParams,
) -> Result<Vec<TrialEventList>> {
    crate::profile_scope!("find_events");

    params.validate()?;
    band.validate()?;

    let band_rows = tfr.frequencies().indices_in(band);
    if band_rows.is_empty() {
        let freqs = tfr.frequencies().values();
        return Err(SpectralEventsError::ParameterRange(format!(
            "event band [{}, {}] Hz does not intersect the frequency axis [{}, {}] Hz",
            band.low,
            band.high,
            freqs[0],
            freqs[freqs.len() - 1]
        )));
    }

    log::debug!(
        "Detecting events: {} trials, band [{}, {}] Hz ({} bins), FOM {}, {:?} baseline, {:?} regions, {:?} edges",
        tfr.num_trials(),
        band.low,
        band.high,
        band_rows.len(),
        params.threshold_fom,
        params.baseline,
        params.region,
        params.edge
    );

    let baseline = Baseline::compute(tfr, params.baseline);
    let events: Vec<TrialEventList> = (0..tfr.num_trials())
        .into_par_iter()
        .map(|trial| detect_trial(tfr, trial, baseline.medians(trial), &band_rows, params))
        .collect();

    log::info!(
        "Detected {} events across {} trials",
        crate::types::total_event_count(&events),
        events.len()
    );

    Ok(events)
}
