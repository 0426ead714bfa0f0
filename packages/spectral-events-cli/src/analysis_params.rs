use crate::cli::{AnalysisArgs, LoaderArgs};
use serde::Deserialize;
use spectral_events::{
    AnalysisConfig, BaselinePolicy, EdgePolicy, EventBand, FileType, LoaderConfig, RegionMethod,
    TrialAxis,
};
use std::path::Path;

/// Layout of the `--config` JSON file; both sections are optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub loader: LoaderConfig,
    pub analysis: AnalysisConfig,
}

pub fn load_config_file(path: &str) -> Result<ConfigFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid config file '{}': {}", path, e))
}

/// Validate a single file path: existence and supported extension.
pub fn validate_file(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("Input file not found: {}", file_path));
    }
    FileType::from_extension(path).map(|_| ()).map_err(|_| {
        format!(
            "Unsupported file extension for '{}'. Supported: {}",
            file_path,
            FileType::supported_extensions().join(", ")
        )
    })
}

fn config_file(args: &LoaderArgs) -> Result<ConfigFile, String> {
    match &args.config {
        Some(path) => load_config_file(path),
        None => Ok(ConfigFile::default()),
    }
}

/// Apply loader flags on top of a config file's loader section.
/// Explicit timing flags win over values recorded in subject files.
fn apply_loader_flags(loader: &mut LoaderConfig, args: &LoaderArgs) -> Result<(), String> {
    if let Some(sr) = args.sr {
        loader.sampling_rate = sr;
        loader.force_sampling_rate = true;
    }
    if let Some(start) = args.epoch_start {
        loader.epoch_start = start;
        loader.force_epoch_start = true;
    }
    if let Some(ref name) = args.signal_var {
        loader.signal_variable = name.clone();
    }
    if let Some(ref name) = args.label_var {
        loader.label_variable = name.clone();
    }
    if let Some(ref axis) = args.trial_axis {
        loader.trial_axis = TrialAxis::from_name(axis)
            .ok_or_else(|| format!("Unknown trial axis '{}'. Use rows or columns", axis))?;
    }

    if !(loader.sampling_rate.is_finite() && loader.sampling_rate > 0.0) {
        return Err(format!(
            "Sampling rate must be positive, got {}",
            loader.sampling_rate
        ));
    }
    Ok(())
}

/// Loader settings only, for commands that read files without analysing them
pub fn build_loader_config(args: &LoaderArgs) -> Result<LoaderConfig, String> {
    let mut loader = config_file(args)?.loader;
    apply_loader_flags(&mut loader, args)?;
    Ok(loader)
}

/// Layer defaults, the optional config file and command-line flags
pub fn build_configs(args: &AnalysisArgs) -> Result<(LoaderConfig, AnalysisConfig), String> {
    let ConfigFile {
        mut loader,
        mut analysis,
    } = config_file(&args.loader)?;
    apply_loader_flags(&mut loader, &args.loader)?;

    if let Some(min) = args.freq_min {
        analysis.frequencies.min = min;
    }
    if let Some(max) = args.freq_max {
        analysis.frequencies.max = max;
    }
    if let Some(step) = args.freq_step {
        analysis.frequencies.step = step;
    }
    if let Some(ref band) = args.band {
        if band.len() != 2 {
            return Err("--band takes exactly two values: LOW HIGH".to_string());
        }
        analysis.band = EventBand {
            low: band[0],
            high: band[1],
        };
    }
    if let Some(fom) = args.fom {
        analysis.detection.threshold_fom = fom;
    }
    if let Some(width) = args.width {
        analysis.tfr.width = width;
    }
    if let Some(ref name) = args.baseline {
        analysis.detection.baseline = BaselinePolicy::from_name(name)
            .ok_or_else(|| format!("Unknown baseline '{}'. Use pooled or per-trial", name))?;
    }
    if let Some(ref name) = args.region {
        analysis.detection.region = RegionMethod::from_name(name)
            .ok_or_else(|| format!("Unknown region method '{}'. Use threshold or half-maximum", name))?;
    }
    if let Some(ref name) = args.edge {
        analysis.detection.edge = EdgePolicy::from_name(name)
            .ok_or_else(|| format!("Unknown edge policy '{}'. Use truncate or discard", name))?;
    }
    if args.spectrogram {
        analysis.include_spectrogram = true;
    }

    analysis.validate().map_err(|e| e.to_string())?;

    Ok((loader, analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_flags() {
        let (loader, analysis) = build_configs(&AnalysisArgs::default()).unwrap();
        assert_eq!(loader, LoaderConfig::default());
        assert_eq!(analysis, AnalysisConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = AnalysisArgs {
            loader: LoaderArgs {
                sr: Some(1000.0),
                trial_axis: Some("columns".to_string()),
                ..Default::default()
            },
            band: Some(vec![13.0, 30.0]),
            fom: Some(4.0),
            baseline: Some("per-trial".to_string()),
            region: Some("fwhm".to_string()),
            edge: Some("discard".to_string()),
            spectrogram: true,
            ..Default::default()
        };
        let (loader, analysis) = build_configs(&args).unwrap();
        assert_eq!(loader.sampling_rate, 1000.0);
        assert!(loader.force_sampling_rate);
        assert!(!loader.force_epoch_start);
        assert_eq!(loader.trial_axis, TrialAxis::Columns);
        assert_eq!(analysis.band, EventBand { low: 13.0, high: 30.0 });
        assert_eq!(analysis.detection.threshold_fom, 4.0);
        assert_eq!(analysis.detection.baseline, BaselinePolicy::PerTrial);
        assert_eq!(analysis.detection.region, RegionMethod::HalfMaximum);
        assert_eq!(analysis.detection.edge, EdgePolicy::Discard);
        assert!(analysis.include_spectrogram);
    }

    #[test]
    fn test_config_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"loader": {{"sampling_rate": 250}}, "analysis": {{"detection": {{"threshold_fom": 3}}}}}}"#
        )
        .unwrap();

        let args = AnalysisArgs {
            loader: LoaderArgs {
                config: Some(file.path().to_str().unwrap().to_string()),
                ..Default::default()
            },
            fom: Some(5.0),
            ..Default::default()
        };
        let (loader, analysis) = build_configs(&args).unwrap();
        assert_eq!(loader.sampling_rate, 250.0);
        assert!(!loader.force_sampling_rate);
        assert_eq!(analysis.detection.threshold_fom, 5.0);
    }

    #[test]
    fn test_loader_config_matches_analysis_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"loader": {{"signal_variable": "lfp", "trial_axis": "columns"}}}}"#
        )
        .unwrap();

        let loader_args = LoaderArgs {
            config: Some(file.path().to_str().unwrap().to_string()),
            epoch_start: Some(-0.5),
            ..Default::default()
        };
        let loader = build_loader_config(&loader_args).unwrap();
        assert_eq!(loader.signal_variable, "lfp");
        assert_eq!(loader.trial_axis, TrialAxis::Columns);
        assert_eq!(loader.epoch_start, -0.5);
        assert!(loader.force_epoch_start);

        let analysis_args = AnalysisArgs {
            loader: loader_args,
            ..Default::default()
        };
        let (from_analysis, _) = build_configs(&analysis_args).unwrap();
        assert_eq!(from_analysis, loader);
    }

    #[test]
    fn test_loader_flags_rejected() {
        let bad_axis = LoaderArgs {
            trial_axis: Some("diagonal".to_string()),
            ..Default::default()
        };
        assert!(build_loader_config(&bad_axis).unwrap_err().contains("trial axis"));

        let bad_sr = LoaderArgs {
            sr: Some(-1.0),
            ..Default::default()
        };
        assert!(build_loader_config(&bad_sr).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_fom = AnalysisArgs {
            fom: Some(0.0),
            ..Default::default()
        };
        assert!(build_configs(&bad_fom).is_err());

        let bad_edge = AnalysisArgs {
            edge: Some("wrap".to_string()),
            ..Default::default()
        };
        assert!(build_configs(&bad_edge).unwrap_err().contains("edge policy"));

        let bad_band = AnalysisArgs {
            band: Some(vec![30.0, 15.0]),
            ..Default::default()
        };
        assert!(build_configs(&bad_band).is_err());
    }

    #[test]
    fn test_validate_file() {
        assert!(validate_file("/nonexistent/file.csv").is_err());

        let file = tempfile::Builder::new().suffix(".edf").tempfile().unwrap();
        let err = validate_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.contains("Unsupported"));
    }
}
