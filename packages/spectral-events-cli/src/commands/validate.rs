use crate::analysis_params;
use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use spectral_events::{load_subject, FileType, SubjectData};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
struct ValidateOutput {
    file: String,
    exists: bool,
    supported: bool,
    loaded: bool,
    file_type: Option<String>,
    size_bytes: Option<u64>,
    num_trials: Option<usize>,
    num_samples: Option<usize>,
    sampling_rate: Option<f64>,
    /// Trial count per condition label
    label_counts: Option<BTreeMap<i64, usize>>,
    error: Option<String>,
}

fn label_counts(data: &SubjectData) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in &data.labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

pub fn execute(args: ValidateArgs) -> i32 {
    let path = Path::new(&args.file);
    let exists = path.is_file();
    let file_type = FileType::from_extension(path).ok();
    let size_bytes = std::fs::metadata(path).ok().map(|m| m.len());

    let loader = match analysis_params::build_loader_config(&args.loader) {
        Ok(l) => l,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let (data, error) = if !exists {
        (None, Some(format!("File not found: {}", args.file)))
    } else if file_type.is_none() {
        (
            None,
            Some(format!(
                "Unsupported file extension. Supported: {}",
                FileType::supported_extensions().join(", ")
            )),
        )
    } else {
        match load_subject(&loader, path) {
            Ok(d) => (Some(d), None),
            Err(e) => (None, Some(e.to_string())),
        }
    };

    let result = ValidateOutput {
        file: args.file.clone(),
        exists,
        supported: file_type.is_some(),
        loaded: data.is_some(),
        file_type: file_type.map(|ft| format!("{:?}", ft)),
        size_bytes,
        num_trials: data.as_ref().map(|d| d.series.num_trials()),
        num_samples: data.as_ref().map(|d| d.series.num_samples()),
        sampling_rate: data.as_ref().map(|d| d.series.sampling_rate()),
        label_counts: data.as_ref().map(label_counts),
        error: error.clone(),
    };

    if args.json {
        match output::to_json(&result, false) {
            Ok(json) => {
                if let Err(e) = output::write_output(&json, None) {
                    eprintln!("Error: {}", e);
                    return exit_codes::EXECUTION_ERROR;
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else if let Some(ref err) = error {
        eprintln!("Error: {}", err);
    } else {
        let labels = result
            .label_counts
            .as_ref()
            .map(|counts| {
                counts
                    .iter()
                    .map(|(label, n)| format!("{}: {}", label, n))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!(
            "File '{}' is valid ({}, {} trials x {} samples at {} Hz; labels {})",
            args.file,
            result.file_type.as_deref().unwrap_or_default(),
            result.num_trials.unwrap_or(0),
            result.num_samples.unwrap_or(0),
            result.sampling_rate.unwrap_or(0.0),
            labels
        );
    }

    if error.is_some() {
        exit_codes::INPUT_ERROR
    } else {
        exit_codes::SUCCESS
    }
}
