use crate::error::{Result, SpectralEventsError};
use crate::mmap_utils::mmap_file;
use crate::parser::parse_labelled_rows;
use crate::types::TimeSeries;
use matfile::{MatFile, NumericData};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Orientation of the signal matrix inside a MAT file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialAxis {
    /// trials × samples
    #[default]
    Rows,
    /// samples × trials
    Columns,
}

impl TrialAxis {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rows" | "row" => Some(TrialAxis::Rows),
            "columns" | "column" | "cols" => Some(TrialAxis::Columns),
            _ => None,
        }
    }
}

/// Where subject files live and how to read them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub data_dir: PathBuf,
    pub file_pattern: String,
    pub signal_variable: String,
    pub label_variable: String,
    /// Hz; JSON inputs may record their own unless `force_sampling_rate` is set
    pub sampling_rate: f64,
    /// Time of the first sample relative to the epoch's reference event (s)
    pub epoch_start: f64,
    pub trial_axis: TrialAxis,
    /// Use `sampling_rate` even for files that record one
    pub force_sampling_rate: bool,
    /// Use `epoch_start` even for files that record one
    pub force_epoch_start: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            file_pattern: "*.mat".to_string(),
            signal_variable: "prestim_raw_yes_no".to_string(),
            label_variable: "YorN".to_string(),
            sampling_rate: 600.0,
            epoch_start: -1.0,
            trial_axis: TrialAxis::Rows,
            force_sampling_rate: false,
            force_epoch_start: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Mat,
    Json,
    Csv,
    Text,
}

impl FileType {
    pub fn from_extension(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mat" => Ok(FileType::Mat),
            "json" => Ok(FileType::Json),
            "csv" => Ok(FileType::Csv),
            "txt" | "ascii" => Ok(FileType::Text),
            _ => Err(SpectralEventsError::UnsupportedFileType(format!(
                "{} (expected .mat, .json, .csv or .txt)",
                path.display()
            ))),
        }
    }

    pub fn supported_extensions() -> &'static [&'static str] {
        &["mat", "json", "csv", "txt", "ascii"]
    }
}

/// One subject's trials and per-trial condition labels
#[derive(Debug, Clone, Serialize)]
pub struct SubjectData {
    pub subject: String,
    pub source: PathBuf,
    pub series: TimeSeries,
    pub labels: Vec<i64>,
}

impl SubjectData {
    pub fn new(subject: impl Into<String>, series: TimeSeries, labels: Vec<i64>) -> Result<Self> {
        if labels.len() != series.num_trials() {
            return Err(SpectralEventsError::InputShape(format!(
                "{} labels for {} trials",
                labels.len(),
                series.num_trials()
            )));
        }
        Ok(Self {
            subject: subject.into(),
            source: PathBuf::new(),
            series,
            labels,
        })
    }
}

#[derive(Debug, Deserialize)]
struct JsonSubject {
    signal: Vec<Vec<f64>>,
    labels: Vec<f64>,
    #[serde(default)]
    sampling_rate: Option<f64>,
    #[serde(default)]
    epoch_start: Option<f64>,
}

/// Find subject files under `data_dir` matching `file_pattern`, sorted by path
pub fn discover_subject_files(config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    if !config.data_dir.is_dir() {
        return Err(SpectralEventsError::FileNotFound(format!(
            "Data directory not found: {}",
            config.data_dir.display()
        )));
    }

    let pattern = config.data_dir.join(&config.file_pattern);
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern).map_err(|e| {
        SpectralEventsError::ParameterRange(format!("Invalid file pattern '{}': {}", pattern, e))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Skipping unreadable path: {}", e);
                None
            }
        })
        .collect();
    files.sort();

    log::info!("Found {} subject files matching {}", files.len(), pattern);
    Ok(files)
}

/// Load one subject file; the subject name is the file stem
pub fn load_subject(config: &LoaderConfig, path: &Path) -> Result<SubjectData> {
    crate::profile_scope!("load_subject");

    if !path.exists() {
        return Err(SpectralEventsError::FileNotFound(path.display().to_string()));
    }
    let file_type = FileType::from_extension(path)?;
    let subject = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "subject".to_string());

    log::debug!("Loading {} as {:?}", path.display(), file_type);

    let (series, labels) = match file_type {
        FileType::Mat => load_mat(config, path)?,
        FileType::Json => load_json(config, path)?,
        FileType::Csv | FileType::Text => load_delimited(config, path)?,
    };

    let mut data = SubjectData::new(subject, series, labels)?;
    data.source = path.to_path_buf();

    log::info!(
        "Loaded subject {}: {} trials x {} samples at {} Hz",
        data.subject,
        data.series.num_trials(),
        data.series.num_samples(),
        data.series.sampling_rate()
    );
    Ok(data)
}

fn load_delimited(config: &LoaderConfig, path: &Path) -> Result<(TimeSeries, Vec<i64>)> {
    let mmap = mmap_file(path)?;
    let rows = parse_labelled_rows(&mmap[..])?;
    let series = TimeSeries::new(rows.trials, config.sampling_rate, config.epoch_start)?;
    Ok((series, rows.labels))
}

fn load_json(config: &LoaderConfig, path: &Path) -> Result<(TimeSeries, Vec<i64>)> {
    let reader = BufReader::new(File::open(path)?);
    let parsed: JsonSubject = serde_json::from_reader(reader)?;

    let labels = labels_from_values(&parsed.labels)?;
    let sampling_rate = pick_timing(
        "sampling rate",
        parsed.sampling_rate,
        config.sampling_rate,
        config.force_sampling_rate,
        path,
    );
    let epoch_start = pick_timing(
        "epoch start",
        parsed.epoch_start,
        config.epoch_start,
        config.force_epoch_start,
        path,
    );
    let series = TimeSeries::new(parsed.signal, sampling_rate, epoch_start)?;
    Ok((series, labels))
}

/// Choose between a value recorded in the file and the configured one
fn pick_timing(
    what: &str,
    recorded: Option<f64>,
    configured: f64,
    force: bool,
    path: &Path,
) -> f64 {
    match recorded {
        Some(value) if value != configured && force => {
            log::warn!(
                "{}: ignoring recorded {} {} in favour of {}",
                path.display(),
                what,
                value,
                configured
            );
            configured
        }
        Some(value) if !force => {
            if value != configured {
                log::info!("{}: using recorded {} {}", path.display(), what, value);
            }
            value
        }
        _ => configured,
    }
}

fn load_mat(config: &LoaderConfig, path: &Path) -> Result<(TimeSeries, Vec<i64>)> {
    let file = File::open(path)?;
    let mat_file = MatFile::parse(BufReader::new(file)).map_err(|e| {
        SpectralEventsError::Parse(format!("Failed to parse {}: {:?}", path.display(), e))
    })?;

    let signal = mat_file
        .find_by_name(&config.signal_variable)
        .ok_or_else(|| {
            SpectralEventsError::MissingVariable(format!(
                "'{}' not found in {}",
                config.signal_variable,
                path.display()
            ))
        })?;
    let size = signal.size();
    if size.len() != 2 {
        return Err(SpectralEventsError::InputShape(format!(
            "'{}' must be a 2-D matrix, got {} dimensions",
            config.signal_variable,
            size.len()
        )));
    }
    let matrix = column_major_to_rows(&numeric_to_f64(signal.data()), size[0], size[1])?;
    let trials = match config.trial_axis {
        TrialAxis::Rows => matrix,
        TrialAxis::Columns => transpose(&matrix),
    };

    let label_array = mat_file
        .find_by_name(&config.label_variable)
        .ok_or_else(|| {
            SpectralEventsError::MissingVariable(format!(
                "'{}' not found in {}",
                config.label_variable,
                path.display()
            ))
        })?;
    // Row and column vectors are both accepted
    let labels = labels_from_values(&numeric_to_f64(label_array.data()))?;

    let series = TimeSeries::new(trials, config.sampling_rate, config.epoch_start)?;
    Ok((series, labels))
}

fn numeric_to_f64(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
    }
}

/// MATLAB stores matrices column-major: element (r, c) is at `c * rows + r`
fn column_major_to_rows(flat: &[f64], rows: usize, cols: usize) -> Result<Vec<Vec<f64>>> {
    if flat.len() < rows * cols {
        return Err(SpectralEventsError::InputShape(format!(
            "Data size mismatch: expected {} elements, got {}",
            rows * cols,
            flat.len()
        )));
    }
    Ok((0..rows)
        .map(|r| (0..cols).map(|c| flat[c * rows + r]).collect())
        .collect())
}

fn transpose(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let cols = matrix.first().map(|r| r.len()).unwrap_or(0);
    (0..cols)
        .map(|c| matrix.iter().map(|row| row[c]).collect())
        .collect()
}

fn labels_from_values(values: &[f64]) -> Result<Vec<i64>> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(SpectralEventsError::Parse(format!(
                    "Condition label {} is not an integer",
                    v
                )))
            }
        })
        .collect()
}
