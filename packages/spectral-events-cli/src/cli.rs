use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "spectral-events",
    version,
    about = "Spectral event detection for multi-trial neural recordings",
    long_about = "Compute Morlet wavelet spectrograms and detect transient spectral events \
                  (e.g. beta bursts) per trial, summarised by trial condition.\n\
                  Reads MATLAB (.mat), JSON and delimited text (.csv/.txt) subject files."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Worker threads for trial-parallel computation (default: all cores)
    #[arg(long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect spectral events in one subject file
    Detect(DetectArgs),
    /// Detect spectral events in every subject file of a directory
    Batch(BatchArgs),
    /// Check that a subject file can be loaded
    Validate(ValidateArgs),
    /// Show version, supported formats and profiling information
    Info(InfoArgs),
}

/// How subject files are read; shared by `detect`, `batch` and `validate`.
/// Unset flags fall back to `--config`, then to built-in defaults.
#[derive(Args, Clone, Default)]
pub struct LoaderArgs {
    /// Sampling rate in Hz (wins over a rate recorded in the file)
    #[arg(long)]
    pub sr: Option<f64>,

    /// Time of the first sample relative to the epoch reference, in seconds
    #[arg(long, allow_hyphen_values = true)]
    pub epoch_start: Option<f64>,

    /// Signal matrix variable name (MAT files)
    #[arg(long)]
    pub signal_var: Option<String>,

    /// Condition label variable name (MAT files)
    #[arg(long)]
    pub label_var: Option<String>,

    /// Orientation of the signal matrix: rows (trials x samples) or columns
    #[arg(long)]
    pub trial_axis: Option<String>,

    /// JSON config file with "loader" and "analysis" sections
    #[arg(long)]
    pub config: Option<String>,
}

/// Loader and analysis options shared by `detect` and `batch`
#[derive(Args, Clone, Default)]
pub struct AnalysisArgs {
    #[command(flatten)]
    pub loader: LoaderArgs,

    /// Lowest analysed frequency in Hz
    #[arg(long)]
    pub freq_min: Option<f64>,

    /// Highest analysed frequency in Hz
    #[arg(long)]
    pub freq_max: Option<f64>,

    /// Frequency step in Hz
    #[arg(long)]
    pub freq_step: Option<f64>,

    /// Event band as LOW HIGH in Hz
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub band: Option<Vec<f64>>,

    /// Threshold as a factor of the per-frequency median power
    #[arg(long)]
    pub fom: Option<f64>,

    /// Morlet wavelet width in cycles
    #[arg(long)]
    pub width: Option<f64>,

    /// Median baseline: pooled or per-trial
    #[arg(long)]
    pub baseline: Option<String>,

    /// Event extent: threshold or half-maximum
    #[arg(long)]
    pub region: Option<String>,

    /// Events touching the spectrogram border: truncate or discard
    #[arg(long)]
    pub edge: Option<String>,

    /// Include per-condition average spectrograms in the output
    #[arg(long, default_value_t = false)]
    pub spectrogram: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct DetectArgs {
    /// Subject file (MAT, JSON, CSV/TXT)
    #[arg(long)]
    pub file: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Directory holding one file per subject
    #[arg(long, env = "SPECTRAL_EVENTS_DATA_DIR")]
    pub data_dir: Option<String>,

    /// File name pattern inside the data directory
    #[arg(long)]
    pub pattern: Option<String>,

    /// Explicit subject files (takes precedence over --data-dir)
    #[arg(long, num_args = 1..)]
    pub files: Option<Vec<String>>,

    /// Write one <subject>_events.json per subject here (default: JSON lines on stdout)
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Keep going after a subject fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// List the subject files that would be processed and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Subject file path
    #[arg(long)]
    pub file: String,

    #[command(flatten)]
    pub loader: LoaderArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
