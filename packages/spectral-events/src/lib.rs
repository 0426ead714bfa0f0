pub mod aggregate;
pub mod analysis;
pub mod detect;
pub mod error;
pub mod loader;
pub mod mmap_utils;
pub mod parser;
pub mod profiling;
pub mod tfr;
pub mod types;

pub use aggregate::{
    average_spectrogram, event_count_contrast, summarize_by_condition, trials_with_label,
    AverageSpectrogram, ConditionSummary, EventCountContrast,
};
pub use analysis::{analyze_subject, AnalysisConfig, ConditionSpectrogram, SubjectAnalysis};
pub use detect::{find_events, median, Baseline};
pub use error::{Result, SpectralEventsError};
pub use loader::{discover_subject_files, load_subject, FileType, LoaderConfig, SubjectData, TrialAxis};
pub use profiling::{get_profile_log_location, ProfileScope};
pub use tfr::{compute_tfr, MorletWavelet, Tfr};
pub use types::*;
