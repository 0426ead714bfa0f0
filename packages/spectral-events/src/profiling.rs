use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Set to any value to append stage timings to the profile log file
pub const PROFILE_ENV_VAR: &str = "SPECTRAL_EVENTS_PROFILE";

/// Logs the wall-clock time of a pipeline stage when dropped
pub struct ProfileScope {
    label: String,
    start: Instant,
}

impl ProfileScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        log::debug!("[PROFILE] {} - {:.3}ms", self.label, elapsed_ms);

        if std::env::var_os(PROFILE_ENV_VAR).is_some() {
            if let Err(e) = write_profile_log(&self.label, elapsed_ms) {
                log::warn!("Failed to write profile log: {}", e);
            }
        }
    }
}

fn get_profile_log_path() -> PathBuf {
    let app_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spectral-events");

    std::fs::create_dir_all(&app_dir).ok();
    app_dir.join("performance_profile.log")
}

fn write_profile_log(label: &str, duration_ms: f64) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(get_profile_log_path())?;

    let timestamp = chrono::Utc::now().to_rfc3339();
    writeln!(file, "{} | {} | {:.3}ms", timestamp, label, duration_ms)?;

    Ok(())
}

/// Time the rest of the enclosing block
#[macro_export]
macro_rules! profile_scope {
    ($label:expr) => {
        let _profile_scope = $crate::profiling::ProfileScope::new($label);
    };
}

/// Where timings go when profiling is enabled
pub fn get_profile_log_location() -> String {
    get_profile_log_path()
        .to_str()
        .unwrap_or("Unknown")
        .to_string()
}
