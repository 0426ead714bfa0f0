use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use serde::Serialize;
use spectral_events::profiling::PROFILE_ENV_VAR;
use spectral_events::{get_profile_log_location, AnalysisConfig, FileType, LoaderConfig};

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    platform: String,
    arch: String,
    threads: usize,
    supported_extensions: Vec<&'static str>,
    profile_env_var: &'static str,
    profile_log: String,
    default_loader: LoaderConfig,
    default_analysis: AnalysisConfig,
}

pub fn execute(args: InfoArgs) -> i32 {
    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        threads: rayon::current_num_threads(),
        supported_extensions: FileType::supported_extensions().to_vec(),
        profile_env_var: PROFILE_ENV_VAR,
        profile_log: get_profile_log_location(),
        default_loader: LoaderConfig::default(),
        default_analysis: AnalysisConfig::default(),
    };

    if args.json {
        match output::to_json(&info, false) {
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
    } else {
        println!("spectral-events CLI v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!("Worker threads: {}", info.threads);
        println!();
        println!("Supported formats: {}", info.supported_extensions.join(", "));
        println!(
            "Defaults: {}-{} Hz step {}, band [{}, {}] Hz, FOM {}, width {}",
            info.default_analysis.frequencies.min,
            info.default_analysis.frequencies.max,
            info.default_analysis.frequencies.step,
            info.default_analysis.band.low,
            info.default_analysis.band.high,
            info.default_analysis.detection.threshold_fom,
            info.default_analysis.tfr.width
        );
        println!(
            "Profiling: set ${} to append stage timings to {}",
            info.profile_env_var, info.profile_log
        );
    }

    exit_codes::SUCCESS
}
