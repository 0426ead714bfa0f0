use crate::analysis_params;
use crate::cli::DetectArgs;
use crate::exit_codes;
use crate::output;
use spectral_events::{analyze_subject, load_subject};
use std::path::Path;

pub fn execute(args: DetectArgs) -> i32 {
    if let Err(msg) = analysis_params::validate_file(&args.file) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }

    let (loader, config) = match analysis_params::build_configs(&args.analysis) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let data = match load_subject(&loader, Path::new(&args.file)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: Failed to load '{}': {}", args.file, e);
            return exit_codes::INPUT_ERROR;
        }
    };

    if !args.analysis.quiet {
        eprintln!("Detecting spectral events in {}...", args.file);
        eprintln!(
            "  Trials: {} x {} samples at {} Hz",
            data.series.num_trials(),
            data.series.num_samples(),
            data.series.sampling_rate()
        );
        eprintln!(
            "  Band: [{}, {}] Hz, FOM {}",
            config.band.low, config.band.high, config.detection.threshold_fom
        );
    }

    let analysis = match analyze_subject(&data, &config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: Analysis failed: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };

    let json = match output::to_json(&analysis, args.analysis.compact) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    };
    if let Err(e) = output::write_output(&json, args.output.as_deref().map(Path::new)) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    if !args.analysis.quiet {
        eprintln!(
            "Found {} events in {} trials",
            analysis.total_events, analysis.num_trials
        );
        if let Some(ref path) = args.output {
            eprintln!("Results written to {}", path);
        }
    }

    exit_codes::SUCCESS
}
