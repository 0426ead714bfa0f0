use crate::analysis_params;
use crate::cli::BatchArgs;
use crate::exit_codes;
use crate::output;
use spectral_events::{
    analyze_subject, discover_subject_files, load_subject, AnalysisConfig, LoaderConfig,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn execute(args: BatchArgs) -> i32 {
    let (loader, config) = match analysis_params::build_configs(&args.analysis) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let files = match resolve_files(&args, &loader) {
        Ok(f) => f,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    if files.is_empty() {
        eprintln!("Error: No matching files found");
        return exit_codes::INPUT_ERROR;
    }

    // Dry-run mode: print file list and exit
    if args.dry_run {
        for f in &files {
            println!("{}", f.display());
        }
        if !args.analysis.quiet {
            eprintln!("Found {} file(s)", files.len());
        }
        return exit_codes::SUCCESS;
    }

    if let Some(ref dir) = args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Error: Failed to create output directory '{}': {}", dir, e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    let total = files.len();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut total_events = 0usize;
    let start_time = Instant::now();

    for (i, path) in files.iter().enumerate() {
        if !args.analysis.quiet {
            eprintln!("[{}/{}] {}...", i + 1, total, path.display());
        }

        match process_subject(path, &loader, &config, &args) {
            Ok(events) => {
                total_events += events;
                succeeded += 1;
                if !args.analysis.quiet {
                    eprintln!("  {} events", events);
                }
            }
            Err(msg) => {
                eprintln!("  Error: {}", msg);
                failed += 1;
                if !args.continue_on_error {
                    break;
                }
            }
        }
    }

    if !args.analysis.quiet {
        eprintln!(
            "Batch complete: {}/{} succeeded, {}/{} failed, {} events, {:.1}s",
            succeeded,
            total,
            failed,
            total,
            total_events,
            start_time.elapsed().as_secs_f64()
        );
    }

    if failed == 0 {
        exit_codes::SUCCESS
    } else if succeeded > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::EXECUTION_ERROR
    }
}

/// Load, analyse and write one subject; returns its event count
fn process_subject(
    path: &Path,
    loader: &LoaderConfig,
    config: &AnalysisConfig,
    args: &BatchArgs,
) -> Result<usize, String> {
    let data = load_subject(loader, path).map_err(|e| format!("Failed to load: {}", e))?;
    let analysis = analyze_subject(&data, config).map_err(|e| format!("Analysis failed: {}", e))?;

    match args.output_dir {
        Some(ref dir) => {
            let json = output::to_json(&analysis, args.analysis.compact)?;
            let out_path = output::subject_output_path(Path::new(dir), &analysis.subject);
            output::write_output(&json, Some(&out_path))?;
        }
        None => {
            // JSON lines on stdout
            let json = output::to_json(&analysis, true)?;
            output::write_output(&json, None)?;
        }
    }

    Ok(analysis.total_events)
}

fn resolve_files(args: &BatchArgs, loader: &LoaderConfig) -> Result<Vec<PathBuf>, String> {
    if let Some(ref files) = args.files {
        return Ok(files.iter().map(PathBuf::from).collect());
    }

    let mut loader = loader.clone();
    match args.data_dir {
        Some(ref dir) => loader.data_dir = PathBuf::from(dir),
        None if args.analysis.loader.config.is_none() => {
            return Err(
                "One of --data-dir (or $SPECTRAL_EVENTS_DATA_DIR), --files or --config must be specified"
                    .to_string(),
            )
        }
        None => {}
    }
    if let Some(ref pattern) = args.pattern {
        loader.file_pattern = pattern.clone();
    }

    discover_subject_files(&loader).map_err(|e| e.to_string())
}
