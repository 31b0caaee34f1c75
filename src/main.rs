use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use veg_metrics_rust_lib::{
    analyze_canopy, analyze_profile, analyze_quadrat, get_image_files_in_dir, load_image,
    process_batch, write_canopy_csv, write_profile_csv, write_quadrat_csv, write_session_json,
    AnalysisMode, BatchOptions, CancelToken, CanopyRequest, ColorRuleClassifier, Config,
    ItemOutcome, MeasurementResult, MethodChoice, ProfileRequest, QuadratRequest, SessionEntry,
    SessionFailure, SessionRecord,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "VegMetricsR - Vegetation Metrics from Field Photographs")]
struct Args {
    /// Path to input file or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Analysis mode (overwrites config)
    #[clap(short, long)]
    mode: Option<ModeArg>,

    /// Classification method (overwrites config)
    #[clap(long)]
    method: Option<MethodArg>,

    /// Zenith angle in degrees for canopy mode (overwrites config)
    #[clap(long)]
    zenith: Option<f64>,

    /// Worker count for batch processing (overwrites config)
    #[clap(short, long)]
    jobs: Option<usize>,

    /// Enable debug mode (print per-frame details)
    #[clap(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Canopy,
    Profile,
    Quadrat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    BrightnessGreenness,
    ColorRatio,
    ColorThreshold,
    EdgeDetection,
    HeuristicCluster,
    BrightnessThreshold,
}

/// Main function
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; a missing file falls back to defaults so the CLI
    // works with flags alone.
    let mut config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        Config::default()
    };

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }

    if let Some(output) = args.output.clone() {
        config.output_dir = output;
    }

    if let Some(mode) = args.mode {
        config.analysis_mode = match mode {
            ModeArg::Canopy => AnalysisMode::Canopy,
            ModeArg::Profile => AnalysisMode::Profile,
            ModeArg::Quadrat => AnalysisMode::Quadrat,
        };
    }

    if let Some(method) = args.method {
        config.method = match method {
            MethodArg::BrightnessGreenness => MethodChoice::BrightnessGreenness,
            MethodArg::ColorRatio => MethodChoice::ColorRatio,
            MethodArg::ColorThreshold => MethodChoice::ColorThreshold,
            MethodArg::EdgeDetection => MethodChoice::EdgeDetection,
            MethodArg::HeuristicCluster => MethodChoice::HeuristicCluster,
            MethodArg::BrightnessThreshold => MethodChoice::BrightnessThreshold,
        };
    }

    if let Some(zenith) = args.zenith {
        config.zenith_angle_deg = zenith;
    }

    if let Some(jobs) = args.jobs {
        config.concurrency = jobs;
    }

    config.validate()?;

    let start_time = Instant::now();

    let input_path = PathBuf::from(&config.input_path);
    let files = if input_path.is_file() {
        vec![input_path]
    } else if input_path.is_dir() {
        println!("Processing directory: {}", input_path.display());
        get_image_files_in_dir(&input_path)?
    } else {
        anyhow::bail!("input path {} does not exist", input_path.display());
    };

    println!("Found {} image files", files.len());
    if files.is_empty() {
        anyhow::bail!("no image files to analyze");
    }

    let mut session = SessionRecord::new(config.site_name.clone(), config.note.clone());

    match config.analysis_mode {
        AnalysisMode::Canopy => run_canopy_batch(&config, &files, args.debug, &mut session)?,
        AnalysisMode::Quadrat => run_quadrat_batch(&config, &files, args.debug, &mut session)?,
        AnalysisMode::Profile => run_profile(&config, &files, args.debug, &mut session)?,
    }

    write_session_json(&session, &config.output_dir)
        .context("failed to write session record")?;

    if !session.failures.is_empty() {
        println!("{} file(s) failed:", session.failures.len());
        for failure in &session.failures {
            eprintln!("  {}: {}", failure.filename, failure.message);
        }
    }

    let elapsed = start_time.elapsed();
    println!(
        "Analyzed {} of {} file(s) in {:.2} seconds",
        session.entries.len(),
        files.len(),
        elapsed.as_secs_f64()
    );

    Ok(())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn effective_concurrency(config: &Config) -> usize {
    if config.use_parallel {
        config.concurrency
    } else {
        1
    }
}

fn run_canopy_batch(
    config: &Config,
    files: &[PathBuf],
    debug: bool,
    session: &mut SessionRecord,
) -> anyhow::Result<()> {
    let method = config.resolve_method();
    let zenith = config.zenith_angle_deg;

    let worker = |path: &PathBuf| {
        let input = load_image(path)?;
        let request = CanopyRequest::new(&input.buffer, method).with_zenith_angle(zenith);
        analyze_canopy(&request)
    };

    let cancel = CancelToken::new();
    let on_item_done = |done: usize, total: usize| {
        println!("Processed {}/{} frames", done, total);
    };
    let options = BatchOptions::with_concurrency(effective_concurrency(config))
        .cancel_token(&cancel)
        .on_item_done(&on_item_done);

    let outcomes = process_batch(files, worker, &options)?;

    let mut rows = Vec::new();
    for (path, outcome) in files.iter().zip(outcomes) {
        let filename = stem_of(path);
        match outcome {
            ItemOutcome::Completed(result) => {
                if debug {
                    println!(
                        "{}: cover {:.2}%, transmission {:.2}%, LAI {:?}",
                        filename,
                        result.canopy_cover_pct,
                        result.light_transmission_pct,
                        result.leaf_area_index
                    );
                }
                session.entries.push(SessionEntry {
                    filename: filename.clone(),
                    result: MeasurementResult::Canopy(result.clone()),
                });
                rows.push((filename, result));
            }
            ItemOutcome::Failed(failure) => session.failures.push(SessionFailure {
                filename,
                message: failure.message,
            }),
            ItemOutcome::Cancelled => session.failures.push(SessionFailure {
                filename,
                message: "cancelled before start".to_string(),
            }),
        }
    }

    write_canopy_csv(&rows, &config.output_dir).context("failed to write canopy CSV")?;
    Ok(())
}

fn run_quadrat_batch(
    config: &Config,
    files: &[PathBuf],
    debug: bool,
    session: &mut SessionRecord,
) -> anyhow::Result<()> {
    let classifier = ColorRuleClassifier;

    let worker = |path: &PathBuf| {
        let input = load_image(path)?;
        let request = QuadratRequest::new(&input.buffer, &classifier);
        analyze_quadrat(&request)
    };

    let cancel = CancelToken::new();
    let options =
        BatchOptions::with_concurrency(effective_concurrency(config)).cancel_token(&cancel);

    let outcomes = process_batch(files, worker, &options)?;

    let mut rows = Vec::new();
    for (path, outcome) in files.iter().zip(outcomes) {
        let filename = stem_of(path);
        match outcome {
            ItemOutcome::Completed(result) => {
                if debug {
                    println!(
                        "{}: vegetation {:.2}%, litter {:.2}%, bare {:.2}%, rock {:.2}%",
                        filename,
                        result.vegetation_pct,
                        result.litter_pct,
                        result.bare_soil_pct,
                        result.rock_pct
                    );
                }
                session.entries.push(SessionEntry {
                    filename: filename.clone(),
                    result: MeasurementResult::Quadrat(result.clone()),
                });
                rows.push((filename, result));
            }
            ItemOutcome::Failed(failure) => session.failures.push(SessionFailure {
                filename,
                message: failure.message,
            }),
            ItemOutcome::Cancelled => session.failures.push(SessionFailure {
                filename,
                message: "cancelled before start".to_string(),
            }),
        }
    }

    write_quadrat_csv(&rows, &config.output_dir).context("failed to write quadrat CSV")?;
    Ok(())
}

fn run_profile(
    config: &Config,
    files: &[PathBuf],
    debug: bool,
    session: &mut SessionRecord,
) -> anyhow::Result<()> {
    // One photo per configured height, in directory order.
    let mut buffers = Vec::with_capacity(files.len());
    for path in files {
        println!("Loading: {}", path.display());
        buffers.push(load_image(path)?.buffer);
    }

    let method = config.resolve_method();
    let request = ProfileRequest::new(&buffers, &config.sample_heights_cm, method);
    let profile = analyze_profile(&request).context("profile analysis failed")?;

    if debug {
        for reading in &profile.readings {
            println!(
                "{} cm: coverage {:.2}%, density index {:.2}",
                reading.height_cm, reading.coverage_pct, reading.density_index
            );
        }
    }
    println!(
        "Average cover {:.2}% ({}), height diversity {:.3}",
        profile.average_cover_pct,
        profile.profile.as_str(),
        profile.height_diversity
    );

    write_profile_csv(&profile, &config.output_dir).context("failed to write profile CSV")?;
    session.entries.push(SessionEntry {
        filename: "profile".to_string(),
        result: MeasurementResult::Profile(profile),
    });

    Ok(())
}
