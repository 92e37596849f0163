use anyhow::{Context, Result};
use clap::Parser;
use groove_hvo::{Args, PipelineConfig, USAGE, midi_to_monotonic_midi, process};
use log::{LevelFilter, debug, error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let Some(source) = args.source.as_deref() else {
        error!("No source given..!");
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    let mut config = match args.config.as_deref() {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_args(&args);
    debug!("Pipeline config: {:?}", config);

    if let Some(out) = args.render_monotonic.as_deref() {
        info!("Rendering the monotonic line of '{}'...", source.display());
        let mono = midi_to_monotonic_midi(source, out, &config)
            .with_context(|| format!("Failed to render {}", source.display()))?;
        info!(
            "Wrote {} monotonic hits over {} steps to '{}'..!",
            mono.hit_count(),
            mono.steps(),
            out.display()
        );
        return Ok(());
    }

    info!("Processing MIDI corpus: '{}'...", source.display());
    let report = process(source, &args.processed_dir, &config, args.aug_params.as_deref())?;

    println!(
        "training: {} pairs, {} errors",
        report.training.pairs_written, report.training.errors
    );
    println!(
        "test: {} pairs, {} errors",
        report.test.pairs_written, report.test.errors
    );
    println!(
        "validation: {} pairs, {} errors",
        report.validation.pairs_written, report.validation.errors
    );
    println!(
        "total: {} pairs accepted, {} errors",
        report.pairs_written(),
        report.errors()
    );

    Ok(())
}
