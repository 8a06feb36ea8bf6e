use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use libbeammap_cleaner::config::Config;
use libbeammap_cleaner::error::ProcessorError;
use libbeammap_cleaner::process::{process, CleaningReport, ProcessOptions};

const LOG_FILE: &str = "beammap_cleaner.log";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn build_cli() -> Command {
    Command::new("beammap_cleaner_cli")
        .about("Resolve overlapping and misplaced resonators in a rough MKID beammap")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Write a template beammap config to --path"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Beammap config file (YAML)"),
        )
        .arg(
            Arg::new("place-failed")
                .long("place-failed")
                .action(ArgAction::SetTrue)
                .help("Randomly place resonators left without a pixel"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .default_value("0")
                .help("Seed for --place-failed"),
        )
}

/// The config path, given either before or after the subcommand
fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .subcommand()
        .and_then(|(_, sub)| sub.get_one::<String>("path"))
        .or_else(|| matches.get_one::<String>("path"))
        .map(PathBuf::from)
}

fn write_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = serde_yaml::to_string(&Config::default())?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Terminal output at info, the log file at debug, both routed around the progress bars
fn init_logging() -> MultiProgress {
    let log_file = File::create(LOG_FILE).expect("Could not create the beammap_cleaner log file");
    let logger = simplelog::CombinedLogger::new(vec![
        simplelog::TermLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        ),
        simplelog::WriteLogger::new(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            log_file,
        ),
    ]);

    let bars = MultiProgress::new();
    LogWrapper::new(bars.clone(), logger)
        .try_init()
        .expect("Could not start logging");
    bars
}

fn log_config(config: &Config, options: &ProcessOptions) {
    log::info!(
        "Beammaps in {}: {} -> {}",
        config.beammap_directory.display(),
        config.rough_beammap_file.display(),
        config.final_beammap_file.display()
    );
    log::info!(
        "{} array of {} rows x {} cols, flipped: {}",
        config.instrument,
        config.num_rows,
        config.num_cols,
        config.flip
    );
    if options.place_failed_pixels {
        log::info!("Failed pixels will be placed using seed {}", options.seed);
    }
}

/// Follow the cleaning thread on a progress bar until it finishes
fn watch(
    bar: &ProgressBar,
    status: &Mutex<f32>,
    handle: JoinHandle<Result<CleaningReport, ProcessorError>>,
) {
    while !handle.is_finished() {
        if let Ok(progress) = status.lock() {
            bar.set_position((*progress * 100.0) as u64);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    match handle.join() {
        Ok(Ok(report)) => {
            bar.finish_with_message("cleaned");
            log::info!("{}", report.overlaps);
            log::info!("Final flags -- {}", report.flag_counts);
        }
        Ok(Err(e)) => {
            bar.abandon_with_message("failed");
            log::error!("Beammap cleaning failed: {e}. See {LOG_FILE} for the full log.");
        }
        Err(_) => {
            bar.abandon_with_message("failed");
            log::error!("The cleaning thread panicked");
        }
    }
}

fn main() {
    let matches = build_cli().get_matches();
    let bars = init_logging();

    let Some(path) = config_path(&matches) else {
        log::error!("No config given; pass one with -p/--path");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        match write_template_config(&path) {
            Ok(()) => log::info!("Wrote template beammap config to {}", path.display()),
            Err(e) => log::error!("Could not write template config {}: {e}", path.display()),
        }
        return;
    }

    let options = ProcessOptions {
        place_failed_pixels: matches.get_flag("place-failed"),
        seed: matches.get_one::<u64>("seed").copied().unwrap_or_default(),
    };

    let config = match Config::read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Bad beammap config {}: {e}", path.display());
            return;
        }
    };
    log_config(&config, &options);

    let bar = bars.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}") {
        bar.set_style(style);
    }
    let status = Arc::new(Mutex::new(0.0));
    let worker_status = Arc::clone(&status);
    let handle = std::thread::spawn(move || process(&config, &options, worker_status));

    watch(&bar, &status, handle);
}
