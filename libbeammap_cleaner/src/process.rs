use std::sync::{Arc, Mutex};

use super::beammap_file::{read_rough_beammap, write_final_beammap_file};
use super::cleaner::{BeammapCleaner, FailedPlacementSummary};
use super::config::Config;
use super::error::ProcessorError;
use super::overlap::OverlapSummary;
use super::resonator::{FlagCounts, ResonatorTable};

/// Switches which are not part of the beammap configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Randomly place resonators left without a pixel. Off by default
    pub place_failed_pixels: bool,
    /// Seed for the random placement
    pub seed: u64,
}

/// What a cleaning pass did to the beammap
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub n_resonators: usize,
    pub n_wrong_feedline: usize,
    pub overlaps: OverlapSummary,
    pub failed_placement: Option<FailedPlacementSummary>,
    pub flag_counts: FlagCounts,
}

fn set_progress(status: &Mutex<f32>, progress: f32) {
    match status.lock() {
        Ok(mut stat) => *stat = progress,
        Err(e) => log::error!("Could not update progress: {e}"),
    }
}

/// Run a full cleaning pass over a loaded beammap, verifying the result
pub fn clean_beammap(
    table: ResonatorTable,
    config: &Config,
    options: &ProcessOptions,
    status: &Mutex<f32>,
) -> Result<(ResonatorTable, CleaningReport), ProcessorError> {
    let mut report = CleaningReport {
        n_resonators: table.len(),
        ..Default::default()
    };
    let mut cleaner = BeammapCleaner::new(table, config);

    log::info!("Validating feedlines...");
    report.n_wrong_feedline = cleaner.validate_feedlines()?;
    set_progress(status, 0.2);

    cleaner.build_grid()?;
    set_progress(status, 0.3);

    log::info!("Resolving overlaps...");
    report.overlaps = cleaner.resolve_overlaps()?;
    log::info!("{}", report.overlaps);
    set_progress(status, 0.7);

    if options.place_failed_pixels {
        log::info!("Placing failed pixels with seed {}...", options.seed);
        report.failed_placement = Some(cleaner.place_failed_pixels(options.seed)?);
    }
    set_progress(status, 0.8);

    cleaner.finalize()?;
    cleaner.verify()?;
    let table = cleaner.into_table();
    report.flag_counts = table.flag_counts();
    Ok((table, report))
}

/// The main entry point of the beammap cleaner.
///
/// Reads the rough beammap named by the config, cleans it, and writes the final beammap.
/// Nothing is written unless the whole pass succeeds. Progress is reported as a fraction
/// through the status.
pub fn process(
    config: &Config,
    options: &ProcessOptions,
    status: Arc<Mutex<f32>>,
) -> Result<CleaningReport, ProcessorError> {
    config.validate()?;
    let rough_path = config.get_rough_beammap_path()?;
    let final_path = config.get_final_beammap_path()?;
    set_progress(&status, 0.0);

    let table = read_rough_beammap(&rough_path)?;
    set_progress(&status, 0.1);

    let (table, report) = clean_beammap(table, config, options, &status)?;

    write_final_beammap_file(&final_path, &table)?;
    set_progress(&status, 1.0);
    log::info!("Done cleaning {} resonators.", report.n_resonators);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beammap_file::parse_rough_beammap;
    use crate::config::Instrument;
    use crate::error::ConfigError;
    use crate::flags::BeamMapFlag;
    use std::path::PathBuf;

    fn darkness_config(dir: PathBuf) -> Config {
        Config {
            num_rows: 125,
            num_cols: 80,
            flip: false,
            instrument: Instrument::Darkness,
            rough_beammap_file: PathBuf::from("rough.txt"),
            final_beammap_file: PathBuf::from("final.txt"),
            beammap_directory: dir,
        }
    }

    const ROUGH: &str = "10000 0 5.2 5.3\n\
                         10001 0 5.7 5.6\n\
                         10002 4 5.5 5.9\n\
                         10003 0 60.1 20.0\n\
                         20000 0 3.0 3.0\n\
                         20001 1 nan nan\n";

    #[test]
    fn test_process_writes_final_beammap() {
        let dir = std::env::temp_dir().join(format!("beammap_process_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("rough.txt"), ROUGH).unwrap();
        let config = darkness_config(dir.clone());
        let status = Arc::new(Mutex::new(0.0));

        let report = process(&config, &ProcessOptions::default(), status.clone()).unwrap();
        assert_eq!(report.n_resonators, 6);
        assert_eq!(report.n_wrong_feedline, 1);
        assert_eq!(report.overlaps.overlapping_cells, 1);
        assert_eq!(report.overlaps.resolved, 2);
        assert!(report.failed_placement.is_none());
        assert_eq!(*status.lock().unwrap(), 1.0);

        let written = std::fs::read_to_string(dir.join("final.txt")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[4], "20000 5 nan nan");
        assert_eq!(lines[5], "20001 1 nan nan");
        assert_eq!(lines[3], "10003 0 60 20");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_rough_file() {
        let config = darkness_config(PathBuf::from("/no/such/beammap/directory"));
        let status = Arc::new(Mutex::new(0.0));
        assert!(matches!(
            process(&config, &ProcessOptions::default(), status),
            Err(ProcessorError::ConfigError(ConfigError::MissingBeammapPath(_)))
        ));
    }

    #[test]
    fn test_clean_beammap_with_failed_placement() {
        let table = parse_rough_beammap(ROUGH).unwrap();
        let config = darkness_config(PathBuf::from("."));
        let options = ProcessOptions {
            place_failed_pixels: true,
            seed: 3,
        };
        let status = Mutex::new(0.0);
        let (table, report) = clean_beammap(table, &config, &options, &status).unwrap();
        let placement = report.failed_placement.unwrap();
        assert_eq!(placement.placed, 1);
        assert_eq!(placement.unplaceable, 0);
        assert_eq!(table.flag(5), BeamMapFlag::Failed);
        assert!(table.placed(5).is_some());
        assert_eq!(table.placed(4), None);
        assert_eq!(report.flag_counts.total(), 6);
    }
}
