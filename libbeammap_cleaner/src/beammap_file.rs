use fxhash::FxHashSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use super::constants::{ENTRIES_PER_LINE, UNPLACED_SENTINEL};
use super::error::BeammapFileError;
use super::flags::BeamMapFlag;
use super::resonator::ResonatorTable;

const COMMENT_PREFIX: char = '#';

/// Parse an integer column. Upstream tools save their tables as floats, so integral float
/// text ("20005.0", "2.0005e+04") is accepted too
fn parse_integer(token: &str) -> Option<i64> {
    if let Ok(value) = token.parse::<i64>() {
        return Some(value);
    }
    let value = token.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parse the text of a rough beammap into a ResonatorTable
///
/// Each non-empty, non-comment line must hold exactly `resID flag x y`. The whole table is
/// rejected on the first bad line.
pub fn parse_rough_beammap(contents: &str) -> Result<ResonatorTable, BeammapFileError> {
    let mut table = ResonatorTable::new();
    let mut seen_ids: FxHashSet<u32> = FxHashSet::default();

    for (line_idx, line) in contents.lines().enumerate() {
        let line_number = line_idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
            continue;
        }

        let entries: Vec<&str> = trimmed.split_whitespace().collect();
        if entries.len() != ENTRIES_PER_LINE {
            return Err(BeammapFileError::BadFileFormat {
                line: line_number,
                found: entries.len(),
                expected: ENTRIES_PER_LINE,
            });
        }

        let res_id = parse_integer(entries[0])
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| BeammapFileError::BadInteger {
                line: line_number,
                column: 1,
                value: entries[0].to_string(),
            })?;
        let flag_code = parse_integer(entries[1]).ok_or_else(|| BeammapFileError::BadInteger {
            line: line_number,
            column: 2,
            value: entries[1].to_string(),
        })?;
        let flag = BeamMapFlag::try_from(flag_code).map_err(|source| BeammapFileError::BadFlag {
            line: line_number,
            source,
        })?;
        let mut coords = [0.0; 2];
        for (offset, coord) in coords.iter_mut().enumerate() {
            let column = offset + 2;
            *coord = entries[column]
                .parse::<f64>()
                .map_err(|_| BeammapFileError::BadFloat {
                    line: line_number,
                    column: column + 1,
                    value: entries[column].to_string(),
                })?;
        }

        if !seen_ids.insert(res_id) {
            return Err(BeammapFileError::DuplicateResID {
                line: line_number,
                res_id,
            });
        }
        table.push(res_id, flag, coords[0], coords[1]);
    }

    Ok(table)
}

/// Read a rough beammap table from disk
pub fn read_rough_beammap(path: &Path) -> Result<ResonatorTable, BeammapFileError> {
    if !path.exists() {
        return Err(BeammapFileError::BadFilePath(path.to_path_buf()));
    }

    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    log::info!(
        "Reading rough beammap {} ({})",
        path.display(),
        human_bytes::human_bytes(size as f64)
    );
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let table = parse_rough_beammap(&contents)?;
    if table.is_empty() {
        return Err(BeammapFileError::EmptyTable(path.to_path_buf()));
    }
    log::info!("Loaded {} resonators", table.len());
    Ok(table)
}

/// Write the final beammap: `resID flag x y` with integer pixels, `nan` for unplaced
pub fn write_final_beammap<W: Write>(
    writer: &mut W,
    table: &ResonatorTable,
) -> Result<(), BeammapFileError> {
    for idx in 0..table.len() {
        let (x, y) = match table.placed(idx) {
            Some(cell) => (cell.x.to_string(), cell.y.to_string()),
            None => (UNPLACED_SENTINEL.to_string(), UNPLACED_SENTINEL.to_string()),
        };
        writeln!(
            writer,
            "{} {} {} {}",
            table.res_id(idx),
            table.flag(idx).code(),
            x,
            y
        )?;
    }
    Ok(())
}

/// Write the final beammap to a file, replacing anything already there
pub fn write_final_beammap_file(
    path: &Path,
    table: &ResonatorTable,
) -> Result<(), BeammapFileError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_final_beammap(&mut writer, table)?;
    writer.flush()?;
    log::info!("Wrote final beammap to {}", path.display());
    Ok(())
}
