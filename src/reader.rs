use crate::error::{CustomError, Result};
use crate::model::{Dataset, Observation};
use std::path::Path;

fn parse_count(raw: &str) -> Result<u64> {
    raw.parse().map_err(|source| CustomError::ReadCountInt {
        source,
        arg: raw.to_string(),
    })
}

/// Parses a comma-separated list of reference read counts, e.g. "8,8,9,7,8".
pub fn parse_reads(spec: &str) -> Result<Vec<u64>> {
    spec.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(parse_count)
        .collect()
}

/// Reads one observation per row: `ref_reads,depth`, or just `ref_reads` when every
/// individual shares `default_depth`. A leading `ref_reads[,depth]` header row is skipped.
/// When `default_depth` is given, a row carrying a different depth is an error.
pub fn read_observations_csv(
    path: impl AsRef<Path>,
    default_depth: Option<u64>,
) -> Result<Dataset> {
    let csv_path = path.as_ref().to_path_buf();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&csv_path)
        .map_err(|source| CustomError::CsvRead {
            source,
            path: csv_path.clone(),
        })?;

    let mut observations = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|source| CustomError::CsvRead {
            source,
            path: csv_path.clone(),
        })?;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if observations.is_empty() && record[0].eq_ignore_ascii_case("ref_reads") {
            continue;
        }

        let observation = match record.len() {
            1 => {
                let depth = default_depth.ok_or_else(|| CustomError::MissingDepth {
                    path: csv_path.clone(),
                })?;
                Observation::new(parse_count(&record[0])?, depth)?
            }
            2 => {
                let row_depth = parse_count(&record[1])?;
                if let Some(depth) = default_depth.filter(|&d| d != row_depth) {
                    return Err(CustomError::DepthConflict {
                        line_num: line_idx + 1,
                        row_depth,
                        depth,
                        path: csv_path,
                    });
                }
                Observation::new(parse_count(&record[0])?, row_depth)?
            }
            n_fields => {
                return Err(CustomError::ObservationFields {
                    line_num: line_idx + 1,
                    n_fields,
                    path: csv_path,
                });
            }
        };
        observations.push(observation);
    }

    Ok(Dataset::new(observations))
}
