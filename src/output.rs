use crate::em::{EmConfig, EmTrace, GenotypeCall, UpdateRule};
use crate::error::{CustomError, Result};
use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_trace(trace: &EmTrace, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["iteration", "psi", "log_likelihood"])?;
    for step in trace.steps() {
        wtr.serialize((step.iteration, step.psi, step.log_likelihood))?;
    }
    wtr.flush().map_err(|e| CustomError::Write {
        source: e,
        path: path.into(),
    })?;
    Ok(())
}

pub fn write_genotype_calls(calls: &[GenotypeCall], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "index",
        "ref_reads",
        "depth",
        "p_hom_alt",
        "p_het",
        "p_hom_ref",
        "expected_genotype",
        "call",
    ])?;
    for (idx, call) in calls.iter().enumerate() {
        let [p0, p1, p2] = call.posterior;
        wtr.serialize((
            idx,
            call.observation.ref_reads(),
            call.observation.depth(),
            p0,
            p1,
            p2,
            call.expected_genotype,
            call.call.ref_copies(),
        ))?;
    }
    wtr.flush().map_err(|e| CustomError::Write {
        source: e,
        path: path.into(),
    })?;
    Ok(())
}

pub fn write_summary(
    config: &EmConfig,
    n_observations: usize,
    trace: &EmTrace,
    path: &Path,
) -> Result<()> {
    let last = trace.final_step();
    let rule = match config.rule {
        UpdateRule::Soft => "soft",
        UpdateRule::Hard => "hard",
    };
    let summary = json!({
        "n_observations": n_observations,
        "error_rate": config.error_rate,
        "psi0": config.psi0,
        "rule": rule,
        "max_iterations": config.iterations,
        "tolerance": config.tolerance,
        "iterations_run": trace.iterations_run(),
        "converged": trace.converged(),
        "psi": last.psi,
        "log_likelihood": last.log_likelihood,
    });

    let write_err = |e: std::io::Error| CustomError::Write {
        source: e,
        path: path.into(),
    };
    let mut out = BufWriter::new(File::create(path).map_err(write_err)?);
    serde_json::to_writer_pretty(&mut out, &summary)?;
    writeln!(out).map_err(write_err)?;
    out.flush().map_err(write_err)?;
    Ok(())
}

/// Writes `posteriors` (n x 3, columns by reference copies) and `genotype_calls` (n).
pub fn write_posteriors_npz(calls: &[GenotypeCall], path: &Path) -> Result<()> {
    let posteriors = Array2::from_shape_fn((calls.len(), 3), |(i, g)| calls[i].posterior[g]);
    let genotype_calls: Array1<u8> = calls.iter().map(|c| c.call.ref_copies()).collect();

    let file = File::create(path).map_err(|e| CustomError::Write {
        source: e,
        path: path.into(),
    })?;
    let npz_err = |e: ndarray_npy::WriteNpzError| CustomError::Npz {
        source: Box::new(e),
    };
    let mut npz = NpzWriter::new(file);
    npz.add_array("posteriors", &posteriors).map_err(npz_err)?;
    npz.add_array("genotype_calls", &genotype_calls)
        .map_err(npz_err)?;
    npz.finish().map_err(npz_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::em::Estimator;
    use crate::model::Dataset;
    use std::fs;

    fn temp_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir()
            .join("hwefreq-output-tests")
            .join(format!("{}-{}", std::process::id(), label));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn trace_csv_has_one_row_per_step() {
        let dataset = Dataset::with_depth(10, &[8, 8, 9, 7, 8]).unwrap();
        let trace = Estimator::new(EmConfig::new(0.2, 0.5, 3))
            .unwrap()
            .run(&dataset)
            .unwrap();
        let path = temp_dir("trace").join("em_trace.csv");
        write_trace(&trace, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("iteration,psi,log_likelihood"));
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("0,0.5,"));
    }

    #[test]
    fn summary_json_reports_final_estimate() {
        let dataset = Dataset::with_depth(10, &[8, 8, 9, 7, 8]).unwrap();
        let config = EmConfig::new(0.2, 0.5, 2);
        let trace = Estimator::new(config.clone()).unwrap().run(&dataset).unwrap();
        let path = temp_dir("summary").join("summary.json");
        write_summary(&config, dataset.len(), &trace, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["n_observations"], 5);
        assert_eq!(value["rule"], "soft");
        assert_eq!(value["iterations_run"], 2);
        assert_eq!(value["converged"], false);
        assert!(value["tolerance"].is_null());
        assert!((value["psi"].as_f64().unwrap() - trace.final_psi()).abs() < 1e-12);
    }
}
