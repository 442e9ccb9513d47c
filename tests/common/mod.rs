use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEPTH: u64 = 10;
pub const ERROR_RATE: &str = "0.2";
pub const REF_SKEWED_READS: [u64; 5] = [8, 8, 9, 7, 8];
/// Final estimate after five soft iterations from 0.5 on `REF_SKEWED_READS`.
pub const REF_SKEWED_PSI_5: f64 = 0.9997338402023767;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub struct Workspace {
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
}

pub fn create_workspace(label: &str) -> io::Result<Workspace> {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base_dir = std::env::temp_dir().join("hwefreq-tests").join(format!(
        "{}-{}-{}",
        std::process::id(),
        id,
        label
    ));
    fs::create_dir_all(&base_dir)?;
    let output_dir = base_dir.join("output");
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir)?;
    }
    Ok(Workspace {
        base_dir,
        output_dir,
    })
}

pub fn inline_reads() -> String {
    REF_SKEWED_READS
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Writes `ref_reads,depth` rows with a header, mixing depths across individuals.
pub fn write_mixed_depth_csv(path: impl AsRef<Path>) -> io::Result<Vec<(u64, u64)>> {
    let rows = vec![(8, 10), (15, 20), (4, 5), (7, 10), (0, 3), (12, 12)];
    let mut file = File::create(path)?;
    writeln!(file, "ref_reads,depth")?;
    for (r, n) in &rows {
        writeln!(file, "{r},{n}")?;
    }
    Ok(rows)
}
