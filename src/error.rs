use thiserror::Error;

/// Misuse of the model or estimator. Every variant names the offending value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidArgument {
    #[error("genotype must be 0, 1 or 2 (got {g})")]
    Genotype { g: u8 },

    #[error("reference read count {r} exceeds depth {n}")]
    ReadCount { r: u64, n: u64 },

    #[error("depth must be at least 1")]
    Depth,

    #[error("error rate must lie strictly between 0 and 1 (got {e})")]
    ErrorRate { e: f64 },

    #[error("allele frequency must lie in [0, 1] (got {psi})")]
    Frequency { psi: f64 },

    #[error("tolerance must be positive and finite (got {tolerance})")]
    Tolerance { tolerance: f64 },

    #[error("dataset contains no observations")]
    EmptyDataset,
}

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error("could not create output directory")]
    OutputDir {
        #[source]
        source: std::io::Error,
    },

    #[error("could not write to {path}")]
    Write {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[error("could not read CSV file {path}")]
    CsvRead {
        #[source]
        source: csv::Error,
        path: std::path::PathBuf,
    },

    #[error("could not write to CSV")]
    CsvWrite(#[from] csv::Error),

    #[error("could not write JSON summary")]
    Json(#[from] serde_json::Error),

    #[error("could not write npz archive")]
    Npz {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("could not build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("could not parse read count {arg:?}")]
    ReadCountInt {
        #[source]
        source: std::num::ParseIntError,
        arg: String,
    },

    #[error("expected 1 or 2 fields (got {n_fields}) in line {line_num} of {path}")]
    ObservationFields {
        line_num: usize,
        n_fields: usize,
        path: std::path::PathBuf,
    },

    #[error("{path} has a single column but no --depth was given")]
    MissingDepth { path: std::path::PathBuf },

    #[error("line {line_num} of {path} has depth {row_depth} but --depth is {depth}")]
    DepthConflict {
        line_num: usize,
        row_depth: u64,
        depth: u64,
        path: std::path::PathBuf,
    },
}

impl CustomError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CustomError::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, CustomError>;
