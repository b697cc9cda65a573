use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SHA256 mismatch for {name}: expected {expected}, got {actual}")]
    Integrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("No lines detected")]
    NoLinesDetected,

    #[error("Line endpoints span a degenerate box ({width} x {height} px)")]
    DegenerateCorners { width: f64, height: f64 },

    #[error("Linear system could not be solved")]
    SingularSystem,

    #[error("Empty video: {0}")]
    EmptyVideo(PathBuf),

    #[error("Track has no observations")]
    EmptyTrack,

    #[error("Track frames must be strictly increasing ({prev} followed by {next})")]
    UnorderedTrack { prev: i64, next: i64 },

    #[error("Index {idx} out of bounds for track of length {len}")]
    IndexOutOfBounds { idx: usize, len: usize },

    #[error("Invalid label file {path}: {reason}")]
    InvalidLabel { path: PathBuf, reason: String },

    #[error("Zone id {0} is outside [0, 5]")]
    InvalidZone(i64),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("At least two distinct zones are required to fit, got {0}")]
    InsufficientClasses(usize),

    #[error("Expected {expected} features per sample, got {actual}")]
    FeatureDimension { expected: usize, actual: usize },

    #[error("No clips found in {0}")]
    NoClips(PathBuf),

    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Array shape Error: {0}")]
    ArrayShape(#[from] ndarray::ShapeError),
}
