use thiserror::Error;

/// Main error type for the tender bid optimizer
#[derive(Error, Debug)]
pub enum TbError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No viable bid found: {message}")]
    NoViableBid { message: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised by a win-probability or profit oracle for one candidate bid.
///
/// The search screens these per sample; they never abort an optimization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle returned a non-finite value {value} at bid {bid}")]
    NonFinite { bid: f64, value: f64 },

    #[error("feature vector has {actual} entries, model expects {expected}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("oracle unavailable: {message}")]
    Unavailable { message: String },
}

/// Field-extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Source folder not found: {path}")]
    FolderNotFound { path: String },

    #[error("No readable sources in {path}")]
    NoSources { path: String },

    #[error("Could not read source {name}: {message}")]
    SourceRead { name: String, message: String },

    #[error("Could not determine a valid base price from the document (got {found:?})")]
    NoBasePrice { found: Option<String> },
}

/// Model bundle loading errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid model definition: {message}")]
    Invalid { message: String },
}

/// Result type alias for tender bid operations
pub type TbResult<T> = Result<T, TbError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TbError::Config(format!($($arg)*))
    };
}
