use thiserror::Error;

/// Structural problems with an input payload. Any of these aborts the batch.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Payload could not be decoded as text ({0})")]
    Undecodable(String),

    #[error("Header sentinel '{sentinel}' not found in the first {searched} lines")]
    MissingHeaderSentinel { sentinel: String, searched: usize },

    #[error("File too short: {found} non-empty lines, at least {minimum} expected")]
    TooFewLines { found: usize, minimum: usize },

    #[error("No data rows found after the header")]
    NoDataRows,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

#[derive(Error, Debug)]
pub enum MediaSpendError {
    #[error("Invalid {source_kind} input: {error}")]
    Format {
        source_kind: String,
        #[source]
        error: FormatError,
    },

    #[error("At least one source (Monitor or OutView) must be provided")]
    MissingSources,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MediaSpendError {
    pub fn format(source_kind: impl Into<String>, error: FormatError) -> Self {
        Self::Format {
            source_kind: source_kind.into(),
            error,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaSpendError>;
