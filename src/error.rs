use thiserror::Error;

#[derive(Error, Debug)]
pub enum BronzeError {
    #[error("Source '{source_file}' is unreadable: {reason}")]
    SourceUnreadable { source_file: String, reason: String },

    #[error("Schema mismatch: missing column(s) {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Write to '{table}' failed: {reason}")]
    WriteFailed { table: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BronzeError {
    pub fn source_unreadable(source_file: &str, reason: impl ToString) -> Self {
        BronzeError::SourceUnreadable {
            source_file: source_file.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(table: impl ToString, reason: impl ToString) -> Self {
        BronzeError::WriteFailed {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BronzeError>;
