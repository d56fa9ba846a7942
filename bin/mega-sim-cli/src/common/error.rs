use mega_sim::SimError;

/// Error types for the mega-sim commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Failed to read or write a file
    #[error("Failed to access file: {0}")]
    FileAccess(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("Invalid JSON in {what}: {source}")]
    Json {
        /// Which input was being parsed
        what: &'static str,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Simulation failed
    #[error("{0}")]
    Sim(#[from] SimError),
}

/// Result type for the mega-sim commands
pub type Result<T> = std::result::Result<T, CliError>;
