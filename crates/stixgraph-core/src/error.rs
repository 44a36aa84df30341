use thiserror::Error;

/// Errors raised while loading a threat bundle or its configuration.
///
/// Every variant is fatal for the run: nothing downstream can proceed
/// without a parsed bundle.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read bundle {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed bundle JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bundle has no `objects` array")]
    MissingObjects,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
