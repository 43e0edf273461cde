/// Errors that abort a pipeline stage.
///
/// Malformed input rows never show up here: the loader drops them and
/// reports a count instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (file read/write, spawning the renderer).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The configuration file is not valid TOML for [`crate::PipelineConfig`].
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    Config {
        /// Which value was rejected and why.
        message: String,
    },

    /// A column named in the schema mapping is absent from the input header.
    #[error("input is missing required column {column:?}")]
    MissingColumn {
        /// Source column name that was looked up.
        column: String,
    },

    /// One export target could not be written.
    #[error("export to {target} failed: {message}")]
    Export {
        /// File or tool the export was aimed at.
        target: String,
        /// What went wrong.
        message: String,
    },
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
