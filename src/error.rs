use std::path::PathBuf;

/// Failures of a simulation run. All of them are terminal.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("numeric overflow: {0}")]
    NumericOverflow(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl RiskError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        RiskError::InvalidConfiguration(msg.into())
    }
}
