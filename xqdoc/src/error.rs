use thiserror::Error;
use xqdoc_syntax::SyntaxError;

/// Result type for documentation runs
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a documentation run
#[derive(Error, Debug)]
pub enum Error {
    /// The module source could not be parsed
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A node span does not map back onto the module source
    #[error("Malformed syntax tree: {0}")]
    Structure(String),

    /// Invalid namespace configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Namespace file is not valid TOML
    #[error("Namespace file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a structure error
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure(msg.into())
    }
}
