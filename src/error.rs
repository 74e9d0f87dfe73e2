//! Error types for ledgerd-testnet.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating a test network.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required staged config file is absent.
    #[error("missing config file `{path}`; please provide it in the `{expected_dir}` directory")]
    ConfigMissing {
        /// The file that could not be staged.
        path: PathBuf,
        /// The directory the caller is expected to populate.
        expected_dir: PathBuf,
    },

    /// The key-generation utility failed or produced unparseable output.
    #[error("key generation failed: {0}")]
    ExternalTool(String),

    /// A required binary was absent and could not be staged.
    #[error("binary `{name}` was not found in `{root_dir}` and could not be staged")]
    MissingBinary {
        /// Name of the missing binary.
        name: String,
        /// The project root that was searched.
        root_dir: PathBuf,
    },

    /// The genesis block was not observed within the attempt budget.
    #[error("genesis block wasn't created within {attempts} attempts")]
    GenesisTimeout {
        /// The exhausted attempt budget.
        attempts: u32,
    },

    /// The cleanup target directory does not exist.
    #[error("test directory `{path}` does not exist")]
    DirectoryMissing {
        /// The directory that was expected to exist.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error, one per fatal cause.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::GenesisTimeout { .. } => 2,
            Self::ExternalTool(_) => 3,
            Self::MissingBinary { .. } => 4,
            Self::DirectoryMissing { .. } => 5,
            Self::Config(_) | Self::ConfigMissing { .. } | Self::Io(_) | Self::Serialization(_) => {
                1
            }
        }
    }
}
