//! Adapter around the external `ledgerd-keygen` utility.
//!
//! The utility is a black box: it is invoked once per peer and must emit a
//! JSON object with `public_key` and `private_key` fields on stdout. Nothing
//! here interprets the key material beyond that shape.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// A peer keypair as emitted by `ledgerd-keygen crypto --json`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyPair {
    /// Encoded public key.
    pub public_key: String,
    /// Opaque private key value, passed through to the peer verbatim.
    pub private_key: serde_json::Value,
}

impl KeyPair {
    /// The private key serialized back to the JSON form the peer expects.
    #[must_use]
    pub fn private_key_json(&self) -> String {
        self.private_key.to_string()
    }
}

/// Invokes the key-generation utility as an external process.
#[derive(Debug, Clone)]
pub struct KeygenTool {
    binary: PathBuf,
}

impl KeygenTool {
    /// Create an adapter for the utility staged at `binary`.
    #[must_use]
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Generate a keypair, deterministically when `seed` is given.
    ///
    /// Two invocations with the same seed produce identical key material;
    /// unseeded invocations produce a fresh keypair each time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] if the utility cannot be run, exits
    /// non-zero, or emits output that does not parse as a keypair.
    pub fn generate(&self, seed: Option<&str>) -> Result<KeyPair> {
        let mut command = Command::new(&self.binary);
        command.args(["crypto", "--json"]);
        if let Some(seed) = seed {
            command.args(["--seed", seed]);
        }

        debug!("Requesting a keypair from `{}`", self.binary.display());
        let output = command.output().map_err(|e| {
            Error::ExternalTool(format!("failed to run `{}`: {e}", self.binary.display()))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(format!(
                "`{}` exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::ExternalTool(format!(
                "unparseable keypair from `{}`: {e}",
                self.binary.display()
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn private_key_round_trips_as_json() {
        let pair = KeyPair {
            public_key: "ed0120abc".to_string(),
            private_key: serde_json::json!({"digest_function": "ed25519", "payload": "deadbeef"}),
        };
        let json = pair.private_key_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["payload"], "deadbeef");
    }

    #[test]
    fn missing_utility_is_an_external_tool_error() {
        let tool = KeygenTool::new(PathBuf::from("/nonexistent/ledgerd-keygen"));
        let err = tool.generate(None).unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }
}
