// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module system

use std::path::PathBuf;
use thiserror::Error;
use tidepool_engine::Error as EngineError;

/// Result type for module system operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur while resolving, loading or executing modules
#[derive(Debug, Error)]
pub enum NodeError {
    /// No file or builtin matched the request
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// A builtin id was requested that is not in the bundled set
    #[error("no such native module {0}")]
    NoSuchNativeModule(String),

    /// The resolved file has the `.node` extension
    #[error("requiring modules with a .node extension is not supported")]
    UnsupportedExtension,

    /// A `package.json` could not be parsed
    #[error("error parsing {}: {source}", path.display())]
    PackageJson {
        /// The offending descriptor
        path: PathBuf,
        /// The underlying parse error
        source: serde_json::Error,
    },

    /// A `.json` module could not be parsed
    #[error("{}: {source}", path.display())]
    JsonModule {
        /// The module file
        path: PathBuf,
        /// The underlying parse error
        source: serde_json::Error,
    },

    /// `require` was called with something other than a string
    #[error("path must be a string")]
    InvalidArgument,

    /// `load` was called on a module that already finished loading
    #[error("module already loaded: {0}")]
    AlreadyLoaded(String),

    /// A module or builtin source could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file being read
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Writing to `process.stdout` or `process.stderr` failed
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    /// A native callback ran after its context was dropped
    #[error("execution context is no longer alive")]
    ContextDropped,

    /// Error raised by the script engine, including script `throw`
    #[error("{0}")]
    Engine(#[source] EngineError),
}

impl NodeError {
    /// Create a module not found error
    pub fn module_not_found(request: impl Into<String>) -> Self {
        Self::ModuleNotFound(request.into())
    }

    /// Create a read error for `path`
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

/// Engine errors coming back out of script frames may carry a `NodeError`
/// raised by a native callback further down. Those are unwrapped so the
/// caller sees the original variant.
impl From<EngineError> for NodeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Host(inner) => match inner.downcast::<NodeError>() {
                Ok(node) => *node,
                Err(other) => NodeError::Engine(EngineError::Host(other)),
            },
            other => NodeError::Engine(other),
        }
    }
}

impl From<NodeError> for EngineError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Engine(inner) => inner,
            other => EngineError::host(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_engine::Value;

    #[test]
    fn test_module_not_found_message() {
        let err = NodeError::module_not_found("./missing");
        assert_eq!(err.to_string(), "Cannot find module './missing'");
    }

    #[test]
    fn test_node_error_survives_engine_round_trip() {
        let engine_err: EngineError = NodeError::UnsupportedExtension.into();
        assert!(matches!(engine_err, EngineError::Host(_)));

        let back = NodeError::from(engine_err);
        assert!(matches!(back, NodeError::UnsupportedExtension));
    }

    #[test]
    fn test_engine_errors_are_not_double_wrapped() {
        let thrown = NodeError::Engine(EngineError::Thrown(Value::from("boom")));
        let engine_err = EngineError::from(thrown);
        assert!(matches!(engine_err, EngineError::Thrown(_)));
    }

    #[test]
    fn test_package_json_error_names_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = NodeError::PackageJson {
            path: PathBuf::from("/pkg/package.json"),
            source,
        };
        assert!(err.to_string().starts_with("error parsing /pkg/package.json: "));
    }
}
