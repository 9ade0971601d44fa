// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Extension dispatch for module loading

use crate::error::{NodeError, Result};
use crate::module_system::module::Module;
use crate::runtime::Context;
use std::path::Path;
use std::rc::Rc;
use tidepool_engine::builtins::json::from_json;

/// How a file is turned into module exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionHandler {
    /// Compile and execute as a CommonJS module
    Script,
    /// Parse as JSON and use the value as exports
    Json,
    /// Always fails
    Unsupported,
}

impl ExtensionHandler {
    /// Run the handler for `module` against the file at `filename`.
    pub(crate) fn run(self, cx: &Context, module: &Rc<Module>, filename: &Path) -> Result<()> {
        match self {
            ExtensionHandler::Script => {
                let content = read(filename)?;
                module.compile(cx, &content, filename)?;
                Ok(())
            }
            ExtensionHandler::Json => {
                let content = read(filename)?;
                let json: serde_json::Value =
                    serde_json::from_str(&content).map_err(|source| NodeError::JsonModule {
                        path: filename.to_path_buf(),
                        source,
                    })?;
                module.set_exports(from_json(cx.engine(), &json));
                Ok(())
            }
            ExtensionHandler::Unsupported => Err(NodeError::UnsupportedExtension),
        }
    }
}

fn read(filename: &Path) -> Result<String> {
    std::fs::read_to_string(filename).map_err(|source| NodeError::read(filename, source))
}

/// The registered extensions, in lookup order.
#[derive(Debug, Clone)]
pub struct Extensions {
    entries: Vec<(&'static str, ExtensionHandler)>,
}

impl Extensions {
    /// `.js`, `.json` and `.node`, in that order.
    pub fn new() -> Self {
        Self {
            entries: vec![
                (".js", ExtensionHandler::Script),
                (".json", ExtensionHandler::Json),
                (".node", ExtensionHandler::Unsupported),
            ],
        }
    }

    /// Extension strings in registration order
    pub fn keys(&self) -> Vec<&'static str> {
        self.iter().map(|(ext, _)| ext).collect()
    }

    /// (extension, handler) pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ExtensionHandler)> + '_ {
        self.entries.iter().copied()
    }

    /// Handler registered for `ext` (including the leading dot)
    pub fn get(&self, ext: &str) -> Option<ExtensionHandler> {
        self.entries
            .iter()
            .find(|(key, _)| *key == ext)
            .map(|(_, handler)| *handler)
    }

    /// Pick the handler for a file. Missing or unregistered extensions are
    /// treated as `.js`.
    pub fn handler_for(&self, filename: &Path) -> ExtensionHandler {
        filename
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get(&format!(".{}", ext)))
            .unwrap_or(ExtensionHandler::Script)
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new()
    }
}
