// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tidepool-node
//!
//! CommonJS module resolution, loading and execution on top of the
//! tidepool script engine.
//!
//! This crate provides:
//!
//! - `require()` with the `node_modules` directory walk, extension,
//!   `package.json` and `index` fallbacks
//! - Load-once module registry with circular-require support
//! - Builtin modules (`console`, `util`, `assert`) that win over files
//! - A sandboxed global environment with a restricted `process` object
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidepool_node::{Context, ContextOptions};
//!
//! let cx = Context::new(ContextOptions::new("/srv/app"))?;
//! let exports = cx.require("./server")?;
//! println!("{}", exports);
//! # Ok::<(), tidepool_node::NodeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod globals;
pub mod module_system;
pub mod options;
pub mod runtime;

// Re-exports
pub use error::{NodeError, Result};
pub use module_system::{Module, node_module_paths};
pub use options::{ContextOptions, Output};
pub use runtime::Context;

/// Version of the tidepool-node crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
