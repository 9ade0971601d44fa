// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS module system
//!
//! - [`PathResolver`] turns a request and a list of search roots into an
//!   absolute filename
//! - [`Module`] is one loaded file; [`ModuleCache`] holds them by filename
//! - [`NativeRegistry`] serves builtin ids ahead of the filesystem
//! - [`Extensions`] maps file extensions to loaders
//!
//! Loading is synchronous and depth-first. A module is registered before
//! its body runs, so a circular `require` sees the partially filled
//! `exports` of the module still in progress.

mod cache;
mod extensions;
mod module;
mod native;
mod resolver;

pub use cache::ModuleCache;
pub use extensions::{ExtensionHandler, Extensions};
pub use module::{Module, wrap};
pub use native::{BuiltinSources, NativeModule, NativeRegistry};
pub use resolver::{PathResolver, node_module_paths};

pub(crate) use resolver::normalize;
