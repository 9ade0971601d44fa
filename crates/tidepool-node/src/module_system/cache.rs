// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry for require()

use crate::module_system::module::Module;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tidepool_engine::{ObjectRef, Value};
use tracing::debug;

/// Filename-keyed registry of loaded and loading modules.
///
/// The registry is mirrored into a sandbox object exposed as
/// `require.cache`. Deleting a key from that object evicts the module, so
/// the next `require` of the same file loads it again.
pub struct ModuleCache {
    modules: RefCell<FxHashMap<PathBuf, Rc<Module>>>,
    mirror: ObjectRef,
}

impl ModuleCache {
    /// Create an empty registry mirrored into `mirror`.
    pub fn new(mirror: ObjectRef) -> Self {
        Self {
            modules: RefCell::default(),
            mirror,
        }
    }

    /// Get a registered module by filename
    pub fn get(&self, filename: &Path) -> Option<Rc<Module>> {
        if !self.mirror.has_own(&cache_key(filename)) {
            if self.modules.borrow_mut().remove(filename).is_some() {
                debug!(filename = %filename.display(), "evicted module removed from require.cache");
            }
            return None;
        }
        self.modules.borrow().get(filename).cloned()
    }

    /// Check if a module is registered
    pub fn contains(&self, filename: &Path) -> bool {
        self.get(filename).is_some()
    }

    /// Register a module before its body runs
    pub fn insert(&self, filename: PathBuf, module: Rc<Module>) {
        self.mirror
            .set(cache_key(&filename), Value::Object(module.object().clone()));
        self.modules.borrow_mut().insert(filename, module);
    }

    /// Remove a module from the registry
    pub fn remove(&self, filename: &Path) -> Option<Rc<Module>> {
        self.mirror.delete(&cache_key(filename));
        let removed = self.modules.borrow_mut().remove(filename);
        if removed.is_some() {
            debug!(filename = %filename.display(), "module evicted");
        }
        removed
    }

    /// Registered filenames
    pub fn filenames(&self) -> Vec<PathBuf> {
        self.modules.borrow().keys().cloned().collect()
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.modules.borrow().is_empty()
    }

    /// The sandbox `require.cache` object
    pub fn mirror(&self) -> &ObjectRef {
        &self.mirror
    }

    /// The registered module whose sandbox object is `object`
    pub(crate) fn find_by_object(&self, object: &ObjectRef) -> Option<Rc<Module>> {
        self.modules
            .borrow()
            .values()
            .find(|module| module.object().ptr_eq(object))
            .cloned()
    }
}

fn cache_key(filename: &Path) -> String {
    filename.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ContextOptions, Output};
    use crate::runtime::Context;

    fn context() -> Context {
        let mut options = ContextOptions::new(std::env::temp_dir());
        options.stdout = Output::buffer();
        Context::new(options).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let cx = context();
        let cache = ModuleCache::new(cx.new_object());
        let filename = PathBuf::from("/app/a.js");
        let module = Module::new(&cx, "/app/a.js", None);

        cache.insert(filename.clone(), Rc::clone(&module));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&filename).is_some_and(|m| Rc::ptr_eq(&m, &module)));
        assert!(cache.mirror().has_own("/app/a.js"));

        assert!(cache.remove(&filename).is_some());
        assert!(cache.is_empty());
        assert!(!cache.mirror().has_own("/app/a.js"));
    }

    #[test]
    fn test_deleting_mirror_key_evicts() {
        let cx = context();
        let cache = ModuleCache::new(cx.new_object());
        let filename = PathBuf::from("/app/b.js");
        cache.insert(filename.clone(), Module::new(&cx, "/app/b.js", None));

        cache.mirror().delete("/app/b.js");
        assert!(!cache.contains(&filename));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_find_by_object() {
        let cx = context();
        let cache = ModuleCache::new(cx.new_object());
        let module = Module::new(&cx, "/app/c.js", None);
        cache.insert(PathBuf::from("/app/c.js"), Rc::clone(&module));

        let found = cache.find_by_object(module.object());
        assert!(found.is_some_and(|m| Rc::ptr_eq(&m, &module)));
        assert!(cache.find_by_object(&cx.new_object()).is_none());
    }
}
